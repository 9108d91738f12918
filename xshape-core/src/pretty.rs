//! Indented re-serialization of documents.
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesPI, BytesStart, BytesText, Event};
use roxmltree::{Node, NodeType};

use crate::Error;
use crate::config::{PrettyPrintOptions, TransformOptions};
use crate::document::{self, attribute_name, qualified_name};

/// Errors emitted while writing a document back out.
#[derive(Debug, thiserror::Error)]
pub enum PrettyPrintError {
    #[error("failed to write xml: {0}")]
    Write(String),
    #[error("pretty-printed output is not utf-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

fn write<'a>(
    writer: &mut Writer<Vec<u8>>,
    event: impl Into<Event<'a>>,
) -> Result<(), PrettyPrintError> {
    writer
        .write_event(event)
        .map_err(|e| PrettyPrintError::Write(e.to_string()))
}

/// Pretty-print `xml` with `options.indent_size` spaces per level.
///
/// Whitespace-only text is dropped and the XML declaration is not kept.
///
/// # Examples
/// ```rust
/// use xshape_core::{pretty_print, PrettyPrintOptions, TransformOptions};
///
/// let pretty = pretty_print(
///     "<a><b>1</b><c/></a>",
///     &PrettyPrintOptions::new(2),
///     &TransformOptions::default(),
/// )?;
/// assert_eq!(pretty, "<a>\n  <b>1</b>\n  <c/>\n</a>\n");
/// # Ok::<(), xshape_core::Error>(())
/// ```
pub fn pretty_print(
    xml: &str,
    options: &PrettyPrintOptions,
    transform_options: &TransformOptions,
) -> Result<String, Error> {
    let Some(doc) = document::load(xml, transform_options)? else {
        return Ok(String::new());
    };

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', options.indent_size);
    write_tree(&mut writer, doc.root())?;
    let mut output = String::from_utf8(writer.into_inner()).map_err(PrettyPrintError::from)?;
    if !output.is_empty() {
        output.push('\n');
    }
    Ok(output)
}

enum Visit<'a, 'input> {
    Open(Node<'a, 'input>),
    Close(Node<'a, 'input>),
}

/// Depth-first walk with an explicit stack, so nesting depth is bounded by memory only.
fn write_tree(writer: &mut Writer<Vec<u8>>, root: Node<'_, '_>) -> Result<(), PrettyPrintError> {
    let mut pending: Vec<Visit<'_, '_>> = root.children().rev().map(Visit::Open).collect();
    while let Some(visit) = pending.pop() {
        let node = match visit {
            Visit::Close(node) => {
                write(writer, Event::End(BytesEnd::new(qualified_name(node))))?;
                continue;
            }
            Visit::Open(node) => node,
        };
        match node.node_type() {
            NodeType::Element => {
                let start = start_tag(node);
                if !has_content(node) {
                    write(writer, Event::Empty(start))?;
                    continue;
                }
                write(writer, Event::Start(start))?;
                pending.push(Visit::Close(node));
                pending.extend(node.children().rev().map(Visit::Open));
            }
            NodeType::Text => {
                if let Some(text) = node.text().filter(|t| !t.trim().is_empty()) {
                    write(writer, Event::Text(BytesText::new(text)))?;
                }
            }
            NodeType::Comment => {
                let text = node.text().unwrap_or_default();
                write(writer, Event::Comment(BytesText::from_escaped(text)))?;
            }
            NodeType::PI => {
                if let Some(pi) = node.pi() {
                    let content = match pi.value {
                        Some(value) => format!("{} {value}", pi.target),
                        None => pi.target.to_string(),
                    };
                    write(writer, Event::PI(BytesPI::new(content)))?;
                }
            }
            NodeType::Root => {}
        }
    }
    Ok(())
}

fn has_content(node: Node<'_, '_>) -> bool {
    node.children()
        .any(|child| !child.is_text() || child.text().is_some_and(|t| !t.trim().is_empty()))
}

fn start_tag<'a>(node: Node<'_, 'a>) -> BytesStart<'a> {
    let mut start = BytesStart::new(qualified_name(node));

    let inherited: Vec<(Option<&str>, &str)> = node
        .parent()
        .map(|parent| parent.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();
    for ns in node.namespaces() {
        let binding = (ns.name(), ns.uri());
        if binding.0 == Some("xml") || inherited.contains(&binding) {
            continue;
        }
        let key = match ns.name() {
            Some(prefix) => format!("xmlns:{prefix}"),
            None => "xmlns".to_string(),
        };
        start.push_attribute((key.as_str(), ns.uri()));
    }
    for attr in node.attributes() {
        let key = attribute_name(node, &attr);
        start.push_attribute((key.as_str(), attr.value()));
    }
    start
}
