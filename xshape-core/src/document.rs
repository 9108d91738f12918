//! Document loading and the well-formedness gate.
use roxmltree::{Document, Node, NodeType, ParsingOptions};
use thiserror::Error;
use tracing::debug;

use crate::config::TransformOptions;

/// Errors emitted while loading XML documents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("malformed xml at {line}:{column}: {message}")]
    Malformed {
        line: u32,
        column: u32,
        message: String,
    },
    #[error("elements are nested deeper than {limit} levels")]
    TooDeep { limit: usize },
}

impl From<roxmltree::Error> for DocumentError {
    fn from(err: roxmltree::Error) -> Self {
        let pos = err.pos();
        DocumentError::Malformed {
            line: pos.row,
            column: pos.col,
            message: err.to_string(),
        }
    }
}

fn parsing_options() -> ParsingOptions {
    ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    }
}

/// Parse a document, rejecting anything that is not well-formed.
///
/// # Examples
/// ```rust
/// use xshape_core::document::parse_document;
///
/// assert!(parse_document("<root><a/></root>").is_ok());
/// assert!(parse_document("<tag>invalid xml<ta/>").is_err());
/// ```
pub fn parse_document(xml: &str) -> Result<Document<'_>, DocumentError> {
    Document::parse_with_options(xml, parsing_options()).map_err(DocumentError::from)
}

/// Check that `xml` is well-formed without keeping the parsed tree.
pub fn check_well_formed(xml: &str) -> Result<(), DocumentError> {
    parse_document(xml).map(|_| ())
}

/// Load a document according to `options`.
///
/// Returns `Ok(None)` when the document is malformed and no check was requested,
/// so callers can fall back to an empty result.
pub fn load<'input>(
    xml: &'input str,
    options: &TransformOptions,
) -> Result<Option<Document<'input>>, DocumentError> {
    match parse_document(xml) {
        Ok(doc) => Ok(Some(doc)),
        Err(err) if options.validates() => {
            debug!(error = %err, "rejecting malformed document");
            Err(err)
        }
        Err(err) => {
            debug!(error = %err, "malformed document, producing empty output");
            Ok(None)
        }
    }
}

/// The qualified name of an element exactly as written in the source.
pub fn qualified_name<'input>(node: Node<'_, 'input>) -> &'input str {
    if !node.is_element() {
        return "";
    }
    let input: &'input str = node.document().input_text();
    let range = node.range();
    input
        .get(range.start + 1..range.end)
        .and_then(|tag| tag.split(|c: char| c.is_whitespace() || c == '/' || c == '>').next())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| node.tag_name().name())
}

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// The prefix bound to `uri` in the scope of `node`, `None` for the default namespace.
pub fn prefix_for<'a>(node: Node<'a, '_>, uri: &str) -> Option<&'a str> {
    if uri == XML_NAMESPACE {
        return Some("xml");
    }
    node.namespaces()
        .filter(|ns| ns.uri() == uri)
        .find_map(|ns| ns.name())
}

/// The qualified name of an attribute, rebuilt from its namespace binding.
pub fn attribute_name(node: Node<'_, '_>, attr: &roxmltree::Attribute<'_, '_>) -> String {
    match attr.namespace().and_then(|uri| prefix_for(node, uri)) {
        Some(prefix) => format!("{prefix}:{}", attr.name()),
        None => attr.name().to_string(),
    }
}

/// Deepest element nesting accepted where output mirrors the tree's shape.
pub const MAX_DEPTH: usize = 256;

/// Reject documents whose elements nest deeper than `limit`.
pub fn check_depth(doc: &Document<'_>, limit: usize) -> Result<(), DocumentError> {
    let mut pending = vec![(doc.root_element(), 1)];
    while let Some((node, depth)) = pending.pop() {
        if depth > limit {
            debug!(limit, "rejecting deeply nested document");
            return Err(DocumentError::TooDeep { limit });
        }
        pending.extend(
            node.children()
                .filter(Node::is_element)
                .map(|child| (child, depth + 1)),
        );
    }
    Ok(())
}

/// Whitespace-only text between markup. Queries skip these nodes.
pub fn is_blank_text(node: Node<'_, '_>) -> bool {
    node.is_text()
        && node
            .text()
            .is_some_and(|text| text.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n')))
}

/// XPath string-value of a node.
pub fn string_value(node: Node<'_, '_>) -> String {
    match node.node_type() {
        NodeType::Root | NodeType::Element => node
            .descendants()
            .filter(|n| n.is_text() && !is_blank_text(*n))
            .filter_map(|n| n.text())
            .collect(),
        NodeType::Text | NodeType::Comment => node.text().unwrap_or_default().to_string(),
        NodeType::PI => node
            .pi()
            .and_then(|pi| pi.value)
            .unwrap_or_default()
            .to_string(),
    }
}
