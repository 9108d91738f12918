//! Generic conversion of a document into a JSON tree.
use roxmltree::Node;
use serde_json::{Map, Value};

use crate::Error;
use crate::config::TransformOptions;
use crate::document::{self, MAX_DEPTH, attribute_name, qualified_name};

const ATTRIBUTES_KEY: &str = "$";
const TEXT_KEY: &str = "#text";

/// Convert `xml` into nested objects keyed by element name.
///
/// Documents nested deeper than [`MAX_DEPTH`] elements are rejected.
///
/// # Examples
/// ```rust
/// use serde_json::json;
/// use xshape_core::{to_json, TransformOptions};
///
/// let output = to_json("<a x='1'><b>hi</b><b/></a>", &TransformOptions::default())?;
/// assert_eq!(
///     output,
///     json!({ "a": [{ "$": { "x": "1" }, "b": [{ "#text": "hi" }, {}] }] })
/// );
/// # Ok::<(), xshape_core::Error>(())
/// ```
pub fn to_json(xml: &str, options: &TransformOptions) -> Result<Value, Error> {
    let Some(doc) = document::load(xml, options)? else {
        return Ok(Value::Object(Map::new()));
    };
    document::check_depth(&doc, MAX_DEPTH)?;
    let root = doc.root_element();
    let mut output = Map::new();
    output.insert(
        qualified_name(root).to_string(),
        Value::Array(vec![element_to_json(root)]),
    );
    Ok(Value::Object(output))
}

fn element_to_json(node: Node<'_, '_>) -> Value {
    let mut object = Map::new();

    let attributes: Map<String, Value> = node
        .attributes()
        .map(|attr| (attribute_name(node, &attr), Value::String(attr.value().to_string())))
        .collect();
    if !attributes.is_empty() {
        object.insert(ATTRIBUTES_KEY.to_string(), Value::Object(attributes));
    }

    let text: String = node
        .children()
        .filter(|child| child.is_text())
        .filter_map(|child| child.text())
        .collect();
    let text = text.trim();
    if !text.is_empty() {
        object.insert(TEXT_KEY.to_string(), Value::String(text.to_string()));
    }

    for child in node.children().filter(Node::is_element) {
        let entry = object
            .entry(qualified_name(child).to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = entry {
            items.push(element_to_json(child));
        }
    }

    Value::Object(object)
}
