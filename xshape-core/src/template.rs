//! Template-driven transformation of XML documents into JSON.
//!
//! A template mirrors the shape of the desired output. String leaves are XPath
//! expressions evaluated against the current context node, arrays of the form
//! `[path, template]` map every node matched by `path` through `template`, and
//! objects nest.
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::config::TransformOptions;
use crate::document;
use crate::xpath::{XNode, XPath};
use crate::Error;

/// Errors emitted when a template has an unsupported shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("template must be a JSON object or array, got {found}")]
    UnsupportedRoot { found: &'static str },
    #[error("unsupported template value for '{key}': {found}")]
    UnsupportedNode { key: String, found: &'static str },
    #[error("array template for '{key}' must be [path] or [path, template]")]
    InvalidArray { key: String },
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// JSON type produced by a string template, picked from its leading function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnType {
    String,
    Number,
    Boolean,
}

impl ReturnType {
    pub fn of(expr: &str) -> ReturnType {
        const NUMBER_FUNCTIONS: [&str; 6] =
            ["count(", "ceiling(", "floor(", "number(", "round(", "sum("];
        if expr.starts_with("boolean(") {
            ReturnType::Boolean
        } else if NUMBER_FUNCTIONS.iter().any(|f| expr.starts_with(f)) {
            ReturnType::Number
        } else {
            ReturnType::String
        }
    }
}

/// Transform `xml` into JSON following `template`.
///
/// A malformed document yields `{}` unless `options` requests
/// [`crate::config::Check::ValidXml`], in which case it is a type-mismatch error.
///
/// # Examples
/// ```rust
/// use serde_json::json;
/// use xshape_core::{transform, TransformOptions};
///
/// let xml = "<order id='7'><item>tea</item><item>milk</item></order>";
/// let template = json!({
///     "id": "number(/order/@id)",
///     "items": ["/order/item", "."],
/// });
/// let output = transform(xml, &template, &TransformOptions::default())?;
/// assert_eq!(output, json!({ "id": 7, "items": ["tea", "milk"] }));
/// # Ok::<(), xshape_core::Error>(())
/// ```
pub fn transform(xml: &str, template: &Value, options: &TransformOptions) -> Result<Value, Error> {
    check_root(template)?;

    let Some(doc) = document::load(xml, options)? else {
        return Ok(Value::Object(Map::new()));
    };
    let shape = Shape::compile(template, "$")?;
    debug!(nodes = doc.descendants().count(), "transforming document");
    shape.evaluate(XNode::Node(doc.root()))
}

/// Check that every expression in `template` compiles, without a document.
pub fn validate_template(template: &Value) -> Result<(), Error> {
    check_root(template)?;
    Shape::compile(template, "$").map(|_| ())
}

fn check_root(template: &Value) -> Result<(), Error> {
    match template {
        Value::Object(_) | Value::Array(_) => Ok(()),
        other => Err(TemplateError::UnsupportedRoot {
            found: kind_of(other),
        }
        .into()),
    }
}

/// A template with every expression compiled, evaluated once per context.
enum Shape {
    Leaf(Leaf),
    Object(Vec<(String, Shape)>),
    EmptyArray,
    Array {
        base: XPath,
        inner: Option<Box<Shape>>,
    },
}

impl Shape {
    fn compile(node: &Value, key: &str) -> Result<Shape, Error> {
        match node {
            Value::String(expr) => Ok(Shape::Leaf(Leaf::compile(expr)?)),
            Value::Object(fields) => {
                let mut compiled = Vec::with_capacity(fields.len());
                for (key, node) in fields {
                    compiled.push((key.clone(), Shape::compile(node, key)?));
                }
                Ok(Shape::Object(compiled))
            }
            Value::Array(items) => match items.as_slice() {
                [] => Ok(Shape::EmptyArray),
                [Value::String(base)] => Ok(Shape::Array {
                    base: XPath::compile(base)?,
                    inner: None,
                }),
                [Value::String(base), inner @ (Value::String(_) | Value::Object(_))] => {
                    Ok(Shape::Array {
                        base: XPath::compile(base)?,
                        inner: Some(Box::new(Shape::compile(inner, key)?)),
                    })
                }
                _ => Err(TemplateError::InvalidArray {
                    key: key.to_string(),
                }
                .into()),
            },
            other => Err(TemplateError::UnsupportedNode {
                key: key.to_string(),
                found: kind_of(other),
            }
            .into()),
        }
    }

    fn evaluate(&self, context: XNode<'_, '_>) -> Result<Value, Error> {
        match self {
            Shape::Leaf(leaf) => leaf.evaluate(context),
            Shape::Object(fields) => {
                let mut output = Map::with_capacity(fields.len());
                for (key, shape) in fields {
                    output.insert(key.clone(), shape.evaluate(context)?);
                }
                Ok(Value::Object(output))
            }
            Shape::EmptyArray => Ok(Value::Array(Vec::new())),
            Shape::Array { base, inner } => {
                let nodes = base.evaluate_node_set(context)?;
                let items: Vec<Value> = match inner {
                    Some(inner) => nodes
                        .into_iter()
                        .map(|node| inner.evaluate(node))
                        .collect::<Result<_, Error>>()?,
                    None => nodes
                        .iter()
                        .map(|node| Value::String(node.string_value()))
                        .collect(),
                };
                Ok(Value::Array(items))
            }
        }
    }
}

/// A compiled string template.
enum Leaf {
    Empty,
    Constant(String),
    Query(XPath, ReturnType),
}

impl Leaf {
    fn compile(expr: &str) -> Result<Leaf, Error> {
        if expr.is_empty() {
            return Ok(Leaf::Empty);
        }
        if let Some(constant) = expr.strip_prefix('#') {
            return Ok(Leaf::Constant(constant.to_string()));
        }
        Ok(Leaf::Query(XPath::compile(expr)?, ReturnType::of(expr)))
    }

    fn evaluate(&self, context: XNode<'_, '_>) -> Result<Value, Error> {
        let (query, return_type) = match self {
            Leaf::Empty => return Ok(Value::String(String::new())),
            Leaf::Constant(constant) => return Ok(Value::String(constant.clone())),
            Leaf::Query(query, return_type) => (query, return_type),
        };
        let result = query.evaluate(context)?;
        let value = match return_type {
            ReturnType::Boolean => Value::Bool(result.to_boolean()),
            ReturnType::Number => number_value(result.to_number()),
            ReturnType::String => Value::String(result.to_string_value()),
        };
        Ok(value)
    }
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::config::Check;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const XML: &str = r#"<shop name="corner">
  <product sku="a1"><name>Apple</name><price>0.5</price><tag>fruit</tag><tag>red</tag></product>
  <product sku="b2"><name>Bread</name><price>2</price></product>
</shop>"#;

    fn run(template: Value) -> Value {
        transform(XML, &template, &TransformOptions::default()).unwrap()
    }

    #[test]
    fn return_type_follows_leading_function() {
        assert_eq!(ReturnType::of("count(//a)"), ReturnType::Number);
        assert_eq!(ReturnType::of("round(1.5)"), ReturnType::Number);
        assert_eq!(ReturnType::of("boolean(//a)"), ReturnType::Boolean);
        assert_eq!(ReturnType::of("string(count(//a))"), ReturnType::String);
        assert_eq!(ReturnType::of("//a"), ReturnType::String);
    }

    #[test]
    fn object_template_preserves_key_order() {
        let output = run(json!({
            "shop": "/shop/@name",
            "count": "count(//product)",
            "cheap": "boolean(//product[price < 1])",
            "first": "//product[1]/name",
        }));
        assert_eq!(
            output,
            json!({ "shop": "corner", "count": 2, "cheap": true, "first": "Apple" })
        );
        let keys: Vec<_> = output.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["shop", "count", "cheap", "first"]);
    }

    #[test]
    fn array_templates_map_each_node() {
        let output = run(json!({
            "products": ["//product", {
                "sku": "@sku",
                "name": "name",
                "price": "number(price)",
                "tags": ["tag", "."],
            }]
        }));
        assert_eq!(
            output,
            json!({
                "products": [
                    { "sku": "a1", "name": "Apple", "price": 0.5, "tags": ["fruit", "red"] },
                    { "sku": "b2", "name": "Bread", "price": 2, "tags": [] },
                ]
            })
        );
    }

    #[test]
    fn attribute_matches_are_contexts_for_inner_objects() {
        let output = run(json!({
            "skus": ["//product/@sku", { "v": ".", "n": "name()", "owner": "../name" }]
        }));
        assert_eq!(
            output,
            json!({
                "skus": [
                    { "v": "a1", "n": "sku", "owner": "Apple" },
                    { "v": "b2", "n": "sku", "owner": "Bread" },
                ]
            })
        );
    }

    #[test]
    fn inner_string_templates_are_typed() {
        let output = run(json!({ "prices": ["//price", "number(.)"], "flags": ["//product", "boolean(tag)"] }));
        assert_eq!(output, json!({ "prices": [0.5, 2], "flags": [true, false] }));
    }

    #[test]
    fn top_level_array_template() {
        let output = run(json!(["//product", "@sku"]));
        assert_eq!(output, json!(["a1", "b2"]));

        let output = run(json!(["//product/@sku"]));
        assert_eq!(output, json!(["a1", "b2"]));
    }

    #[test]
    fn constants_empty_strings_and_nesting() {
        let output = run(json!({
            "source": "#static value",
            "blank": "",
            "meta": { "products": "count(//product)", "empty": [] },
        }));
        assert_eq!(
            output,
            json!({
                "source": "static value",
                "blank": "",
                "meta": { "products": 2, "empty": [] },
            })
        );
    }

    #[test]
    fn non_finite_numbers_become_null() {
        let output = run(json!({ "missing": "number(//nothing)", "inf": "number(1 div 0)" }));
        assert_eq!(output, json!({ "missing": null, "inf": null }));
    }

    #[test]
    fn malformed_document_without_check_is_empty() {
        let output = transform("<a>", &json!({ "a": "a" }), &TransformOptions::default()).unwrap();
        assert_eq!(output, json!({}));
    }

    #[test]
    fn malformed_document_with_check_is_type_mismatch() {
        let options = TransformOptions::default().with_check(Check::ValidXml);
        let err = transform("<a>", &json!({ "a": "a" }), &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn unsupported_templates_are_type_mismatches() {
        let err = transform(XML, &json!("//a"), &TransformOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Template(TemplateError::UnsupportedRoot { found: "string" })
        ));
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        let err = transform(XML, &json!({ "n": 1 }), &TransformOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Template(TemplateError::UnsupportedNode { ref key, found: "number" }) if key == "n"
        ));

        let err = transform(XML, &json!({ "a": ["//a", "b", "c"] }), &TransformOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Template(TemplateError::InvalidArray { .. })));
    }

    #[test]
    fn bad_expressions_are_invalid_queries() {
        let err = transform(XML, &json!({ "a": "//a[" }), &TransformOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidQuery);

        let err = transform(XML, &json!({ "a": ["count(//a)", "."] }), &TransformOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidQuery);
    }

    #[test]
    fn inner_templates_compile_even_without_matches() {
        let err = transform(
            XML,
            &json!({ "a": ["//missing", { "b": "foo(" }] }),
            &TransformOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidQuery);

        let output = transform("<a>", &json!({ "a": "foo(" }), &TransformOptions::default()).unwrap();
        assert_eq!(output, json!({}));
    }

    #[test]
    fn validate_template_compiles_every_expression() {
        assert!(validate_template(&json!({ "a": ["//a", { "b": "@b" }], "c": "#x" })).is_ok());
        let err = validate_template(&json!({ "a": { "b": "foo(" } })).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidQuery);
        assert!(validate_template(&json!(true)).is_err());
    }
}
