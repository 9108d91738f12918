//! XPath 1.0 queries over parsed documents.
//!
//! Supports the full expression grammar, every axis except `namespace`, and the
//! node-set, string, boolean and number function libraries. Variables and
//! extension functions are not supported.
//!
//! # Examples
//! ```rust
//! use xshape_core::document::parse_document;
//! use xshape_core::xpath::XPath;
//!
//! let doc = parse_document("<order><item price='2'/><item price='3'/></order>")?;
//! let total = XPath::compile("sum(//item/@price)")?.evaluate_number(doc.root())?;
//! assert_eq!(total, 5.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
mod ast;
mod eval;
mod lexer;
mod parser;

use roxmltree::Node;
use thiserror::Error;

pub use eval::{Value, XNode, format_number, parse_number};

use ast::Expr;
use eval::{Context, evaluate};

/// Errors raised while compiling or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XPathError {
    #[error("invalid xpath '{expr}' at {offset}: {message}")]
    Syntax {
        expr: String,
        offset: usize,
        message: String,
    },
    #[error("unknown xpath function: {name}()")]
    UnknownFunction { name: String },
    #[error("wrong number of arguments to {name}(): {given}")]
    Arity { name: String, given: usize },
    #[error("{operator} expects a node-set")]
    NotANodeSet { operator: String },
}

/// A compiled XPath expression.
#[derive(Debug, Clone, PartialEq)]
pub struct XPath {
    source: String,
    expr: Expr,
}

impl XPath {
    pub fn compile(source: &str) -> Result<Self, XPathError> {
        let expr = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate<'a, 'input>(
        &self,
        context: XNode<'a, 'input>,
    ) -> Result<Value<'a, 'input>, XPathError> {
        evaluate(&self.expr, &Context::new(context))
    }

    pub fn evaluate_string(&self, node: Node<'_, '_>) -> Result<String, XPathError> {
        self.evaluate(XNode::Node(node))
            .map(|value| value.to_string_value())
    }

    pub fn evaluate_number(&self, node: Node<'_, '_>) -> Result<f64, XPathError> {
        self.evaluate(XNode::Node(node)).map(|value| value.to_number())
    }

    pub fn evaluate_boolean(&self, node: Node<'_, '_>) -> Result<bool, XPathError> {
        self.evaluate(XNode::Node(node)).map(|value| value.to_boolean())
    }

    pub fn evaluate_node_set<'a, 'input>(
        &self,
        context: XNode<'a, 'input>,
    ) -> Result<Vec<XNode<'a, 'input>>, XPathError> {
        match self.evaluate(context)? {
            Value::NodeSet(nodes) => Ok(nodes),
            _ => Err(XPathError::NotANodeSet {
                operator: self.source.clone(),
            }),
        }
    }
}
