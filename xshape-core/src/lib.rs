//! Shape XML documents into JSON with XPath templates.
//!
//! # Examples
//! ```rust
//! use serde_json::json;
//! use xshape_core::{transform, Check, ErrorKind, TransformOptions};
//!
//! let options = TransformOptions::default().with_check(Check::ValidXml);
//! let err = transform("<tag>invalid xml<ta/>", &json!({}), &options).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::TypeMismatch);
//! ```
pub mod config;
pub mod document;
pub mod json;
pub mod pretty;
pub mod runtime;
pub mod template;
pub mod xpath;

pub use config::{Check, Config, ConfigError, PrettyPrintOptions, TransformOptions};
pub use document::DocumentError;
pub use json::to_json;
pub use pretty::{PrettyPrintError, pretty_print};
pub use runtime::Transformer;
pub use template::{TemplateError, transform};
pub use xpath::XPathError;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input or template does not have the expected shape, including
    /// documents that are not well-formed XML.
    TypeMismatch,
    /// An XPath expression failed to compile or evaluate.
    InvalidQuery,
    /// The worker running the operation failed.
    Runtime,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TypeMismatch => "type_mismatch",
            ErrorKind::InvalidQuery => "invalid_query",
            ErrorKind::Runtime => "runtime",
        }
    }
}

/// Top-level error wrapper for core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    XPath(#[from] XPathError),
    #[error(transparent)]
    PrettyPrint(#[from] PrettyPrintError),
    #[error("worker failed: {0}")]
    Worker(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Document(_) | Error::Config(_) | Error::Template(_) => ErrorKind::TypeMismatch,
            Error::XPath(_) => ErrorKind::InvalidQuery,
            Error::PrettyPrint(_) | Error::Worker(_) => ErrorKind::Runtime,
        }
    }
}
