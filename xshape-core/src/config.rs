//! Options and runtime configuration.
use serde::{Deserialize, Serialize};
use std::{num::NonZeroUsize, str::FromStr};
use thiserror::Error;

/// Upfront checks a caller can request before a document is processed.
///
/// # Examples
/// ```rust
/// use std::str::FromStr;
/// use xshape_core::config::Check;
///
/// let check = Check::from_str("valid_xml")?;
/// assert_eq!(check, Check::ValidXml);
/// # Ok::<(), xshape_core::config::ConfigError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Check {
    /// Reject documents that are not well-formed XML.
    #[serde(rename = "valid_xml")]
    ValidXml,
}

/// Error returned when options cannot be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown check: {input}")]
    UnknownCheck { input: String },
    #[error("invalid options: {message}")]
    InvalidOptions { message: String },
}

impl FromStr for Check {
    type Err = ConfigError;
    fn from_str(check: &str) -> Result<Check, ConfigError> {
        match check.to_ascii_lowercase().as_str() {
            "valid_xml" => Ok(Check::ValidXml),
            _ => Err(ConfigError::UnknownCheck {
                input: check.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Check {
    type Error = ConfigError;
    fn try_from(check: String) -> Result<Check, ConfigError> {
        Check::from_str(&check)
    }
}

impl Check {
    pub fn as_str(&self) -> &'static str {
        match self {
            Check::ValidXml => "valid_xml",
        }
    }
}

/// Per-call options for `transform` and `to_json`.
///
/// Without a check, a document that fails to parse produces an empty result.
/// With [`Check::ValidXml`] it produces a type-mismatch error instead.
///
/// # Examples
/// ```rust
/// use xshape_core::config::{Check, TransformOptions};
///
/// let options: TransformOptions = serde_json::from_str(r#"{"check":"valid_xml"}"#)?;
/// assert_eq!(options, TransformOptions::default().with_check(Check::ValidXml));
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<Check>,
}

impl TransformOptions {
    pub fn with_check(mut self, check: Check) -> Self {
        self.check = Some(check);
        self
    }

    pub fn validates(&self) -> bool {
        matches!(self.check, Some(Check::ValidXml))
    }

    /// Parse options from their JSON form. Blank input means the defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).map_err(|e| ConfigError::InvalidOptions {
            message: e.to_string(),
        })
    }
}

/// Options for [`crate::pretty::pretty_print`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrettyPrintOptions {
    pub indent_size: usize,
}

impl Default for PrettyPrintOptions {
    fn default() -> Self {
        Self { indent_size: 2 }
    }
}

impl PrettyPrintOptions {
    pub fn new(indent_size: usize) -> Self {
        Self { indent_size }
    }
}

/// Configuration for the async [`crate::runtime::Transformer`].
///
/// # Examples
/// ```rust
/// use xshape_core::config::Config;
///
/// let config = Config::new(4);
/// assert_eq!(config.max_workers(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    max_workers: usize,
}

impl Config {
    /// A worker count of zero is raised to one.
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }
}

impl Default for Config {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Config::new(workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_parses_case_insensitively() {
        assert_eq!(Check::from_str("VALID_XML"), Ok(Check::ValidXml));
        assert_eq!(Check::ValidXml.as_str(), "valid_xml");
    }

    #[test]
    fn unknown_check_is_rejected() {
        let err = Check::from_str("valid_json").unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownCheck {
                input: "valid_json".into()
            }
        );
    }

    #[test]
    fn options_from_json() {
        let options = TransformOptions::from_json(r#"{"check":"valid_xml"}"#).unwrap();
        assert!(options.validates());

        let options = TransformOptions::from_json("").unwrap();
        assert!(!options.validates());

        let options = TransformOptions::from_json("{}").unwrap();
        assert_eq!(options.check, None);

        let options = TransformOptions::from_json(r#"{"check":"Valid_Xml"}"#).unwrap();
        assert_eq!(options.check, Some(Check::ValidXml));
    }

    #[test]
    fn options_from_json_reports_unknown_check() {
        let err = TransformOptions::from_json(r#"{"check":"schema"}"#).unwrap_err();
        let ConfigError::InvalidOptions { message } = err else {
            panic!("expected invalid options, got {err:?}");
        };
        assert!(message.contains("unknown check: schema"), "{message}");

        let err = TransformOptions::from_json(r#"{"verify":true}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOptions { .. }));

        let err = TransformOptions::from_json(r#"{"check":1}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOptions { .. }));
    }

    #[test]
    fn serde_and_from_json_agree() {
        for json in [
            r#"{"check":"VALID_XML"}"#,
            r#"{"check":"valid_xml"}"#,
            r#"{"check":null}"#,
            "{}",
        ] {
            let via_serde: TransformOptions = serde_json::from_str(json).unwrap();
            assert_eq!(TransformOptions::from_json(json).unwrap(), via_serde, "{json}");
        }
        let err = serde_json::from_str::<TransformOptions>(r#"{"check":"schema"}"#).unwrap_err();
        assert!(err.to_string().contains("unknown check: schema"));
    }

    #[test]
    fn pretty_print_options_use_camel_case() {
        let opts: PrettyPrintOptions = serde_json::from_str(r#"{"indentSize":4}"#).unwrap();
        assert_eq!(opts, PrettyPrintOptions::new(4));
        assert_eq!(PrettyPrintOptions::default().indent_size, 2);
    }

    #[test]
    fn config_never_has_zero_workers() {
        assert_eq!(Config::new(0).max_workers(), 1);
        assert!(Config::default().max_workers() >= 1);
    }
}
