//! Async front-end that runs transformations on the blocking pool.
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{Instrument, debug_span};

use crate::config::{Config, PrettyPrintOptions, TransformOptions};
use crate::{Error, json, pretty, template};

/// Runs transformations off the async executor, at most
/// [`Config::max_workers`] at a time.
///
/// # Examples
/// ```rust
/// use serde_json::json;
/// use xshape_core::{Check, ErrorKind, TransformOptions, Transformer};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let transformer = Transformer::default();
/// let options = TransformOptions::default().with_check(Check::ValidXml);
/// let err = transformer
///     .transform("Too Many Requests", json!({}), options)
///     .await
///     .unwrap_err();
/// assert_eq!(err.kind(), ErrorKind::TypeMismatch);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct Transformer {
    config: Config,
    permits: Arc<Semaphore>,
}

impl Default for Transformer {
    fn default() -> Self {
        Transformer::new(Config::default())
    }
}

impl Transformer {
    pub fn new(config: Config) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_workers()));
        Self { config, permits }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    async fn run<T, F>(&self, job: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, Error> + Send + 'static,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| Error::Worker(e.to_string()))?;
        tokio::task::spawn_blocking(job)
            .await
            .map_err(|e| Error::Worker(e.to_string()))?
    }

    /// Async counterpart of [`crate::transform`].
    pub async fn transform(
        &self,
        xml: impl Into<String>,
        template: Value,
        options: TransformOptions,
    ) -> Result<Value, Error> {
        let xml = xml.into();
        let span = debug_span!("transform", bytes = xml.len(), check = ?options.check);
        self.run(move || template::transform(&xml, &template, &options))
            .instrument(span)
            .await
    }

    /// Async counterpart of [`crate::to_json`].
    pub async fn to_json(
        &self,
        xml: impl Into<String>,
        options: TransformOptions,
    ) -> Result<Value, Error> {
        let xml = xml.into();
        let span = debug_span!("to_json", bytes = xml.len(), check = ?options.check);
        self.run(move || json::to_json(&xml, &options))
            .instrument(span)
            .await
    }

    /// Async counterpart of [`crate::pretty_print`].
    pub async fn pretty_print(
        &self,
        xml: impl Into<String>,
        options: PrettyPrintOptions,
        transform_options: TransformOptions,
    ) -> Result<String, Error> {
        let xml = xml.into();
        let span = debug_span!("pretty_print", bytes = xml.len(), indent = options.indent_size);
        self.run(move || pretty::pretty_print(&xml, &options, &transform_options))
            .instrument(span)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::config::Check;
    use serde_json::json;

    #[tokio::test]
    async fn runs_transform_on_blocking_pool() {
        let transformer = Transformer::new(Config::new(1));
        let output = transformer
            .transform("<a><b>1</b></a>", json!({ "b": "number(/a/b)" }), TransformOptions::default())
            .await
            .unwrap();
        assert_eq!(output, json!({ "b": 1 }));
    }

    #[tokio::test]
    async fn concurrent_calls_share_permits() {
        let transformer = Transformer::new(Config::new(2));
        let options = TransformOptions::default().with_check(Check::ValidXml);
        let calls: Vec<_> = (0..8)
            .map(|i| {
                let transformer = transformer.clone();
                tokio::spawn(async move {
                    transformer
                        .transform(format!("<n>{i}</n>"), json!({ "n": "number(/n)" }), options)
                        .await
                })
            })
            .collect();
        let mut seen = Vec::new();
        for call in calls {
            let output = call.await.unwrap().unwrap();
            seen.push(output["n"].as_i64().unwrap());
        }
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
        assert_eq!(transformer.permits.available_permits(), 2);
    }

    #[tokio::test]
    async fn async_errors_keep_their_kind() {
        let transformer = Transformer::default();
        let options = TransformOptions::default().with_check(Check::ValidXml);
        let err = transformer.to_json("<a>", options).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        let pretty = transformer
            .pretty_print("<a><b/></a>", PrettyPrintOptions::new(1), options)
            .await
            .unwrap();
        assert_eq!(pretty, "<a>\n <b/>\n</a>\n");
    }
}
