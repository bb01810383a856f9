use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, HandlerError, IngestError};
use crate::types::Document;

/// Default `max_size`: 10 MiB.
pub const DEFAULT_MAX_SIZE: usize = 10 * 1024 * 1024;
/// Default `max_documents`.
pub const DEFAULT_MAX_DOCUMENTS: usize = 10_000;

/// Environment variable prefix read by [`IngestLimits::load`].
pub const ENV_PREFIX: &str = "NDJSON_INGEST";
/// Optional config file (any extension the `config` crate knows).
pub const CONFIG_FILE: &str = "ndjson-ingest";

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Receives every decoded document, in arrival order.
///
/// The engine awaits each call before counting the document as accepted and
/// before decoding the next one. Any closure
/// `Fn(Document) -> impl Future<Output = Result<(), HandlerError>>` is a
/// handler.
#[async_trait]
pub trait DocumentHandler: Send + Sync {
    async fn handle(&self, document: Document) -> Result<(), HandlerError>;
}

#[async_trait]
impl<F, Fut> DocumentHandler for F
where
    F: Fn(Document) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, document: Document) -> Result<(), HandlerError> {
        (self)(document).await
    }
}

/// Told about every error that terminates an ingestion.
pub trait ErrorHandler: Send + Sync {
    fn handle_error(&self, error: &IngestError);
}

impl<F> ErrorHandler for F
where
    F: Fn(&IngestError) + Send + Sync,
{
    fn handle_error(&self, error: &IngestError) {
        (self)(error)
    }
}

/// Default error handler: logs the error and does nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrorHandler;

impl ErrorHandler for LogErrorHandler {
    fn handle_error(&self, error: &IngestError) {
        tracing::error!(error = %error, "document ingestion failed");
    }
}

// ---------------------------------------------------------------------------
// IngestLimits
// ---------------------------------------------------------------------------

/// Size and count bounds applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestLimits {
    /// Maximum body size in bytes. For streams this bounds the whole body.
    pub max_size: usize,
    /// Maximum number of documents accepted from one stream.
    pub max_documents: usize,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            max_documents: DEFAULT_MAX_DOCUMENTS,
        }
    }
}

impl IngestLimits {
    /// Reject zero limits.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.max_size == 0 {
            return Err(ConfigError::InvalidLimit { name: "max_size" });
        }
        if self.max_documents == 0 {
            return Err(ConfigError::InvalidLimit {
                name: "max_documents",
            });
        }
        Ok(self)
    }

    /// Load limits from defaults, then `ndjson-ingest.*` in the working
    /// directory, then `NDJSON_INGEST_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(CONFIG_FILE)
    }

    /// Like [`IngestLimits::load`] with an explicit file name (extension
    /// optional). A missing file is not an error.
    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let limits: Self = settings.try_deserialize()?;
        limits.validate()
    }
}

// ---------------------------------------------------------------------------
// IngestConfig
// ---------------------------------------------------------------------------

/// Handlers and limits of one ingestion engine.
#[derive(Clone)]
pub struct IngestConfig {
    document_handler: Arc<dyn DocumentHandler>,
    error_handler: Arc<dyn ErrorHandler>,
    limits: IngestLimits,
}

impl IngestConfig {
    /// A configuration with `handler` and every default.
    pub fn new<H: DocumentHandler + 'static>(handler: H) -> Self {
        Self {
            document_handler: Arc::new(handler),
            error_handler: Arc::new(LogErrorHandler),
            limits: IngestLimits::default(),
        }
    }

    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }

    pub fn document_handler(&self) -> Arc<dyn DocumentHandler> {
        Arc::clone(&self.document_handler)
    }

    pub fn error_handler(&self) -> Arc<dyn ErrorHandler> {
        Arc::clone(&self.error_handler)
    }

    pub fn limits(&self) -> IngestLimits {
        self.limits
    }

    pub fn max_size(&self) -> usize {
        self.limits.max_size
    }

    pub fn max_documents(&self) -> usize {
        self.limits.max_documents
    }

    pub fn set_document_handler<H: DocumentHandler + 'static>(&mut self, handler: H) {
        self.document_handler = Arc::new(handler);
    }

    pub fn set_error_handler<E: ErrorHandler + 'static>(&mut self, handler: E) {
        self.error_handler = Arc::new(handler);
    }

    pub fn set_max_size(&mut self, max_size: usize) -> Result<(), ConfigError> {
        self.set_limits(IngestLimits {
            max_size,
            ..self.limits
        })
    }

    pub fn set_max_documents(&mut self, max_documents: usize) -> Result<(), ConfigError> {
        self.set_limits(IngestLimits {
            max_documents,
            ..self.limits
        })
    }

    pub fn set_limits(&mut self, limits: IngestLimits) -> Result<(), ConfigError> {
        self.limits = limits.validate()?;
        Ok(())
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

/// Builder for [`IngestConfig`]. A document handler is mandatory.
#[derive(Default)]
pub struct IngestConfigBuilder {
    document_handler: Option<Arc<dyn DocumentHandler>>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    limits: IngestLimits,
}

impl IngestConfigBuilder {
    pub fn document_handler<H: DocumentHandler + 'static>(mut self, handler: H) -> Self {
        self.document_handler = Some(Arc::new(handler));
        self
    }

    pub fn error_handler<E: ErrorHandler + 'static>(mut self, handler: E) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn max_size(mut self, max_size: usize) -> Self {
        self.limits.max_size = max_size;
        self
    }

    pub fn max_documents(mut self, max_documents: usize) -> Self {
        self.limits.max_documents = max_documents;
        self
    }

    pub fn limits(mut self, limits: IngestLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn build(self) -> Result<IngestConfig, ConfigError> {
        let document_handler = self
            .document_handler
            .ok_or(ConfigError::MissingDocumentHandler)?;

        Ok(IngestConfig {
            document_handler,
            error_handler: self
                .error_handler
                .unwrap_or_else(|| Arc::new(LogErrorHandler)),
            limits: self.limits.validate()?,
        })
    }
}

impl fmt::Debug for IngestConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfigBuilder")
            .field("has_document_handler", &self.document_handler.is_some())
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests (unit)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    async fn ignore(_: Document) -> Result<(), HandlerError> {
        Ok(())
    }

    #[test]
    fn handler_only_config_uses_defaults() {
        let config = IngestConfig::new(ignore);
        assert_eq!(config.limits(), IngestLimits::default());
        assert_eq!(config.max_size(), DEFAULT_MAX_SIZE);
        assert_eq!(config.max_documents(), DEFAULT_MAX_DOCUMENTS);
    }

    #[test]
    fn builder_requires_document_handler() {
        let err = IngestConfig::builder().max_size(10).build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingDocumentHandler));
    }

    #[test]
    fn builder_applies_options() {
        let config = IngestConfig::builder()
            .document_handler(ignore)
            .error_handler(|_: &IngestError| {})
            .max_size(3000)
            .max_documents(100)
            .build()
            .unwrap();
        assert_eq!(config.max_size(), 3000);
        assert_eq!(config.max_documents(), 100);
    }

    #[test]
    fn zero_limits_are_rejected() {
        let err = IngestConfig::builder()
            .document_handler(ignore)
            .max_documents(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLimit { name: "max_documents" }));

        let mut config = IngestConfig::new(ignore);
        assert!(config.set_max_size(0).is_err());
        assert_eq!(config.max_size(), DEFAULT_MAX_SIZE);
    }

    #[test]
    fn limits_load_from_file_over_defaults() {
        let dir = std::env::temp_dir().join(format!("ndjson-ingest-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("limits.toml");
        std::fs::write(&path, "max_documents = 25\n").unwrap();

        let limits = IngestLimits::load_from(path.to_str().unwrap()).unwrap();

        assert_eq!(limits.max_documents, 25);
        assert_eq!(limits.max_size, DEFAULT_MAX_SIZE);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_yields_defaults() {
        let limits = IngestLimits::load_from("/nonexistent/ndjson-ingest-limits").unwrap();
        assert_eq!(limits.max_documents, DEFAULT_MAX_DOCUMENTS);
    }

    #[test]
    fn zero_in_file_is_invalid() {
        let dir = std::env::temp_dir().join(format!("ndjson-ingest-zero-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("limits.json");
        std::fs::write(&path, r#"{"max_size": 0}"#).unwrap();

        let err = IngestLimits::load_from(path.to_str().unwrap()).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidLimit { name: "max_size" }));
        std::fs::remove_dir_all(&dir).ok();
    }
}
