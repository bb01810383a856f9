use std::io;

use thiserror::Error;

/// Boxed error returned by a failing [`DocumentHandler`](crate::DocumentHandler).
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Payload carried inside an [`io::Error`] when a
/// [`LimitedReader`](crate::LimitedReader) crosses its byte limit.
///
/// It travels through `AsyncRead` plumbing as an I/O error and is recovered
/// into [`IngestError::SizeExceeded`] by the `From<io::Error>` conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("request body exceeds maximum size of {limit} bytes")]
pub struct SizeLimitExceeded {
    /// The configured limit, in bytes.
    pub limit: usize,
}

/// Errors that terminate the ingestion of a request body.
#[derive(Debug, Error)]
pub enum IngestError {
    /// More than `max_size` bytes were read from the request body.
    #[error("request body exceeds maximum size of {limit} bytes")]
    SizeExceeded { limit: usize },

    /// A single JSON body is not valid JSON.
    #[error("invalid JSON: {0}")]
    Syntax(#[source] serde_json::Error),

    /// One line of an NDJSON stream is not valid JSON.
    #[error("invalid JSON on line {line}: {source}")]
    LineSyntax {
        /// 1-based line number within the stream.
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// The stream carried more documents than `max_documents`.
    #[error("document limit of {limit} exceeded")]
    TooManyDocuments { limit: usize },

    /// Reading the body failed (connection reset, aborted upload, ...).
    #[error("failed to read request body: {0}")]
    Io(#[source] io::Error),

    /// The caller-supplied document handler returned an error.
    #[error("document handler failed: {0}")]
    Handler(#[source] HandlerError),
}

impl IngestError {
    /// `true` for JSON syntax failures (single document or stream line).
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax(_) | Self::LineSyntax { .. })
    }

    /// `true` when the sender is at fault and a 400 reply is appropriate.
    ///
    /// Size violations are transport-class and reply 500.
    pub fn is_client_error(&self) -> bool {
        self.is_syntax() || matches!(self, Self::TooManyDocuments { .. })
    }

    /// HTTP status code for a reply caused by this error.
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() { 400 } else { 500 }
    }
}

impl From<io::Error> for IngestError {
    fn from(err: io::Error) -> Self {
        let limit = err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<SizeLimitExceeded>())
            .map(|exceeded| exceeded.limit);

        match limit {
            Some(limit) => Self::SizeExceeded { limit },
            None => Self::Io(err),
        }
    }
}

impl From<SizeLimitExceeded> for io::Error {
    fn from(err: SizeLimitExceeded) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

/// Errors raised while building or loading an ingestion configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `IngestConfigBuilder::build` was called without a document handler.
    #[error("a document handler is required")]
    MissingDocumentHandler,

    /// A limit was set to zero.
    #[error("{name} must be a positive integer")]
    InvalidLimit { name: &'static str },

    /// Layered configuration sources could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}
