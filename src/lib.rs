//! # ndjson-ingest
//!
//! A **request-body ingestion layer** for JSON and newline-delimited JSON
//! (NDJSON). Each decoded document is handed to a caller-supplied async
//! handler, under a byte limit for the whole body and a count limit for
//! streams, and the request is answered with a status and summary.
//!
//! | `Content-Type` | Path | Success reply |
//! |---|---|---|
//! | `application/json` | one document, buffered up to `max_size` | `202 Accepted` |
//! | `application/x-ndjson` | documents streamed line by line | `202 {"accepted":N,"rejected":0}` |
//! | anything else | rejected | `415 Unsupported Media Type` |
//!
//! Streams stop at the first bad line; documents before it stay accepted.
//!
//! ## Quick start — one-shot ingestion
//!
//! ```rust
//! # tokio_test::block_on(async {
//! use ndjson_ingest::{ingest_bytes, Document, HandlerError, IngestConfig, Reply};
//!
//! let config = IngestConfig::new(|doc: Document| async move {
//!     println!("got {doc}");
//!     Ok::<(), HandlerError>(())
//! });
//!
//! let outcome = ingest_bytes(config, "application/x-ndjson", b"{\"A\":1}\n{\"B\":").await;
//! assert_eq!(outcome.accepted(), 1);
//! assert_eq!(outcome.rejected(), 1);
//! assert_eq!(Reply::from_outcome(&outcome).status(), 400);
//! # });
//! ```
//!
//! ## Quick start — serving requests
//!
//! ```rust
//! # tokio_test::block_on(async {
//! use ndjson_ingest::{IngestConfig, IngestRequest, Ingestor, RecordedResponse};
//! use ndjson_ingest::{Document, HandlerError};
//!
//! let config = IngestConfig::builder()
//!     .document_handler(|_doc: Document| async { Ok::<(), HandlerError>(()) })
//!     .max_size(64 * 1024)
//!     .max_documents(500)
//!     .build()
//!     .unwrap();
//! let ingestor = Ingestor::new(config);
//!
//! let request = IngestRequest::new(&b"{\"foo\":13}"[..]).with_content_type("application/json");
//! let mut response = RecordedResponse::new();
//! ingestor.handle(request, &mut response).await;
//!
//! assert_eq!(response.status(), Some(202));
//! assert_eq!(response.body_as_str(), Some("Accepted\n"));
//! # });
//! ```

mod classify;
mod config;
mod decoder;
mod engine;
mod error;
mod limit;
mod output;
mod response;
mod types;

// Re-export public API.
pub use classify::{ContentKind, JSON, NDJSON, TEXT, classify};
pub use crate::config::{
    CONFIG_FILE, DEFAULT_MAX_DOCUMENTS, DEFAULT_MAX_SIZE, DocumentHandler, ENV_PREFIX,
    ErrorHandler, IngestConfig, IngestConfigBuilder, IngestLimits, LogErrorHandler,
};
pub use decoder::DocumentStream;
pub use engine::Ingestor;
pub use error::{ConfigError, HandlerError, IngestError, SizeLimitExceeded};
pub use limit::{LimitedReader, read_at_most};
pub use output::{format_debug, format_json, format_status_line};
pub use response::{RecordedResponse, Reply, ResponseSink, reason_phrase};
pub use types::{Document, IngestOutcome, IngestRequest, StreamSummary};

/// Ingest a **complete** in-memory body in one call.
///
/// This is a convenience wrapper around [`Ingestor`]. For live requests,
/// create an `Ingestor` once and call [`Ingestor::handle`] per request.
pub async fn ingest_bytes(config: IngestConfig, content_type: &str, body: &[u8]) -> IngestOutcome {
    let request = IngestRequest::new(body).with_content_type(content_type);
    Ingestor::new(config).ingest(request).await
}
