use std::sync::{Arc, PoisonError, RwLock};

use tokio::io::AsyncRead;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::classify::ContentKind;
use crate::config::{DocumentHandler, ErrorHandler, IngestConfig, IngestLimits};
use crate::decoder::DocumentStream;
use crate::error::{ConfigError, IngestError};
use crate::limit::read_at_most;
use crate::response::{Reply, ResponseSink};
use crate::types::{Document, IngestOutcome, IngestRequest};

/// Ingests JSON and NDJSON request bodies into a [`DocumentHandler`].
///
/// One `Ingestor` serves any number of requests, concurrently if shared
/// behind an [`Arc`]. Counters are per request; the configuration is shared
/// and may be changed at any time through the setters. The document handler
/// is looked up again for every document, so a swap takes effect mid-stream.
///
/// ```rust
/// # tokio_test::block_on(async {
/// use ndjson_ingest::{Document, HandlerError, IngestRequest, Ingestor, RecordedResponse};
///
/// let ingestor = Ingestor::with_handler(|doc: Document| async move {
///     assert!(doc.is_object());
///     Ok::<(), HandlerError>(())
/// });
///
/// let request = IngestRequest::new(&b"{\"A\":1}\n{\"B\":2}\n"[..])
///     .with_content_type("application/x-ndjson");
/// let mut response = RecordedResponse::new();
/// let outcome = ingestor.handle(request, &mut response).await;
///
/// assert_eq!(outcome.accepted(), 2);
/// assert_eq!(response.status(), Some(202));
/// assert_eq!(response.body_as_str(), Some(r#"{"accepted":2,"rejected":0}"#));
/// # });
/// ```
#[derive(Debug)]
pub struct Ingestor {
    config: RwLock<IngestConfig>,
}

impl Ingestor {
    pub fn new(config: IngestConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// An ingestor with `handler` and default limits and error handling.
    pub fn with_handler<H: DocumentHandler + 'static>(handler: H) -> Self {
        Self::new(IngestConfig::new(handler))
    }

    // ----- configuration ---------------------------------------------------

    /// A snapshot of the current configuration.
    pub fn config(&self) -> IngestConfig {
        self.read_config().clone()
    }

    pub fn document_handler(&self) -> Arc<dyn DocumentHandler> {
        self.read_config().document_handler()
    }

    pub fn error_handler(&self) -> Arc<dyn ErrorHandler> {
        self.read_config().error_handler()
    }

    pub fn limits(&self) -> IngestLimits {
        self.read_config().limits()
    }

    pub fn max_size(&self) -> usize {
        self.limits().max_size
    }

    pub fn max_documents(&self) -> usize {
        self.limits().max_documents
    }

    pub fn set_document_handler<H: DocumentHandler + 'static>(&self, handler: H) {
        self.write_config().set_document_handler(handler);
    }

    pub fn set_error_handler<E: ErrorHandler + 'static>(&self, handler: E) {
        self.write_config().set_error_handler(handler);
    }

    pub fn set_max_size(&self, max_size: usize) -> Result<(), ConfigError> {
        self.write_config().set_max_size(max_size)
    }

    pub fn set_max_documents(&self, max_documents: usize) -> Result<(), ConfigError> {
        self.write_config().set_max_documents(max_documents)
    }

    pub fn set_limits(&self, limits: IngestLimits) -> Result<(), ConfigError> {
        self.write_config().set_limits(limits)
    }

    // The lock is never held across an await, so a poisoned lock still
    // holds a consistent config.
    fn read_config(&self) -> std::sync::RwLockReadGuard<'_, IngestConfig> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_config(&self) -> std::sync::RwLockWriteGuard<'_, IngestConfig> {
        self.config.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ----- ingestion -------------------------------------------------------

    /// Ingest `request` and write exactly one reply to `response`.
    ///
    /// A reply that cannot be delivered (the client went away) is logged and
    /// otherwise ignored; the outcome is returned either way.
    pub async fn handle<R, S>(&self, request: IngestRequest<R>, response: &mut S) -> IngestOutcome
    where
        R: AsyncRead + Unpin + Send,
        S: ResponseSink + ?Sized,
    {
        let outcome = self.ingest(request).await;

        if let Err(err) = Reply::from_outcome(&outcome).write_to(response) {
            warn!(error = %err, "failed to deliver ingestion reply");
        }

        outcome
    }

    /// Ingest `request` without writing a reply.
    ///
    /// Use [`Reply::from_outcome`] to render the result.
    pub async fn ingest<R>(&self, request: IngestRequest<R>) -> IngestOutcome
    where
        R: AsyncRead + Unpin + Send,
    {
        let kind = request.content_kind();
        let span = info_span!("ingest", kind = %kind);

        async move {
            let outcome = match kind {
                ContentKind::Unsupported => {
                    debug!(content_type = ?request.content_type(), "unsupported media type");
                    IngestOutcome::unsupported()
                }
                ContentKind::SingleJson => self.ingest_single(request).await,
                ContentKind::StreamJson => self.ingest_stream(request).await,
            };

            info!(
                accepted = outcome.accepted(),
                rejected = outcome.rejected(),
                failed = outcome.error().is_some(),
                "request ingested"
            );
            outcome
        }
        .instrument(span)
        .await
    }

    async fn ingest_single<R>(&self, request: IngestRequest<R>) -> IngestOutcome
    where
        R: AsyncRead + Unpin + Send,
    {
        let (parsed, body) = request.into_parts();

        // A pre-decoded body was already bounded by whoever decoded it.
        let result = match parsed {
            Some(document) => self.dispatch(document).await,
            None => self.read_single(body).await,
        };

        match result {
            Ok(()) => IngestOutcome::new(ContentKind::SingleJson, 1, 0, None),
            Err(err) => {
                self.report(&err);
                IngestOutcome::new(ContentKind::SingleJson, 0, 1, Some(err))
            }
        }
    }

    async fn read_single<R>(&self, body: R) -> Result<(), IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let bytes = read_at_most(body, self.max_size()).await?;
        let document: Document = serde_json::from_slice(&bytes).map_err(IngestError::Syntax)?;
        self.dispatch(document).await
    }

    async fn ingest_stream<R>(&self, request: IngestRequest<R>) -> IngestOutcome
    where
        R: AsyncRead + Unpin + Send,
    {
        let (_, body) = request.into_parts();
        let mut documents = DocumentStream::new(body, self.max_size());
        let mut accepted = 0;
        let mut error = None;

        while let Some(item) = documents.next_document().await {
            let result = match item {
                Ok(document) => {
                    let limit = self.max_documents();
                    if accepted >= limit {
                        Err(IngestError::TooManyDocuments { limit })
                    } else {
                        self.dispatch(document).await
                    }
                }
                Err(err) => Err(err),
            };

            match result {
                Ok(()) => {
                    accepted += 1;
                    debug!(accepted, line = documents.lines_read(), "document accepted");
                }
                Err(err) => {
                    error = Some(err);
                    break;
                }
            }
        }

        let rejected = usize::from(error.is_some());
        if let Some(err) = &error {
            self.report(err);
        }
        IngestOutcome::new(ContentKind::StreamJson, accepted, rejected, error)
    }

    async fn dispatch(&self, document: Document) -> Result<(), IngestError> {
        let handler = self.document_handler();
        handler.handle(document).await.map_err(IngestError::Handler)
    }

    fn report(&self, err: &IngestError) {
        self.error_handler().handle_error(err);
    }
}
