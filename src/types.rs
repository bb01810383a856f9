use serde::Serialize;

use crate::classify::ContentKind;
use crate::error::IngestError;

/// One decoded JSON value handed to the document handler.
pub type Document = serde_json::Value;

// ---------------------------------------------------------------------------
// IngestRequest
// ---------------------------------------------------------------------------

/// An already-routed inbound request, as seen by the ingestion engine.
///
/// `body` is only read when no pre-decoded body is attached (or when the
/// request is a stream).
#[derive(Debug)]
pub struct IngestRequest<R> {
    content_type: Option<String>,
    parsed_body: Option<Document>,
    body: R,
}

impl<R> IngestRequest<R> {
    /// A request whose body will be read from `body`.
    pub fn new(body: R) -> Self {
        Self {
            content_type: None,
            parsed_body: None,
            body,
        }
    }

    /// Set the declared `Content-Type`.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Attach a body that an upstream layer has already decoded.
    pub fn with_parsed_body(mut self, document: Document) -> Self {
        self.parsed_body = Some(document);
        self
    }

    /// The declared `Content-Type`, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Classify the declared `Content-Type`.
    pub fn content_kind(&self) -> ContentKind {
        ContentKind::classify(self.content_type())
    }

    /// The pre-decoded body, if any.
    pub fn parsed_body(&self) -> Option<&Document> {
        self.parsed_body.as_ref()
    }

    /// Split into the pre-decoded body and the raw byte source.
    pub fn into_parts(self) -> (Option<Document>, R) {
        (self.parsed_body, self.body)
    }
}

impl IngestRequest<tokio::io::Empty> {
    /// A JSON request whose body was decoded upstream; there are no raw bytes.
    pub fn parsed(document: Document) -> Self {
        Self::new(tokio::io::empty())
            .with_content_type(crate::classify::JSON)
            .with_parsed_body(document)
    }
}

// ---------------------------------------------------------------------------
// IngestOutcome
// ---------------------------------------------------------------------------

/// Result of ingesting one request. Built once by the engine, then read-only.
#[derive(Debug)]
pub struct IngestOutcome {
    kind: ContentKind,
    accepted: usize,
    rejected: usize,
    error: Option<IngestError>,
}

impl IngestOutcome {
    pub(crate) fn new(
        kind: ContentKind,
        accepted: usize,
        rejected: usize,
        error: Option<IngestError>,
    ) -> Self {
        Self {
            kind,
            accepted,
            rejected,
            error,
        }
    }

    pub(crate) fn unsupported() -> Self {
        Self::new(ContentKind::Unsupported, 0, 0, None)
    }

    /// How the request body was classified.
    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    /// Documents whose handler invocation settled successfully.
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    /// Documents that failed to decode, transport, or be handled (0 or 1).
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// The error that terminated ingestion, if any.
    pub fn error(&self) -> Option<&IngestError> {
        self.error.as_ref()
    }

    /// `true` when the body was supported and fully ingested.
    pub fn is_success(&self) -> bool {
        self.kind != ContentKind::Unsupported && self.error.is_none()
    }

    /// The counters as sent in a stream reply body.
    pub fn summary(&self) -> StreamSummary {
        StreamSummary {
            accepted: self.accepted,
            rejected: self.rejected,
            error: self.error.as_ref().map(ToString::to_string),
        }
    }
}

/// JSON body of a stream reply: `{"accepted":N,"rejected":M[,"error":"..."]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    pub accepted: usize,
    pub rejected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_builder_sets_parts() {
        let req = IngestRequest::new(&b""[..])
            .with_content_type("application/x-ndjson; charset=utf-8")
            .with_parsed_body(json!({"foo": 13}));

        assert_eq!(req.content_kind(), ContentKind::StreamJson);
        assert_eq!(req.parsed_body(), Some(&json!({"foo": 13})));
    }

    #[test]
    fn parsed_request_is_single_json() {
        let req = IngestRequest::parsed(json!([]));
        assert_eq!(req.content_kind(), ContentKind::SingleJson);
        let (body, _) = req.into_parts();
        assert_eq!(body, Some(json!([])));
    }

    #[test]
    fn summary_omits_absent_error() {
        let outcome = IngestOutcome::new(ContentKind::StreamJson, 3, 0, None);
        let text = serde_json::to_string(&outcome.summary()).unwrap();
        assert_eq!(text, r#"{"accepted":3,"rejected":0}"#);
        assert!(outcome.is_success());
    }

    #[test]
    fn summary_keeps_field_order_with_error() {
        let err = IngestError::TooManyDocuments { limit: 2 };
        let outcome = IngestOutcome::new(ContentKind::StreamJson, 2, 1, Some(err));
        let text = serde_json::to_string(&outcome.summary()).unwrap();
        assert_eq!(
            text,
            r#"{"accepted":2,"rejected":1,"error":"document limit of 2 exceeded"}"#
        );
    }
}
