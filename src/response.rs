use std::io;

use crate::classify::{ContentKind, TEXT};
use crate::types::IngestOutcome;

// ---------------------------------------------------------------------------
// ResponseSink
// ---------------------------------------------------------------------------

/// Where a reply is written. Implemented by the surrounding HTTP layer.
pub trait ResponseSink {
    /// Set the status code.
    fn set_status(&mut self, status: u16);
    /// Set a header field.
    fn set_header(&mut self, name: &str, value: &str);
    /// Send the body, completing the response.
    ///
    /// Fails if the connection is gone or the response was already sent.
    fn send(&mut self, body: Vec<u8>) -> io::Result<()>;
}

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// A fully determined response: status, content type and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

const JSON_REPLY: &str = "application/json";

impl Reply {
    fn text(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: TEXT,
            body: body.into_bytes(),
        }
    }

    /// `415 Unsupported Media Type`.
    pub fn unsupported_media_type() -> Self {
        Self::text(415, "Unsupported Media Type\n".to_string())
    }

    /// Build the reply for a finished ingestion.
    ///
    /// | kind | outcome | status | body |
    /// |---|---|---|---|
    /// | unsupported | - | 415 | `Unsupported Media Type` |
    /// | single | ok | 202 | `Accepted` |
    /// | single | syntax error | 400 | `Bad Request: <message>` |
    /// | single | other error | 500 | `Internal Server Error: <message>` |
    /// | stream | ok | 202 | `{"accepted":N,"rejected":0}` |
    /// | stream | error | 400 / 500 | `{"accepted":N,"rejected":1,"error":"<message>"}` |
    pub fn from_outcome(outcome: &IngestOutcome) -> Self {
        match outcome.kind() {
            ContentKind::Unsupported => Self::unsupported_media_type(),
            ContentKind::SingleJson => match outcome.error() {
                None => Self::text(202, "Accepted\n".to_string()),
                Some(err) if err.is_client_error() => {
                    Self::text(400, format!("Bad Request: {err}\n"))
                }
                Some(err) => Self::text(500, format!("Internal Server Error: {err}\n")),
            },
            ContentKind::StreamJson => {
                let status = outcome.error().map_or(202, |err| err.status_code());
                let body = serde_json::to_vec(&outcome.summary())
                    .unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}").into_bytes());
                Self {
                    status,
                    content_type: JSON_REPLY,
                    body,
                }
            }
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body as UTF-8; every reply body is text.
    pub fn body_as_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or_default()
    }

    /// Write status, `Content-Type` and body to `sink`, once.
    pub fn write_to<S: ResponseSink + ?Sized>(self, sink: &mut S) -> io::Result<()> {
        sink.set_status(self.status);
        sink.set_header("content-type", self.content_type);
        sink.send(self.body)
    }
}

/// Reason phrase for the status codes this crate produces.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        202 => "Accepted",
        400 => "Bad Request",
        415 => "Unsupported Media Type",
        500 => "Internal Server Error",
        _ => "",
    }
}

// ---------------------------------------------------------------------------
// RecordedResponse
// ---------------------------------------------------------------------------

/// In-memory [`ResponseSink`] that records what was written.
///
/// A second `send` is refused, which makes double replies observable.
#[derive(Debug, Clone, Default)]
pub struct RecordedResponse {
    status: Option<u16>,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    status_writes: usize,
}

impl RecordedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// How many times `set_status` was called.
    pub fn status_writes(&self) -> usize {
        self.status_writes
    }

    /// Look up a header value by name (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// The body as UTF-8, if sent and valid.
    pub fn body_as_str(&self) -> Option<&str> {
        self.body.as_ref().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// The body decoded as JSON, if sent and valid.
    pub fn body_json(&self) -> Option<serde_json::Value> {
        self.body
            .as_ref()
            .and_then(|b| serde_json::from_slice(b).ok())
    }

    /// `true` once a body has been sent.
    pub fn is_sent(&self) -> bool {
        self.body.is_some()
    }
}

impl ResponseSink for RecordedResponse {
    fn set_status(&mut self, status: u16) {
        self.status = Some(status);
        self.status_writes += 1;
    }

    fn set_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    fn send(&mut self, body: Vec<u8>) -> io::Result<()> {
        if self.body.is_some() {
            return Err(io::Error::other("response already sent"));
        }
        self.body = Some(body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;

    fn syntax_error() -> IngestError {
        IngestError::Syntax(serde_json::from_str::<serde_json::Value>("{").unwrap_err())
    }

    #[test]
    fn single_document_replies() {
        let ok = IngestOutcome::new(ContentKind::SingleJson, 1, 0, None);
        let reply = Reply::from_outcome(&ok);
        assert_eq!(reply.status(), 202);
        assert_eq!(reply.body_as_str(), "Accepted\n");
        assert_eq!(reply.content_type(), TEXT);

        let bad = IngestOutcome::new(ContentKind::SingleJson, 0, 1, Some(syntax_error()));
        let reply = Reply::from_outcome(&bad);
        assert_eq!(reply.status(), 400);
        assert!(reply.body_as_str().starts_with("Bad Request: invalid JSON"));

        let big = IngestOutcome::new(
            ContentKind::SingleJson,
            0,
            1,
            Some(IngestError::SizeExceeded { limit: 4 }),
        );
        let reply = Reply::from_outcome(&big);
        assert_eq!(reply.status(), 500);
        assert_eq!(
            reply.body_as_str(),
            "Internal Server Error: request body exceeds maximum size of 4 bytes\n"
        );
    }

    #[test]
    fn stream_replies_carry_json_summary() {
        let outcome = IngestOutcome::new(ContentKind::StreamJson, 2, 1, Some(syntax_error()));
        let reply = Reply::from_outcome(&outcome);
        assert_eq!(reply.status(), 400);
        assert_eq!(reply.content_type(), "application/json");
        assert!(reply.body_as_str().starts_with(r#"{"accepted":2,"rejected":1,"error":"#));
    }

    #[test]
    fn unsupported_reply() {
        let reply = Reply::from_outcome(&IngestOutcome::unsupported());
        assert_eq!(reply.status(), 415);
        assert_eq!(reply.body_as_str(), "Unsupported Media Type\n");
        assert_eq!(reason_phrase(reply.status()), "Unsupported Media Type");
    }

    #[test]
    fn recorded_response_refuses_second_send() {
        let mut res = RecordedResponse::new();
        Reply::unsupported_media_type().write_to(&mut res).unwrap();
        assert!(res.send(b"again".to_vec()).is_err());
        assert_eq!(res.body_as_str(), Some("Unsupported Media Type\n"));
        assert_eq!(res.header_value("Content-Type"), Some(TEXT));
        assert_eq!(res.status_writes(), 1);
    }
}
