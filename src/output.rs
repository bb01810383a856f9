use serde::Serialize;

use crate::classify::ContentKind;
use crate::response::{Reply, reason_phrase};
use crate::types::IngestOutcome;

#[derive(Serialize)]
struct OutcomeReport {
    kind: ContentKind,
    status: u16,
    accepted: usize,
    rejected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_error: Option<bool>,
}

/// Serialize an [`IngestOutcome`] (with the status it replies with) to JSON.
///
/// When `pretty` is `true` the output is indented for readability.
pub fn format_json(outcome: &IngestOutcome, pretty: bool) -> String {
    let report = OutcomeReport {
        kind: outcome.kind(),
        status: Reply::from_outcome(outcome).status(),
        accepted: outcome.accepted(),
        rejected: outcome.rejected(),
        error: outcome.error().map(ToString::to_string),
        client_error: outcome.error().map(|e| e.is_client_error()),
    };

    if pretty {
        serde_json::to_string_pretty(&report).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    } else {
        serde_json::to_string(&report).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

/// Render a [`Reply`] in a human-readable debug format.
pub fn format_debug(reply: &Reply) -> String {
    let mut out = String::with_capacity(128 + reply.body().len());

    out.push_str("=== Ingest Reply ===\n");
    out.push_str(&format!("{}\n", format_status_line(reply).trim_end()));
    out.push_str(&format!("Content-Type: {}\n", reply.content_type()));

    let body = reply.body_as_str();
    out.push_str(&format!("\n--- Body ({} bytes) ---\n", reply.body().len()));
    out.push_str(body);
    if !body.ends_with('\n') {
        out.push('\n');
    }

    out.push_str("====================\n");
    out
}

/// Render only the status code and reason phrase, e.g. `202 Accepted`.
pub fn format_status_line(reply: &Reply) -> String {
    format!("{} {}\n", reply.status(), reason_phrase(reply.status()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;

    #[test]
    fn json_report_includes_status_and_counts() {
        let outcome = IngestOutcome::new(ContentKind::StreamJson, 4, 0, None);
        assert_eq!(
            format_json(&outcome, false),
            r#"{"kind":"stream-json","status":202,"accepted":4,"rejected":0}"#
        );
    }

    #[test]
    fn json_report_flags_client_errors() {
        let err = IngestError::TooManyDocuments { limit: 1 };
        let outcome = IngestOutcome::new(ContentKind::StreamJson, 1, 1, Some(err));
        let value: serde_json::Value = serde_json::from_str(&format_json(&outcome, true)).unwrap();
        assert_eq!(value["status"], 400);
        assert_eq!(value["client_error"], true);
    }

    #[test]
    fn debug_output_shows_status_and_body() {
        let out = format_debug(&Reply::unsupported_media_type());
        assert!(out.contains("415 Unsupported Media Type\n"));
        assert!(out.contains("Content-Type: text/plain; charset=utf-8\n"));
        assert!(out.contains("--- Body (23 bytes) ---\nUnsupported Media Type\n"));
    }

    #[test]
    fn status_line() {
        let reply = Reply::from_outcome(&IngestOutcome::new(ContentKind::SingleJson, 1, 0, None));
        assert_eq!(format_status_line(&reply), "202 Accepted\n");
    }
}
