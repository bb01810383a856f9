use serde::Serialize;
use std::fmt;

/// Media type of a single JSON document body.
pub const JSON: &str = "application/json";
/// Media type of a newline-delimited JSON stream.
pub const NDJSON: &str = "application/x-ndjson";
/// Content type of plain-text replies.
pub const TEXT: &str = "text/plain; charset=utf-8";

/// How an inbound request body is to be ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentKind {
    /// One JSON document (`application/json`).
    SingleJson,
    /// A stream of newline-delimited documents (`application/x-ndjson`).
    StreamJson,
    /// Anything else, including a missing content type.
    Unsupported,
}

impl ContentKind {
    /// Resolve a declared `Content-Type` value.
    ///
    /// Matching is case-insensitive and ignores media type parameters, so
    /// `Application/JSON; charset=utf-8` is [`ContentKind::SingleJson`].
    pub fn classify(declared: Option<&str>) -> Self {
        let Some(declared) = declared else {
            return Self::Unsupported;
        };

        let essence = declared.split(';').next().unwrap_or_default().trim();

        if essence.eq_ignore_ascii_case(JSON) {
            Self::SingleJson
        } else if essence.eq_ignore_ascii_case(NDJSON) {
            Self::StreamJson
        } else {
            Self::Unsupported
        }
    }

    /// Return the kind as a static string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleJson => "single-json",
            Self::StreamJson => "stream-json",
            Self::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shorthand for [`ContentKind::classify`].
pub fn classify(declared: Option<&str>) -> ContentKind {
    ContentKind::classify(declared)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_media_types() {
        assert_eq!(classify(Some("application/json")), ContentKind::SingleJson);
        assert_eq!(classify(Some("application/x-ndjson")), ContentKind::StreamJson);
    }

    #[test]
    fn parameters_and_case_are_ignored() {
        assert_eq!(
            classify(Some("Application/JSON; charset=utf-8")),
            ContentKind::SingleJson
        );
        assert_eq!(
            classify(Some(" application/x-NDJSON ;charset=utf8")),
            ContentKind::StreamJson
        );
    }

    #[test]
    fn everything_else_is_unsupported() {
        for declared in ["text/x-foo", "text/plain", "application/jsonx", "", "json"] {
            assert_eq!(classify(Some(declared)), ContentKind::Unsupported, "{declared}");
        }
        assert_eq!(classify(None), ContentKind::Unsupported);
    }

    #[test]
    fn classification_is_stable() {
        let first = classify(Some("application/x-ndjson"));
        for _ in 0..3 {
            assert_eq!(classify(Some("application/x-ndjson")), first);
        }
    }
}
