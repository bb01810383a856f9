use std::fmt;

use futures::Stream;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::error::IngestError;
use crate::limit::LimitedReader;
use crate::types::Document;

/// Lazily decodes newline-delimited JSON documents from a byte stream.
///
/// `max_size` bounds the whole stream, not individual lines. Blank lines
/// are skipped; a final line without a terminator is decoded like any
/// other. The sequence ends after the last document, or after the first
/// error of any kind: malformed JSON ([`IngestError::LineSyntax`]), a size
/// violation, or a transport failure. It cannot be restarted.
///
/// ```rust
/// # tokio_test::block_on(async {
/// use ndjson_ingest::DocumentStream;
///
/// let mut stream = DocumentStream::new(&b"{\"a\":1}\n[2]\n"[..], 1024);
/// assert_eq!(stream.next_document().await.unwrap().unwrap()["a"], 1);
/// assert!(stream.next_document().await.unwrap().is_ok());
/// assert!(stream.next_document().await.is_none());
/// # });
/// ```
pub struct DocumentStream<R> {
    reader: BufReader<LimitedReader<R>>,
    line: Vec<u8>,
    lines: usize,
    documents: usize,
    finished: bool,
}

impl<R: AsyncRead + Unpin> DocumentStream<R> {
    /// Attach a decoder to `source`, enforcing `max_size` bytes in total.
    pub fn new(source: R, max_size: usize) -> Self {
        Self {
            reader: BufReader::new(LimitedReader::new(source, max_size)),
            line: Vec::new(),
            lines: 0,
            documents: 0,
            finished: false,
        }
    }

    /// Decode the next document.
    ///
    /// Returns `None` once the stream is exhausted or after an error has
    /// been returned.
    pub async fn next_document(&mut self) -> Option<Result<Document, IngestError>> {
        if self.finished {
            return None;
        }

        loop {
            self.line.clear();

            let n = match self.reader.read_until(b'\n', &mut self.line).await {
                Ok(n) => n,
                Err(err) => return Some(Err(self.finish(err.into()))),
            };
            if n == 0 {
                self.finished = true;
                return None;
            }
            self.lines += 1;

            let text = strip_terminator(&self.line);
            if text.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            return match serde_json::from_slice(text) {
                Ok(document) => {
                    self.documents += 1;
                    Some(Ok(document))
                }
                Err(source) => {
                    let line = self.lines;
                    Some(Err(self.finish(IngestError::LineSyntax { line, source })))
                }
            };
        }
    }

    /// Turn the decoder into a [`Stream`] of decode results.
    pub fn into_stream(self) -> impl Stream<Item = Result<Document, IngestError>> {
        futures::stream::unfold(self, |mut decoder| async move {
            let item = decoder.next_document().await?;
            Some((item, decoder))
        })
    }

    fn finish(&mut self, err: IngestError) -> IngestError {
        self.finished = true;
        err
    }

    /// Lines delimited so far, blank lines included.
    pub fn lines_read(&self) -> usize {
        self.lines
    }

    /// Documents successfully decoded so far.
    pub fn documents_decoded(&self) -> usize {
        self.documents
    }

    /// Body bytes pulled through the size limit so far.
    pub fn bytes_read(&self) -> usize {
        self.reader.get_ref().bytes_read()
    }

    /// `true` once the sequence has ended.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl<R> fmt::Debug for DocumentStream<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStream")
            .field("lines", &self.lines)
            .field("documents", &self.documents)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Drop a trailing `\n` or `\r\n`.
fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

// ---------------------------------------------------------------------------
// Tests (unit)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    async fn collect(input: &[u8], max_size: usize) -> Vec<Result<Document, IngestError>> {
        DocumentStream::new(input, max_size).into_stream().collect().await
    }

    #[test]
    fn strips_lf_and_crlf() {
        assert_eq!(strip_terminator(b"{}\n"), b"{}");
        assert_eq!(strip_terminator(b"{}\r\n"), b"{}");
        assert_eq!(strip_terminator(b"{}"), b"{}");
    }

    #[tokio::test]
    async fn decodes_every_line_in_order() {
        let items = collect(b"{\"A\":\"foo\"}\n{\"B\":\"foo\"}\n{\"C\":\"foo\"}\n", 1024).await;
        let docs: Vec<Document> = items.into_iter().map(Result::unwrap).collect();
        assert_eq!(
            docs,
            vec![json!({"A": "foo"}), json!({"B": "foo"}), json!({"C": "foo"})]
        );
    }

    #[tokio::test]
    async fn unterminated_last_line_is_decoded() {
        let items = collect(b"1\n2", 1024).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].as_ref().unwrap(), &json!(2));
    }

    #[tokio::test]
    async fn blank_lines_are_skipped() {
        let mut stream = DocumentStream::new(&b"\n{}\r\n  \n\"x\"\n\n"[..], 1024);
        assert!(stream.next_document().await.unwrap().is_ok());
        assert!(stream.next_document().await.unwrap().is_ok());
        assert!(stream.next_document().await.is_none());
        assert_eq!(stream.documents_decoded(), 2);
        assert_eq!(stream.lines_read(), 5);
    }

    #[tokio::test]
    async fn first_malformed_line_ends_the_sequence() {
        let items = collect(b"{}\n{\"B\":\n{}\n", 1024).await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        let err = items[1].as_ref().unwrap_err();
        assert!(matches!(err, IngestError::LineSyntax { line: 2, .. }));
    }

    #[tokio::test]
    async fn limit_applies_to_the_whole_stream() {
        // every line is small, the stream as a whole is not
        let input = b"[1]\n[2]\n[3]\n[4]\n";
        let items = collect(input, 10).await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap(), &json!([1]));
        assert_eq!(items[1].as_ref().unwrap(), &json!([2]));
        let last = items[2].as_ref().unwrap_err();
        assert!(matches!(last, IngestError::SizeExceeded { limit: 10 }));
    }

    #[tokio::test]
    async fn documents_ending_at_the_limit_survive_any_chunking() {
        let input = b"{\"A\":\"foo\"}\n{\"B\":\"foo\"}\n{\"C\":\"foo\"}\n";
        let chunked = tokio_test::io::Builder::new()
            .read(&input[..12])
            .read(&input[12..24])
            .read(&input[24..25])
            .build();

        let whole = collect(input, 24).await;
        let split: Vec<_> = DocumentStream::new(chunked, 24).into_stream().collect().await;

        for items in [&whole, &split] {
            assert_eq!(items.len(), 3);
            assert!(items[0].is_ok() && items[1].is_ok());
            assert!(matches!(items[2], Err(IngestError::SizeExceeded { limit: 24 })));
        }
    }

    #[tokio::test]
    async fn lines_split_across_reads_are_reassembled() {
        let source = tokio_test::io::Builder::new()
            .read(b"{\"A\":")
            .read(b"\"foo\"}\n{\"B\"")
            .read(b":\"foo\"}\n")
            .build();
        let items: Vec<_> = DocumentStream::new(source, 1024).into_stream().collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].as_ref().unwrap(), &json!({"B": "foo"}));
    }

    #[tokio::test]
    async fn transport_error_is_not_a_syntax_error() {
        let source = tokio_test::io::Builder::new()
            .read(b"{}\n{\"half\":")
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ))
            .build();
        let mut stream = DocumentStream::new(source, 1024);

        assert!(stream.next_document().await.unwrap().is_ok());
        let err = stream.next_document().await.unwrap().unwrap_err();
        assert!(matches!(err, IngestError::Io(_)));
        assert!(!err.is_syntax());
        assert!(stream.next_document().await.is_none());
        assert!(stream.is_finished());
    }
}
