use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use crate::error::{IngestError, SizeLimitExceeded};

// ---------------------------------------------------------------------------
// LimitedReader
// ---------------------------------------------------------------------------

/// An [`AsyncRead`] adapter that fails once its source produces more than
/// `limit` bytes.
///
/// In-limit input passes through unchanged. Each read asks the source for at
/// most one byte beyond the remaining allowance, so at most `limit + 1` bytes
/// are ever pulled from the source. The read that crosses the limit still
/// hands over the bytes up to the limit; the next read returns an
/// [`io::Error`] wrapping [`SizeLimitExceeded`], and so does every read after
/// it. Where the violation surfaces therefore does not depend on how the
/// source splits its data.
#[derive(Debug)]
pub struct LimitedReader<R> {
    inner: R,
    limit: usize,
    read: usize,
    exceeded: bool,
}

impl<R> LimitedReader<R> {
    /// Wrap `inner`, allowing at most `limit` bytes through.
    pub fn new(inner: R, limit: usize) -> Self {
        Self {
            inner,
            limit,
            read: 0,
            exceeded: false,
        }
    }

    /// The configured limit in bytes.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Bytes handed to the caller so far.
    pub fn bytes_read(&self) -> usize {
        self.read
    }

    /// `true` once the limit has been crossed.
    pub fn is_exceeded(&self) -> bool {
        self.exceeded
    }

    /// Return the wrapped source.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn violation(&self) -> io::Error {
        SizeLimitExceeded { limit: self.limit }.into()
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for LimitedReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.exceeded {
            return Poll::Ready(Err(this.violation()));
        }

        let room = this.limit - this.read;
        let want = buf.remaining().min(room.saturating_add(1));

        let n = {
            let mut window = ReadBuf::new(buf.initialize_unfilled_to(want));
            ready!(Pin::new(&mut this.inner).poll_read(cx, &mut window))?;
            window.filled().len()
        };

        if n > room {
            this.exceeded = true;
            // An empty successful read would look like end of input.
            if room == 0 {
                return Poll::Ready(Err(this.violation()));
            }
            buf.advance(room);
            this.read += room;
            return Poll::Ready(Ok(()));
        }

        buf.advance(n);
        this.read += n;
        Poll::Ready(Ok(()))
    }
}

/// Read `source` to the end, failing with [`IngestError::SizeExceeded`] as
/// soon as more than `limit` bytes arrive.
pub async fn read_at_most<R>(source: R, limit: usize) -> Result<Vec<u8>, IngestError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = LimitedReader::new(source, limit);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).await?;
    Ok(bytes)
}

// ---------------------------------------------------------------------------
// Tests (unit)
// ---------------------------------------------------------------------------
