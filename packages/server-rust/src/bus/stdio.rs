//! Newline-delimited message transport over byte streams.
//!
//! One JSON document per line. Used by the binary to read compile requests
//! from stdin and write compile results to stdout.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead};

use crate::traits::{Delivery, MessagePublisher, Subscription};

/// Longest accepted input line. Longer lines are skipped.
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Reads one delivery per non-blank input line.
///
/// Lines are framed as raw bytes; decoding, UTF-8 included, is left to the
/// consumer, so an undecodable line is still a delivery. Only end of input
/// or a read error ends the subscription.
pub struct LineSubscription<R> {
    lines: FramedRead<R, AnyDelimiterCodec>,
    queue: String,
}

impl<R: AsyncRead + Unpin + Send> LineSubscription<R> {
    pub fn new(reader: R, queue: impl Into<String>) -> Self {
        Self::with_max_line_bytes(reader, queue, MAX_LINE_BYTES)
    }

    pub fn with_max_line_bytes(reader: R, queue: impl Into<String>, max_line_bytes: usize) -> Self {
        let codec = AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\n".to_vec(), max_line_bytes);
        Self {
            lines: FramedRead::new(reader, codec),
            queue: queue.into(),
        }
    }
}

impl LineSubscription<tokio::io::Stdin> {
    #[must_use]
    pub fn stdin(queue: impl Into<String>) -> Self {
        Self::new(tokio::io::stdin(), queue)
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> Subscription for LineSubscription<R> {
    async fn next_delivery(&mut self) -> Option<Delivery> {
        // FramedRead yields one `None` after a decode error before resuming.
        let mut resuming = false;
        loop {
            match self.lines.next().await {
                Some(Ok(line)) if line.iter().all(u8::is_ascii_whitespace) => {}
                Some(Ok(line)) => {
                    return Some(Delivery {
                        queue: self.queue.clone(),
                        payload: line,
                    });
                }
                Some(Err(AnyDelimiterCodecError::MaxChunkLengthExceeded)) => {
                    tracing::warn!(queue = %self.queue, "input line too long, skipped");
                    resuming = true;
                }
                Some(Err(AnyDelimiterCodecError::Io(e))) => {
                    tracing::error!(error = %e, "input stream failed, ending subscription");
                    return None;
                }
                None if resuming => resuming = false,
                None => return None,
            }
        }
    }
}

/// Writes each payload as one line. Only text payloads are accepted.
pub struct LinePublisher<W> {
    writer: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> LinePublisher<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl LinePublisher<tokio::io::Stdout> {
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> MessagePublisher for LinePublisher<W> {
    async fn publish(&self, queue: &str, payload: Bytes) -> anyhow::Result<()> {
        let text = std::str::from_utf8(&payload)
            .map_err(|_| anyhow::anyhow!("line transport requires a text payload"))?;
        if text.contains('\n') {
            anyhow::bail!("payload for {queue} spans multiple lines");
        }
        let mut writer = self.writer.lock().await;
        writer.write_all(text.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}
