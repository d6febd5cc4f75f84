//! Per-stream readers that turn raw child output into relayed lines.

use std::fmt;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Which output stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamOrigin {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// One line of output from a supervised process.
///
/// `text` holds the decoded line including its terminator, so concatenating
/// every line of a stream reproduces that stream. Only the final line of a
/// stream may lack a terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayedLine {
    pub origin: StreamOrigin,
    pub text: String,
}

impl RelayedLine {
    /// Decode raw bytes into a line, replacing invalid UTF-8 with U+FFFD.
    #[must_use]
    pub fn decode(origin: StreamOrigin, raw: &[u8]) -> Self {
        Self {
            origin,
            text: String::from_utf8_lossy(raw).into_owned(),
        }
    }

    /// The line text without its `\n` or `\r\n` terminator.
    #[must_use]
    pub fn content(&self) -> &str {
        let text = self.text.strip_suffix('\n').unwrap_or(&self.text);
        text.strip_suffix('\r').unwrap_or(text)
    }
}

/// Spawn a task that reads `stream` line by line and pushes each line to `tx`.
///
/// The task ends at end-of-stream, on a read error, or when the receiver is
/// gone. Dropping `tx` on exit is the end-of-stream signal for the consumer.
pub(crate) fn spawn_reader<R>(
    stream: R,
    origin: StreamOrigin,
    tx: UnboundedSender<RelayedLine>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(RelayedLine::decode(origin, &buf)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(stream = %origin, error = %e, "read error, closing stream");
                    break;
                }
            }
        }

        tracing::trace!(stream = %origin, "end of stream");
    })
}
