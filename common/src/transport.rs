//! Newline framing of [`Message`]s over any async byte stream.

use std::io::ErrorKind;
use std::time::Duration;

use tokio::io::{
    self, AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt,
    BufReader, ReadHalf, WriteHalf,
};
use tracing::debug;

use crate::error::Error;
use crate::protocol::Message;

const PEER: &str = "connection";

/// Longest line accepted from a peer, delimiter excluded.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 8 * 1024 * 1024;

/// One side of a connection: reads lines, writes encoded messages.
pub struct MessageStream<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    read_timeout: Option<Duration>,
    max_line_length: usize,
}

impl<S> MessageStream<S>
where
    S: AsyncRead + AsyncWrite,
{
    /// `read_timeout` bounds each wait for a line; expiry surfaces as an
    /// [`Error::Io`] with kind `TimedOut`.
    pub fn new(stream: S, read_timeout: Option<Duration>) -> Self {
        let (reader, writer) = io::split(stream);
        MessageStream {
            reader: BufReader::new(reader),
            writer,
            read_timeout,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }

    /// Lines longer than `max` bytes fail with [`Error::Protocol`].
    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    pub async fn send(&mut self, message: &Message) -> Result<(), Error> {
        self.send_line(&message.encode()).await
    }

    /// Write one line as-is, appending the delimiter.
    pub async fn send_line(&mut self, line: &str) -> Result<(), Error> {
        debug!("Sending: {}", line);
        let mut framed = String::with_capacity(line.len() + 1);
        framed.push_str(line);
        framed.push('\n');
        self.writer
            .write_all(framed.as_bytes())
            .await
            .map_err(|e| Error::io(PEER, e))?;
        self.writer.flush().await.map_err(|e| Error::io(PEER, e))
    }

    /// Next raw line, or `None` once the peer has closed its side.
    pub async fn recv_line(&mut self) -> Result<Option<String>, Error> {
        let read = read_bounded_line(&mut self.reader, self.max_line_length);
        let line = match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, read).await.map_err(|_| {
                Error::io(
                    PEER,
                    std::io::Error::new(ErrorKind::TimedOut, "no message before timeout"),
                )
            })??,
            None => read.await?,
        };
        if let Some(line) = &line {
            debug!("Received: {}", line);
        }
        Ok(line)
    }

    /// Flush and close the write side. Errors are ignored: the peer may
    /// already be gone.
    pub async fn close(mut self) {
        let _ = self.writer.shutdown().await;
    }
}

/// Read up to and including `\n`, never buffering more than `max + 1` bytes.
/// The delimiter (and a preceding `\r`) is stripped.
async fn read_bounded_line<R>(reader: &mut R, max: usize) -> Result<Option<String>, Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let read = (&mut *reader)
        .take(max as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await
        .map_err(|e| Error::io(PEER, e))?;
    if read == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > max {
        return Err(Error::protocol(format!("line longer than {max} bytes")));
    }
    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| Error::protocol("line is not valid UTF-8"))
}
