use crate::error::transport::TransportError;
use crate::transport::Replay;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

const LINE_TERMINATOR: &str = "\r\n";

pub(crate) fn wrap(
    replay: Replay<OwnedReadHalf>,
    write_half: OwnedWriteHalf,
) -> (RawReader, RawWriter) {
    (
        RawReader {
            inner: BufReader::new(replay),
            pending: Vec::new(),
        },
        RawWriter { inner: write_half },
    )
}

/// CRLF line reader.
///
/// Lines are read as bytes and decoded lossily, so a line that is not
/// UTF-8 still reaches the engine and fails there as malformed JSON.
pub struct RawReader {
    inner: BufReader<Replay<OwnedReadHalf>>,
    // Survives a cancelled `read`; cleared only once a line is complete.
    pending: Vec<u8>,
}

impl RawReader {
    pub async fn read(&mut self) -> Result<String, TransportError> {
        let read = self.inner.read_until(b'\n', &mut self.pending).await?;
        if read == 0 && self.pending.is_empty() {
            return Err(TransportError::closed("peer closed the stream"));
        }

        let mut line = std::mem::take(&mut self.pending);
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }
}

/// CRLF line writer.
pub struct RawWriter {
    inner: OwnedWriteHalf,
}

impl RawWriter {
    pub async fn write(&mut self, line: &str) -> Result<(), TransportError> {
        let mut buffer = String::with_capacity(line.len() + LINE_TERMINATOR.len());
        buffer.push_str(line);
        buffer.push_str(LINE_TERMINATOR);
        self.inner.write_all(buffer.as_bytes()).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
