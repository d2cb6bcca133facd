//! Line-oriented transport over an accepted TCP stream.
//!
//! The first four bytes of every connection decide its framing: an HTTP
//! `GET ` request line is upgraded to a web-socket carrying text frames,
//! anything else is treated as raw `\r\n`-terminated text. The sniffed
//! bytes are replayed in front of the stream, so neither variant loses
//! them.
//!
//! A [`TransportSocket`] is split into a [`TransportReader`] for the read
//! loop and a [`TransportWriter`] that lives behind the supervisor's write
//! lock.

mod framed;
mod raw;

pub use framed::{FramedReader, FramedWriter};
pub use raw::{RawReader, RawWriter};

use crate::error::transport::TransportError;

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::io::Cursor;

use log::debug;
use tokio::io::{AsyncReadExt, Chain};
use tokio::net::TcpStream;

/// Request-line prefix that selects the web-socket transport.
pub const UPGRADE_PREFIX: &[u8; 4] = b"GET ";

/// Sniffed bytes followed by the rest of the stream.
pub(crate) type Replay<R> = Chain<Cursor<Vec<u8>>, R>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Raw,
    Framed,
}

impl Display for TransportKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            TransportKind::Raw => write!(formatter, "TCPSocket"),
            TransportKind::Framed => write!(formatter, "WebSocket"),
        }
    }
}

/// Read side of an established transport.
pub enum TransportReader {
    Raw(RawReader),
    Framed(FramedReader),
}

impl TransportReader {
    /// Next line (raw) or text frame (web-socket).
    ///
    /// Cancel safe: a read abandoned inside `select!` loses no data.
    ///
    /// # Errors
    ///
    /// [`TransportError::Closed`] when the peer went away cleanly, other
    /// variants for I/O or framing failures.
    pub async fn read(&mut self) -> Result<String, TransportError> {
        match self {
            TransportReader::Raw(reader) => reader.read().await,
            TransportReader::Framed(reader) => reader.read().await,
        }
    }
}

/// Write side of an established transport.
pub enum TransportWriter {
    Raw(RawWriter),
    Framed(FramedWriter),
}

impl TransportWriter {
    /// Write one line or text frame and flush it.
    pub async fn write(&mut self, line: &str) -> Result<(), TransportError> {
        match self {
            TransportWriter::Raw(writer) => writer.write(line).await,
            TransportWriter::Framed(writer) => writer.write(line).await,
        }
    }

    /// Close the stream; web-sockets send a normal-closure frame first.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        match self {
            TransportWriter::Raw(writer) => writer.close().await,
            TransportWriter::Framed(writer) => writer.close().await,
        }
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            TransportWriter::Raw(_) => TransportKind::Raw,
            TransportWriter::Framed(_) => TransportKind::Framed,
        }
    }
}

/// An accepted connection with its framing decided.
pub struct TransportSocket {
    reader: TransportReader,
    writer: TransportWriter,
}

impl TransportSocket {
    /// Sniff the stream and build the matching transport.
    ///
    /// A failed upgrade is answered with `400 Bad Request` before the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// [`TransportError::Handshake`] if the web-socket upgrade fails, or an
    /// I/O error while sniffing.
    pub async fn establish(mut stream: TcpStream) -> Result<Self, TransportError> {
        let prefix = read_prefix(&mut stream).await?;

        if prefix.as_slice() == UPGRADE_PREFIX {
            let (stream, spare) = with_spare(stream)?;
            let (read_half, write_half) = tokio::io::split(stream);
            let replay = Cursor::new(prefix).chain(read_half);
            match framed::upgrade(replay, write_half).await {
                Ok((reader, writer)) => {
                    debug!("Upgrade: TCPSocket -> WebSocket");
                    Ok(Self {
                        reader: TransportReader::Framed(reader),
                        writer: TransportWriter::Framed(writer),
                    })
                }
                Err(e) => {
                    framed::reject(spare, e.reason()).await;
                    Err(e)
                }
            }
        } else {
            let (read_half, write_half) = stream.into_split();
            let replay = Cursor::new(prefix).chain(read_half);
            let (reader, writer) = raw::wrap(replay, write_half);
            Ok(Self {
                reader: TransportReader::Raw(reader),
                writer: TransportWriter::Raw(writer),
            })
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.writer.kind()
    }

    pub fn into_split(self) -> (TransportReader, TransportWriter) {
        (self.reader, self.writer)
    }
}

/// Second handle on the same socket, used to answer a failed upgrade
/// after the handshake has consumed the first.
fn with_spare(stream: TcpStream) -> Result<(TcpStream, TcpStream), TransportError> {
    let stream = stream.into_std()?;
    let spare = stream.try_clone()?;
    Ok((TcpStream::from_std(stream)?, TcpStream::from_std(spare)?))
}

/// Read up to [`UPGRADE_PREFIX`]`.len()` bytes, fewer only at EOF.
async fn read_prefix(reader: &mut TcpStream) -> Result<Vec<u8>, TransportError> {
    let mut prefix = vec![0u8; UPGRADE_PREFIX.len()];
    let mut filled = 0;
    while filled < prefix.len() {
        let read = reader.read(&mut prefix[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    prefix.truncate(filled);
    Ok(prefix)
}
