use common::ErrorLocation;

use std::io::{Error as IoError, ErrorKind};

use thiserror::Error as ThisError;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::error::ProtocolError;

#[derive(Debug, ThisError)]
pub enum TransportError {
    /// The peer went away cleanly (close frame or EOF).
    #[error("Closed: {message} {location}")]
    Closed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Handshake Error: {message} {location}")]
    Handshake {
        message: String,
        location: ErrorLocation,
    },

    #[error("Read Error: {message} {location}")]
    Read {
        message: String,
        location: ErrorLocation,
    },

    #[error("Write Error: {message} {location}")]
    Write {
        message: String,
        location: ErrorLocation,
    },

    #[error("IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
    },
}

impl TransportError {
    /// True for a normal peer-initiated close.
    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::Closed { .. })
    }

    /// The message alone, without the location suffix.
    pub fn reason(&self) -> &str {
        match self {
            TransportError::Closed { message, .. }
            | TransportError::Handshake { message, .. }
            | TransportError::Read { message, .. }
            | TransportError::Write { message, .. }
            | TransportError::Io { message, .. } => message,
        }
    }

    #[track_caller]
    pub(crate) fn closed(message: impl Into<String>) -> Self {
        TransportError::Closed {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }
}

impl TransportError {
    fn from_io(error: IoError, location: ErrorLocation) -> Self {
        match error.kind() {
            ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::BrokenPipe => {
                TransportError::Closed {
                    message: error.to_string(),
                    location,
                }
            }
            _ => TransportError::Io {
                message: error.to_string(),
                location,
            },
        }
    }
}

impl From<IoError> for TransportError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        TransportError::from_io(error, ErrorLocation::caller())
    }
}

impl From<WsError> for TransportError {
    #[track_caller]
    fn from(error: WsError) -> Self {
        let location = ErrorLocation::caller();
        match error {
            WsError::ConnectionClosed
            | WsError::AlreadyClosed
            | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
                TransportError::Closed {
                    message: error.to_string(),
                    location,
                }
            }
            WsError::Io(io) => TransportError::from_io(io, location),
            other => TransportError::Read {
                message: other.to_string(),
                location,
            },
        }
    }
}
