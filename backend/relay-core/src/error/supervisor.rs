use crate::error::config::ConfigError;
use crate::error::envelope::EnvelopeError;
use crate::error::transport::TransportError;

use common::ErrorLocation;

use std::io::Error as IoError;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SupervisorError {
    /// The listening socket could not be created. Fatal.
    #[error("Bind Error: {address}: {message} {location}")]
    Bind {
        address: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },

    #[error("Command Error: {message} {location}")]
    Command {
        message: String,
        location: ErrorLocation,
    },

    #[error("Task Error: {message} {location}")]
    Task {
        message: String,
        location: ErrorLocation,
    },

    #[error("IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

impl From<IoError> for SupervisorError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        SupervisorError::Io {
            message: error.to_string(),
            location: ErrorLocation::caller(),
        }
    }
}

impl From<TransportError> for SupervisorError {
    #[track_caller]
    fn from(error: TransportError) -> Self {
        SupervisorError::Send {
            message: error.to_string(),
            location: ErrorLocation::caller(),
        }
    }
}
