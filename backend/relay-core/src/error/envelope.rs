use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum EnvelopeError {
    #[error("Decode Error: {message} {location}")]
    Decode {
        message: String,
        location: ErrorLocation,
    },

    #[error("Encode Error: {message} {location}")]
    Encode {
        message: String,
        location: ErrorLocation,
    },
}

impl EnvelopeError {
    /// The serde reason alone, without the location suffix.
    ///
    /// This is what the peer sees in a `-32700` reply.
    pub fn reason(&self) -> &str {
        match self {
            EnvelopeError::Decode { message, .. } | EnvelopeError::Encode { message, .. } => {
                message
            }
        }
    }
}

impl From<serde_json::Error> for EnvelopeError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        EnvelopeError::Decode {
            message: error.to_string(),
            location: ErrorLocation::caller(),
        }
    }
}
