use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// Refusals raised by secret-holding types.
#[derive(Debug, ThisError)]
pub enum RedactError {
    /// A secret was about to be written out in plain text.
    #[error("Redact Error: {message} {location}")]
    Exposure {
        message: String,
        location: ErrorLocation,
    },
}
