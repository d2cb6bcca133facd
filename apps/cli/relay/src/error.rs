use relay_core::error::CoreError;
use relay_core::error::config::ConfigError;
use relay_core::error::supervisor::SupervisorError;

use common::ErrorLocation;

use thiserror::Error;

/// Errors surfaced by the `relay` binary.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Error from this app (logging, directories, runtime)
    #[error("Relay Error: {message} {location}")]
    Relay {
        message: String,
        location: ErrorLocation,
    },

    /// Error from relay-core (config, bind, supervisor)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },

    /// Operator console I/O failed
    #[error("Console Error: {message} {location}")]
    Console {
        message: String,
        location: ErrorLocation,
    },
}

impl From<CoreError> for RelayError {
    #[track_caller]
    fn from(error: CoreError) -> Self {
        RelayError::Core {
            message: error.to_string(),
            location: ErrorLocation::caller(),
        }
    }
}

impl From<SupervisorError> for RelayError {
    #[track_caller]
    fn from(error: SupervisorError) -> Self {
        RelayError::from(CoreError::from(error))
    }
}

impl From<ConfigError> for RelayError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        RelayError::from(CoreError::from(error))
    }
}
