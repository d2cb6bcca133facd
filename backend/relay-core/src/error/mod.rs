pub mod config;
pub mod envelope;
pub mod supervisor;
pub mod transport;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Envelope(#[from] envelope::EnvelopeError),

    #[error(transparent)]
    Supervisor(#[from] supervisor::SupervisorError),

    #[error(transparent)]
    Transport(#[from] transport::TransportError),
}
