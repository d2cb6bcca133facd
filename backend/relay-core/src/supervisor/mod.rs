//! Connection supervisor.
//!
//! Owns the listening socket and serves one connection at a time:
//!
//! - Accepts a connection, sniffs its transport and resets the protocol
//!   engine to `Unauthenticated`
//! - Runs read → decode → engine → reply until the peer leaves, the engine
//!   asks to terminate, or the operator closes, exits or reloads
//! - Tears the connection down and goes back to accepting
//!
//! # Architecture
//!
//! The accept/read loop runs in one tokio task. The operator talks to it
//! through a cloneable [`SupervisorHandle`]:
//!
//! - Writes (`send`) and `close` go through one lock around the active
//!   connection, so frames never interleave and a close never lands inside
//!   a write
//! - Exit, reload and stage overrides are commands on an mpsc channel that
//!   the loop `select!`s on next to the socket, so no flag polling is needed
//! - Config changes go through [`ConfigState`]; address changes then ask
//!   the loop to rebind

mod config_state;
mod connection_state;
mod handle;
mod server;

pub use config_state::{ConfigCommand, ConfigState};
pub use connection_state::Delivery;
pub use handle::SupervisorHandle;
pub use server::start;

use crate::protocol::Stage;

use connection_state::Generation;

/// Line sent to the peer by the operator's `remote_log` command.
pub const REMOTE_LOG_COMMAND: &str = "remote_log";

/// Requests the accept/read loop acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SupervisorCommand {
    /// Stop accepting and release the listener.
    Exit,
    /// Drop the listener and any connection, then bind the configured address again.
    Reload,
    /// Override the stage of connection `generation`; ignored once that
    /// connection is gone.
    ForceStage { stage: Stage, generation: Generation },
}
