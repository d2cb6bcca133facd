//! Per-connection handshake state machine.
//!
//! A connection starts `Unauthenticated`, must send `authorization` with
//! the hex SHA-512 of the shared token, then `upgrade duplex`, after which
//! it is `Active` and may exchange pings and arbitrary payload.
//!
//! [`transition`] is the pure step function; [`ProtocolEngine`] wraps it
//! with decoding, the stage guard and per-connection bookkeeping.

mod engine;
mod stage;

pub use engine::{Event, Policy, ProtocolEngine, Session, Transition, transition};
pub use stage::Stage;

pub const AUTHORIZATION_METHOD: &str = "authorization";
pub const UPGRADE_METHOD: &str = "upgrade duplex";
pub const AUTHORIZED_RESULT: &str = "authorized";
pub const UPGRADED_RESULT: &str = "upgraded";
