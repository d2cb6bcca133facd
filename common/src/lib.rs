//! Shared building blocks for the relay workspace.
//!
//! This crate holds the small pieces every other crate leans on:
//! source-located errors and the redacted shared-secret type.
//!
//! ## Architecture
//!
//! - **common** (this crate): error location tracking, secret handling
//! - **relay-core**: transport, envelope codec, protocol engine, supervisor
//! - **relay**: command line, logging and the operator console

pub mod error;
pub mod redacted_token;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use redacted_token::RedactedToken;

#[cfg(test)]
mod tests;
