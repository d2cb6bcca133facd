//! Runtime config shared by the console and the accept loop.
//!
//! Reads take a read lock and clone what they need. Mutations are
//! expressed as [`ConfigCommand`]s, validated before anything changes,
//! and report whether the listener has to be rebound.

use crate::config::{ServerConfig, validate_ip};
use crate::error::config::ConfigError;
use crate::protocol::Policy;

use common::RedactedToken;

use std::sync::Arc;

use log::info;
use tokio::sync::RwLock;

/// Commands that mutate the server config.
#[derive(Debug, Clone)]
pub enum ConfigCommand {
    SetToken(RedactedToken),
    SetIp(String),
    SetPort(u16),
}

/// Shared server config.
///
/// This type is `Clone`; all clones share the same config.
#[derive(Debug, Clone)]
pub struct ConfigState {
    config: Arc<RwLock<ServerConfig>>,
}

impl ConfigState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    pub async fn address(&self) -> String {
        self.config.read().await.address()
    }

    pub async fn policy(&self) -> Policy {
        self.config.read().await.policy()
    }

    pub async fn token(&self) -> RedactedToken {
        self.config.read().await.token.clone()
    }

    pub async fn ip(&self) -> String {
        self.config.read().await.ip.clone()
    }

    pub async fn port(&self) -> u16 {
        self.config.read().await.port
    }

    /// Apply a config command.
    ///
    /// # Returns
    ///
    /// `true` when the change only takes effect after a rebind.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for an invalid ip; the
    /// config is left untouched.
    pub async fn update(&self, command: ConfigCommand) -> Result<bool, ConfigError> {
        match command {
            ConfigCommand::SetToken(token) => {
                let mut config = self.config.write().await;
                config.token = token;
                info!("Token updated ({} chars)", config.token.len());
                Ok(false)
            }
            ConfigCommand::SetIp(ip) => {
                validate_ip(&ip)?;
                let mut config = self.config.write().await;
                info!("Ip changed: {} -> {}", config.ip, ip);
                config.ip = ip;
                Ok(true)
            }
            ConfigCommand::SetPort(port) => {
                let mut config = self.config.write().await;
                info!("Port changed: {} -> {}", config.port, port);
                config.port = port;
                Ok(true)
            }
        }
    }
}
