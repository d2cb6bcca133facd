//! Server configuration.
//!
//! Loaded once at startup from an optional JSON file and then owned by
//! [`ConfigState`](crate::supervisor::ConfigState), which applies the
//! operator's runtime changes.

use crate::error::config::ConfigError;
use crate::protocol::Policy;
use crate::{DEFAULT_ADDRESS, DEFAULT_IP, DEFAULT_PORT, DEFAULT_TOKEN};

use common::{ErrorLocation, RedactedToken};

use std::path::Path;

use log::{info, warn};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_ip")]
    pub ip: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Plaintext shared secret; empty disables authentication.
    #[serde(default = "default_token")]
    pub token: RedactedToken,

    /// Wrong hashes tolerated per connection before it is dropped; 0 = unlimited.
    #[serde(default)]
    pub auth_attempt_limit: u32,

    #[serde(default = "default_reply_to_anonymous")]
    pub reply_to_anonymous: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: default_ip(),
            port: default_port(),
            token: default_token(),
            auth_attempt_limit: 0,
            reply_to_anonymous: default_reply_to_anonymous(),
        }
    }
}

fn default_ip() -> String {
    DEFAULT_IP.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_token() -> RedactedToken {
    RedactedToken::new(DEFAULT_TOKEN)
}
fn default_reply_to_anonymous() -> bool {
    true
}

impl ServerConfig {
    /// `ip:port` as handed to the listener.
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// The rules the protocol engine applies to this config.
    pub fn policy(&self) -> Policy {
        Policy {
            token: self.token.clone(),
            auth_attempt_limit: self.auth_attempt_limit,
            reply_to_anonymous: self.reply_to_anonymous,
        }
    }

    /// Load config from a JSON file.
    ///
    /// # Returns
    ///
    /// Returns defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read, is not
    /// valid JSON, or fails [`ServerConfig::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(
                "Config file not found at {}, using defaults ({})",
                path.display(),
                DEFAULT_ADDRESS
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::caller(),
                path: path.to_path_buf(),
                source: e,
            }
        })?;

        let config: ServerConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::caller(),
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", path.display());
        Ok(config)
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for an empty ip or one
    /// containing whitespace.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_ip(&self.ip)
    }
}

pub(crate) fn validate_ip(ip: &str) -> Result<(), ConfigError> {
    if ip.is_empty() {
        return Err(ConfigError::ValidationError {
            location: ErrorLocation::caller(),
            reason: "ip cannot be empty".to_string(),
        });
    }
    if ip.chars().any(char::is_whitespace) {
        return Err(ConfigError::ValidationError {
            location: ErrorLocation::caller(),
            reason: format!("Invalid ip: \"{ip}\""),
        });
    }
    Ok(())
}
