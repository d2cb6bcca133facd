//! Command-line flags.
//!
//! Every flag falls back to a `RELAY_*` environment variable (a `.env`
//! file is loaded by the binary before parsing). Flags override the JSON
//! config file, which overrides the built-in defaults.

use crate::error::RelayError;

use relay_core::config::ServerConfig;

use common::RedactedToken;

use std::path::PathBuf;

use clap::Parser;

const APP_DIR_NAME: &str = "relay";
const LOG_DIR_NAME: &str = "logs";

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "relay", version, about = "Single-client JSON-RPC relay over TCP and WebSocket")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "RELAY_IP")]
    pub ip: Option<String>,

    /// Port to listen on (0 picks a free port)
    #[arg(long, env = "RELAY_PORT")]
    pub port: Option<u16>,

    /// Shared secret clients prove with a SHA-512 hash; empty disables auth
    #[arg(long, env = "RELAY_TOKEN", hide_env_values = true)]
    pub token: Option<RedactedToken>,

    /// JSON config file; missing file means defaults
    #[arg(long, env = "RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Wrong hashes tolerated per connection before it is dropped (0 = unlimited)
    #[arg(long, env = "RELAY_AUTH_ATTEMPT_LIMIT")]
    pub auth_attempt_limit: Option<u32>,

    /// Directory for relay.log
    #[arg(long, env = "RELAY_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl Args {
    /// Where the log file goes: the flag, else the platform's local data
    /// directory, else the system temp directory.
    pub fn log_dir(&self) -> PathBuf {
        if let Some(log_dir) = &self.log_dir {
            return log_dir.clone();
        }
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR_NAME)
            .join(LOG_DIR_NAME)
    }

    /// Build the server config from file, then flags.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Core`] if the config file is unreadable or
    /// invalid, or the merged config fails validation.
    pub fn server_config(&self) -> Result<ServerConfig, RelayError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };

        if let Some(ip) = &self.ip {
            config.ip = ip.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(token) = &self.token {
            config.token = token.clone();
        }
        if let Some(limit) = self.auth_attempt_limit {
            config.auth_attempt_limit = limit;
        }

        config.validate()?;
        Ok(config)
    }
}
