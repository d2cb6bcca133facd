//! Operator-facing handle to a running supervisor.

use crate::error::supervisor::SupervisorError;
use crate::probe;
use crate::protocol::Stage;
use crate::supervisor::config_state::{ConfigCommand, ConfigState};
use crate::supervisor::connection_state::{ConnectionSlot, Delivery};
use crate::supervisor::{REMOTE_LOG_COMMAND, SupervisorCommand};

use common::{ErrorLocation, RedactedToken};

use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

type ServeTask = JoinHandle<Result<(), SupervisorError>>;

/// Handle to a running supervisor.
///
/// This type is `Clone`; all clones drive the same server.
#[derive(Clone)]
pub struct SupervisorHandle {
    config: ConfigState,
    slot: ConnectionSlot,
    commands: mpsc::Sender<SupervisorCommand>,
    local_addr: watch::Receiver<Option<SocketAddr>>,
    task: Arc<Mutex<Option<ServeTask>>>,
}

impl SupervisorHandle {
    pub(crate) fn new(
        config: ConfigState,
        slot: ConnectionSlot,
        commands: mpsc::Sender<SupervisorCommand>,
        local_addr: watch::Receiver<Option<SocketAddr>>,
        task: ServeTask,
    ) -> Self {
        Self {
            config,
            slot,
            commands,
            local_addr,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// Address the listener is bound to; `None` while rebinding or after exit.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.borrow()
    }

    /// Wait until the listener is bound and return its address.
    ///
    /// Returns `None` if the supervisor stopped first.
    pub async fn bound_addr(&self) -> Option<SocketAddr> {
        let mut local_addr = self.local_addr.clone();
        let bound = local_addr.wait_for(Option::is_some).await.ok()?;
        *bound
    }

    pub async fn is_connected(&self) -> bool {
        self.slot.is_connected().await
    }

    pub async fn peer(&self) -> Option<SocketAddr> {
        self.slot.peer().await
    }

    /// `false` once the accept loop has stopped.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Write `line` verbatim to the active connection.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Send`] if the write fails.
    pub async fn send(&self, line: &str) -> Result<Delivery, SupervisorError> {
        self.slot.send(line).await
    }

    /// Close the active connection; the server keeps accepting.
    ///
    /// Returns `false` when no connection was active.
    pub async fn close(&self) -> bool {
        let closed = self.slot.close().await;
        if closed {
            info!("Connection closed by operator");
        }
        closed
    }

    /// Send a latency probe to the active connection.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Envelope`] if the probe cannot be encoded
    /// and [`SupervisorError::Send`] if the write fails.
    pub async fn ping(&self) -> Result<Delivery, SupervisorError> {
        let ping = probe::build_ping()?;
        self.send(&ping.text).await
    }

    /// Switch the active connection to remote logging and tell the peer.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Command`] if the supervisor has stopped
    /// and [`SupervisorError::Send`] if the write fails.
    pub async fn remote_log(&self) -> Result<Delivery, SupervisorError> {
        let Some(generation) = self.slot.generation().await else {
            info!("send -> no clients");
            return Ok(Delivery::NoClients);
        };
        self.command(SupervisorCommand::ForceStage {
            stage: Stage::RemoteLog,
            generation,
        })
        .await?;
        self.slot.send_to(generation, REMOTE_LOG_COMMAND).await
    }

    /// Drop the listener and any connection, then bind the configured address again.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Command`] if the supervisor has stopped.
    pub async fn reload(&self) -> Result<(), SupervisorError> {
        self.command(SupervisorCommand::Reload).await
    }

    /// Stop the supervisor. Safe to call more than once.
    pub async fn exit(&self) {
        if self.command(SupervisorCommand::Exit).await.is_err() {
            debug!("Exit requested but the supervisor already stopped");
        }
        self.slot.close().await;
    }

    /// Wait for the accept loop to finish.
    ///
    /// Cancel safe: dropping the future leaves the task joinable. Only the
    /// first caller to see it finish observes the outcome; later calls
    /// return `Ok`.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the loop (e.g. a failed rebind) or
    /// [`SupervisorError::Task`] if it panicked.
    pub async fn join(&self) -> Result<(), SupervisorError> {
        let mut slot = self.task.lock().await;
        let Some(task) = slot.as_mut() else {
            return Ok(());
        };
        let outcome = task.await;
        *slot = None;

        outcome.map_err(|e| SupervisorError::Task {
            message: e.to_string(),
            location: ErrorLocation::caller(),
        })?
    }

    pub async fn token(&self) -> RedactedToken {
        self.config.token().await
    }

    /// Replace the shared secret; applies to the next `authorization` attempt.
    pub async fn set_token(&self, token: impl Into<RedactedToken>) -> Result<(), SupervisorError> {
        self.config
            .update(ConfigCommand::SetToken(token.into()))
            .await?;
        Ok(())
    }

    pub async fn ip(&self) -> String {
        self.config.ip().await
    }

    /// Change the listen ip and rebind.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Config`] for an invalid ip; nothing changes.
    pub async fn set_ip(&self, ip: impl Into<String>) -> Result<(), SupervisorError> {
        self.apply(ConfigCommand::SetIp(ip.into())).await
    }

    pub async fn port(&self) -> u16 {
        self.config.port().await
    }

    /// Change the listen port and rebind.
    pub async fn set_port(&self, port: u16) -> Result<(), SupervisorError> {
        self.apply(ConfigCommand::SetPort(port)).await
    }

    async fn apply(&self, command: ConfigCommand) -> Result<(), SupervisorError> {
        if self.config.update(command).await? {
            self.reload().await?;
        }
        Ok(())
    }

    async fn command(&self, command: SupervisorCommand) -> Result<(), SupervisorError> {
        self.commands
            .send(command)
            .await
            .map_err(|e| SupervisorError::Command {
                message: format!("Supervisor stopped, cannot deliver {:?}", e.0),
                location: ErrorLocation::caller(),
            })
    }
}
