//! Accept loop and per-connection read loop.

use crate::config::ServerConfig;
use crate::error::supervisor::SupervisorError;
use crate::protocol::{Event, ProtocolEngine, Stage};
use crate::supervisor::SupervisorCommand;
use crate::supervisor::config_state::ConfigState;
use crate::supervisor::connection_state::{ConnectionSlot, Generation, Installed};
use crate::supervisor::handle::SupervisorHandle;
use crate::transport::{TransportReader, TransportSocket};

use common::ErrorLocation;

use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};

const COMMAND_BUFFER: usize = 16;

/// Pause after a failed `accept` before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// What the accept loop does once the current listener is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Exit,
    Rebind,
}

/// Bind the configured address and start serving in a background task.
///
/// # Errors
///
/// Returns [`SupervisorError::Config`] for an invalid config and
/// [`SupervisorError::Bind`] if the address cannot be bound. Both are fatal.
pub async fn start(config: ServerConfig) -> Result<SupervisorHandle, SupervisorError> {
    config.validate()?;

    let config = ConfigState::new(config);
    let listener = bind(&config.address().await).await?;
    let local_addr = listener.local_addr()?;
    info!("Server listening on {}", local_addr);

    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (addr_tx, addr_rx) = watch::channel(Some(local_addr));
    let slot = ConnectionSlot::default();

    let accept_loop = AcceptLoop {
        config: config.clone(),
        slot: slot.clone(),
        commands: command_rx,
        local_addr: addr_tx,
        engine: ProtocolEngine::new(),
    };
    let task = tokio::spawn(accept_loop.run(listener));

    Ok(SupervisorHandle::new(config, slot, command_tx, addr_rx, task))
}

async fn bind(address: &str) -> Result<TcpListener, SupervisorError> {
    TcpListener::bind(address)
        .await
        .map_err(|e| SupervisorError::Bind {
            address: address.to_string(),
            message: e.to_string(),
            location: ErrorLocation::caller(),
        })
}

/// Map a command received while idle or mid-connection to a lifecycle change.
///
/// A closed channel means every handle is gone, which is treated as exit.
fn lifecycle_of(command: Option<SupervisorCommand>) -> Option<Lifecycle> {
    match command {
        None | Some(SupervisorCommand::Exit) => Some(Lifecycle::Exit),
        Some(SupervisorCommand::Reload) => Some(Lifecycle::Rebind),
        Some(SupervisorCommand::ForceStage { stage, .. }) => {
            debug!("Stage {} ignored: no active connection", stage);
            None
        }
    }
}

/// The stage to force on connection `current`, if the override targets it.
fn stage_override(current: Generation, stage: Stage, target: Generation) -> Option<Stage> {
    if target == current {
        Some(stage)
    } else {
        debug!("Stage {} ignored: meant for connection #{}", stage, target);
        None
    }
}

struct AcceptLoop {
    config: ConfigState,
    slot: ConnectionSlot,
    commands: mpsc::Receiver<SupervisorCommand>,
    local_addr: watch::Sender<Option<SocketAddr>>,
    engine: ProtocolEngine,
}

impl AcceptLoop {
    async fn run(mut self, mut listener: TcpListener) -> Result<(), SupervisorError> {
        loop {
            let lifecycle = self.serve(&listener).await;
            drop(listener);
            self.local_addr.send_replace(None);

            match lifecycle {
                Lifecycle::Exit => break,
                Lifecycle::Rebind => {
                    let address = self.config.address().await;
                    info!("Reloading server on {}", address);
                    listener = bind(&address).await.inspect_err(|e| error!("{e}"))?;
                    let local_addr = listener.local_addr()?;
                    self.local_addr.send_replace(Some(local_addr));
                    info!("Server listening on {}", local_addr);
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }

    async fn serve(&mut self, listener: &TcpListener) -> Lifecycle {
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => {
                    if let Some(lifecycle) = lifecycle_of(command) {
                        return lifecycle;
                    }
                }

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if let Some(lifecycle) = self.serve_connection(stream, peer).await {
                            return lifecycle;
                        }
                    }
                    Err(e) => {
                        warn!("Connecting error: {}", e);
                        tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    }
                },
            }
        }
    }

    /// Serve one peer until it goes away.
    ///
    /// Returns the lifecycle change that interrupted it, if any.
    async fn serve_connection(&mut self, stream: TcpStream, peer: SocketAddr) -> Option<Lifecycle> {
        info!("Connected {}", peer);

        let establishing = TransportSocket::establish(stream);
        tokio::pin!(establishing);

        let established = loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => {
                    if let Some(lifecycle) = lifecycle_of(command) {
                        info!("Disconnected {}", peer);
                        return Some(lifecycle);
                    }
                }

                established = &mut establishing => break established,
            }
        };

        let socket = match established {
            Ok(socket) => socket,
            Err(e) => {
                warn!("Connection {} failed: {}", peer, e);
                info!("Disconnected {}", peer);
                return None;
            }
        };
        info!("{} speaks {}", peer, socket.kind());

        let (mut reader, writer) = socket.into_split();
        self.engine.reset();
        let installed = self.slot.install(peer, writer).await;

        let lifecycle = self.read_loop(&mut reader, &installed).await;

        self.slot.close().await;
        info!("Disconnected {}", peer);
        lifecycle
    }

    async fn read_loop(
        &mut self,
        reader: &mut TransportReader,
        installed: &Installed,
    ) -> Option<Lifecycle> {
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(SupervisorCommand::ForceStage { stage, generation }) => {
                        let current = installed.generation;
                        if let Some(stage) = stage_override(current, stage, generation) {
                            info!("Stage forced to {}", stage);
                            self.engine.force_stage(stage);
                        }
                    }
                    other => return lifecycle_of(other),
                },

                () = installed.shutdown.notified() => {
                    debug!("Connection closed locally");
                    return None;
                }

                line = reader.read() => match line {
                    Ok(line) => {
                        if self.dispatch(&line).await.is_break() {
                            return None;
                        }
                    }
                    Err(e) if e.is_closed() => {
                        debug!("{}", e);
                        return None;
                    }
                    Err(e) => {
                        warn!("Read error: {}", e);
                        return None;
                    }
                },
            }
        }
    }

    async fn dispatch(&mut self, line: &str) -> ControlFlow<()> {
        debug!("recv <- {line}");

        let policy = self.config.policy().await;
        let transition = match self.engine.handle_line(line, &policy) {
            Ok(transition) => transition,
            Err(e) => {
                error!("Failed to build reply: {}", e);
                return ControlFlow::Continue(());
            }
        };

        if let Some(event) = &transition.event {
            report(event);
        }

        if let Some(reply) = &transition.reply {
            // Failures are logged by the slot; the read side notices a dead peer.
            let _ = self.slot.send(&reply.text).await;
        }

        if transition.terminate {
            info!("Terminating connection (stage {})", self.engine.stage());
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

fn report(event: &Event) {
    match event {
        Event::Authorized => info!("Client authorized"),
        Event::AuthRejected { attempts } => warn!("Wrong hash (attempt {})", attempts),
        Event::Upgraded => info!("Client upgraded to duplex"),
        Event::InboundError { code, message, id } => {
            warn!("Error receive: {}: {}, id: {:?}", code, message, id)
        }
        Event::ParseFailed { reason } => warn!("Wrong JSON: {}", reason),
        Event::Broken(envelope) => warn!("Broken JSON-RPC: {:?}", envelope),
        Event::Unhandled { method } => debug!("Unhandled method \"{}\"", method),
        Event::Latency(latency) => info!("ping {} ms", latency),
        Event::RemoteLog(line) => info!("remote log: {}", line),
    }
}
