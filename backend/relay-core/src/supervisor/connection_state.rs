//! The single active connection and its write lock.

use crate::error::supervisor::SupervisorError;
use crate::transport::TransportWriter;

use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{Mutex, MutexGuard, Notify};

/// Counts installs, so a command aimed at one connection can be told
/// apart from the next.
pub(crate) type Generation = u64;

/// Result of a send that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// No connection was active; nothing was written.
    NoClients,
}

struct ActiveConnection {
    peer: SocketAddr,
    generation: Generation,
    writer: TransportWriter,
    /// Wakes the read loop when the connection is closed locally.
    shutdown: Arc<Notify>,
}

#[derive(Default)]
struct SlotState {
    active: Option<ActiveConnection>,
    installs: Generation,
}

/// What the read loop keeps from [`ConnectionSlot::install`].
pub(crate) struct Installed {
    pub(crate) generation: Generation,
    pub(crate) shutdown: Arc<Notify>,
}

/// Slot holding the active connection's writer.
///
/// `send` and `close` both hold the lock for their whole duration, so one
/// writer at a time, and a close never splits a write.
#[derive(Clone, Default)]
pub(crate) struct ConnectionSlot {
    inner: Arc<Mutex<SlotState>>,
}

impl ConnectionSlot {
    /// Make `writer` the active connection under a fresh generation.
    pub(crate) async fn install(&self, peer: SocketAddr, writer: TransportWriter) -> Installed {
        let shutdown = Arc::new(Notify::new());
        let mut state = self.inner.lock().await;
        if let Some(previous) = state.active.as_ref() {
            warn!("Replacing active connection {} with {}", previous.peer, peer);
        }
        state.installs += 1;
        let generation = state.installs;
        state.active = Some(ActiveConnection {
            peer,
            generation,
            writer,
            shutdown: Arc::clone(&shutdown),
        });
        Installed {
            generation,
            shutdown,
        }
    }

    pub(crate) async fn is_connected(&self) -> bool {
        self.inner.lock().await.active.is_some()
    }

    pub(crate) async fn peer(&self) -> Option<SocketAddr> {
        self.inner.lock().await.active.as_ref().map(|active| active.peer)
    }

    /// Generation of the active connection, if any.
    pub(crate) async fn generation(&self) -> Option<Generation> {
        self.inner
            .lock()
            .await
            .active
            .as_ref()
            .map(|active| active.generation)
    }

    /// Write one line to the active connection.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Send`] if the transport write fails. The
    /// connection stays installed; the read loop notices a dead peer.
    pub(crate) async fn send(&self, line: &str) -> Result<Delivery, SupervisorError> {
        let state = self.inner.lock().await;
        write_line(state, line).await
    }

    /// Like [`ConnectionSlot::send`], but only to connection `generation`.
    ///
    /// A newer connection counts as no client at all.
    pub(crate) async fn send_to(
        &self,
        generation: Generation,
        line: &str,
    ) -> Result<Delivery, SupervisorError> {
        let state = self.inner.lock().await;
        let newer = state
            .active
            .as_ref()
            .filter(|active| active.generation != generation);
        if let Some(active) = newer {
            debug!("Connection #{} is gone, {} now holds the slot", generation, active.peer);
            info!("send -> no clients");
            return Ok(Delivery::NoClients);
        }
        write_line(state, line).await
    }

    /// Close and forget the active connection.
    ///
    /// Returns `false` when there was nothing to close.
    pub(crate) async fn close(&self) -> bool {
        let mut state = self.inner.lock().await;
        let Some(mut active) = state.active.take() else {
            return false;
        };

        if let Err(e) = active.writer.close().await {
            debug!("Closing {} ({}): {}", active.peer, active.writer.kind(), e);
        }
        active.shutdown.notify_one();
        true
    }
}

async fn write_line(
    mut state: MutexGuard<'_, SlotState>,
    line: &str,
) -> Result<Delivery, SupervisorError> {
    let Some(active) = state.active.as_mut() else {
        info!("send -> no clients");
        return Ok(Delivery::NoClients);
    };

    if let Err(e) = active.writer.write(line).await {
        warn!("Sending error to {}: {}", active.peer, e);
        return Err(e.into());
    }
    debug!("send -> {line}");
    Ok(Delivery::Sent)
}
