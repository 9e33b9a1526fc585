pub mod engine;
pub mod stats;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use raystat_common::ConnectionStatus;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// Read-only view of the tunnel state, with change notifications. The stats
/// poller gates each tick on the current status; it never drives the
/// lifecycle itself.
#[async_trait]
pub trait TunnelMonitor: Send + Sync {
    async fn status(&self) -> ConnectionStatus;
    fn subscribe(&self) -> broadcast::Receiver<ConnectionStatus>;
}

/// In-process monitor the tunnel manager updates as its state changes.
#[derive(Clone)]
pub struct SharedTunnelMonitor {
    current: Arc<Mutex<ConnectionStatus>>,
    event_tx: broadcast::Sender<ConnectionStatus>,
}

impl SharedTunnelMonitor {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            current: Arc::new(Mutex::new(ConnectionStatus::Disconnected)),
            event_tx: tx,
        }
    }

    pub async fn set_status(&self, status: ConnectionStatus) {
        let mut lock = self.current.lock().await;
        *lock = status;
        let _ = self.event_tx.send(status);
    }
}

impl Default for SharedTunnelMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TunnelMonitor for SharedTunnelMonitor {
    async fn status(&self) -> ConnectionStatus {
        *self.current.lock().await
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.event_tx.subscribe()
    }
}
