use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::events::OutboundEvent;
use crate::session::ConnectionId;

/// Per-connection outbound queues.
///
/// Each connection has its own unbounded queue drained by its socket writer,
/// so events for one connection keep production order and a slow or dead
/// connection never blocks delivery to the others.
#[derive(Clone, Default)]
pub struct Outbox {
    senders: Arc<RwLock<HashMap<ConnectionId, UnboundedSender<OutboundEvent>>>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, connection_id: ConnectionId) -> UnboundedReceiver<OutboundEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.write().await.insert(connection_id, tx);
        rx
    }

    pub async fn unregister(&self, connection_id: ConnectionId) {
        self.senders.write().await.remove(&connection_id);
    }

    /// Send to one connection. Returns false if it is gone.
    pub async fn send(&self, connection_id: ConnectionId, event: OutboundEvent) -> bool {
        let senders = self.senders.read().await;
        match senders.get(&connection_id) {
            Some(tx) => tx.send(event).is_ok(),
            None => {
                debug!("Dropping event for unknown connection {}", connection_id);
                false
            }
        }
    }

    /// Best-effort fan-out. Returns how many connections accepted the event.
    pub async fn deliver<'a, I>(&self, connections: I, event: &OutboundEvent) -> usize
    where
        I: IntoIterator<Item = &'a ConnectionId>,
    {
        let senders = self.senders.read().await;
        let mut delivered = 0;

        for connection_id in connections {
            match senders.get(connection_id) {
                Some(tx) if tx.send(event.clone()).is_ok() => delivered += 1,
                _ => warn!("Failed to deliver event to connection {}", connection_id),
            }
        }

        delivered
    }
}
