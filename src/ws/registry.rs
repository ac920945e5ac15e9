//! Process-wide registry of accepted sockets.
//!
//! Used only for best-effort local broadcast (connect/disconnect
//! notices) and leak prevention — never as the delivery path, which is
//! the bus. Broadcast iterates a snapshot of the current senders and
//! prunes the ones that fail afterwards, so the set is never mutated
//! while being walked.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::domain::Envelope;

/// Identifier of one accepted socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The set of currently accepted sockets.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<Envelope>>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an accepted socket's outbound queue.
    pub async fn register(&self, outbound: mpsc::UnboundedSender<Envelope>) -> ConnectionId {
        let id = ConnectionId::new();
        self.connections.write().await.insert(id, outbound);
        tracing::debug!(connection = %id, "socket registered");
        id
    }

    /// Removes a socket. Returns `false` if it was already gone.
    pub async fn deregister(&self, id: ConnectionId) -> bool {
        let removed = self.connections.write().await.remove(&id).is_some();
        tracing::debug!(connection = %id, removed, "socket deregistered");
        removed
    }

    /// Sends an envelope to every registered socket, best-effort.
    ///
    /// Failed sockets are only marked during the walk and pruned after
    /// it, so the set is never mutated while being iterated.
    pub async fn broadcast(&self, envelope: &Envelope) {
        let mut dead = Vec::new();
        {
            let connections = self.connections.read().await;
            for (id, tx) in connections.iter() {
                if tx.send(envelope.clone()).is_err() {
                    tracing::warn!(connection = %id, "broadcast target gone, pruning");
                    dead.push(*id);
                }
            }
        }

        if !dead.is_empty() {
            let mut connections = self.connections.write().await;
            for id in dead {
                connections.remove(&id);
            }
        }
    }

    /// Returns the number of registered sockets.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Returns `true` if no sockets are registered.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}
