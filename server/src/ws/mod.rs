pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod protocol;
pub mod registry;

use dashmap::DashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use registry::ConnectionRegistry;

/// Application-level user identity, as stored in the persistence layer.
pub type UserId = i64;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system can clone this to push messages to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Identity registry shared between the presence tracker and the event router.
/// All mutation goes through the mutex so announce/remove stay atomic
/// across the user and connection indexes.
pub type SharedRegistry = Arc<Mutex<ConnectionRegistry>>;

/// Create a new empty shared registry.
pub fn new_shared_registry() -> SharedRegistry {
    Arc::new(Mutex::new(ConnectionRegistry::new()))
}

/// Lock the registry. The maps are updated together under the lock,
/// so a panic elsewhere cannot leave them half-written; recover from poison.
pub fn lock_registry(registry: &SharedRegistry) -> MutexGuard<'_, ConnectionRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Opaque, server-assigned identifier of one live transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Every open transport connection, announced or not.
/// Owns the outbound channel handles; the registry only stores ids.
#[derive(Default)]
pub struct Connections {
    senders: DashMap<ConnectionId, ConnectionSender>,
}

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly opened connection and hand back its id.
    pub fn open(&self, sender: ConnectionSender) -> ConnectionId {
        let id = ConnectionId::new();
        self.senders.insert(id, sender);
        id
    }

    /// Forget a connection. Returns false if it was already gone.
    pub fn close(&self, id: ConnectionId) -> bool {
        self.senders.remove(&id).is_some()
    }

    pub fn get(&self, id: ConnectionId) -> Option<ConnectionSender> {
        self.senders.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Snapshot of (id, sender) pairs so callers never hold shard locks while sending.
    pub fn snapshot(&self) -> Vec<(ConnectionId, ConnectionSender)> {
        self.senders
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }
}
