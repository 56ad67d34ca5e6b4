//! Targeted, best-effort delivery to one user's current connection.

use std::sync::Arc;

use crate::ws::broadcast::send_to_connection;
use crate::ws::protocol::ServerEvent;
use crate::ws::{lock_registry, Connections, SharedRegistry, UserId};

pub struct EventRouter {
    registry: SharedRegistry,
    connections: Arc<Connections>,
}

impl EventRouter {
    pub fn new(registry: SharedRegistry, connections: Arc<Connections>) -> Self {
        Self {
            registry,
            connections,
        }
    }

    /// Deliver `event` to the target's connection, or drop it.
    /// Offline recipients and closed-mid-send connections are both silent no-ops.
    pub fn route(&self, target_user_id: UserId, event: &ServerEvent) {
        // Lock released before sending.
        let connection_id = lock_registry(&self.registry).lookup(target_user_id);

        let Some(connection_id) = connection_id else {
            tracing::debug!(
                target_user_id,
                event = event.kind(),
                "Recipient offline, event dropped"
            );
            return;
        };

        if send_to_connection(&self.connections, connection_id, event) {
            tracing::trace!(
                target_user_id,
                connection_id = %connection_id,
                event = event.kind(),
                "Event delivered"
            );
        } else {
            tracing::debug!(
                target_user_id,
                connection_id = %connection_id,
                event = event.kind(),
                "Recipient connection gone, event dropped"
            );
        }
    }
}
