//! Server-side presence tracking and broadcast.
//!
//! Turns registry transitions into `presence-changed` events. The registry
//! mutation and its broadcast happen under the same lock, so other clients
//! observe presence changes in the order the registry applied them.
//! Presence is in-memory only and lost on restart.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;
use crate::ws::broadcast::{broadcast_except, send_to_connection};
use crate::ws::protocol::{PresenceStatus, ServerEvent};
use crate::ws::registry::Announced;
use crate::ws::{lock_registry, ConnectionId, Connections, SharedRegistry, UserId};

pub struct PresenceTracker {
    registry: SharedRegistry,
    connections: Arc<Connections>,
    send_snapshot: bool,
}

impl PresenceTracker {
    pub fn new(registry: SharedRegistry, connections: Arc<Connections>, send_snapshot: bool) -> Self {
        Self {
            registry,
            connections,
            send_snapshot,
        }
    }

    /// Map `connection_id` to `user_id` and tell everyone else.
    ///
    /// "online" goes out only when the user had no connection before; a
    /// re-announce from a new tab or a repeated identical announce is silent.
    pub fn announce(&self, connection_id: ConnectionId, user_id: UserId) -> Announced {
        let mut registry = lock_registry(&self.registry);
        let outcome = registry.announce(connection_id, user_id);

        if let Some(released) = outcome.released {
            let reached = broadcast_except(
                &self.connections,
                None,
                &ServerEvent::presence(released, PresenceStatus::Offline),
            );
            tracing::info!(
                user_id = released,
                connection_id = %connection_id,
                reached,
                "Connection switched identity, previous user offline"
            );
        }

        if outcome.came_online {
            let reached = broadcast_except(
                &self.connections,
                Some(connection_id),
                &ServerEvent::presence(user_id, PresenceStatus::Online),
            );
            tracing::info!(
                user_id,
                connection_id = %connection_id,
                reached,
                "User online"
            );
        } else if let Some(displaced) = outcome.displaced {
            tracing::debug!(
                user_id,
                connection_id = %connection_id,
                displaced = %displaced,
                "User re-announced from a new connection"
            );
        }

        if self.send_snapshot && !outcome.unchanged {
            let online: Vec<UserId> = registry
                .online_users()
                .into_iter()
                .filter(|u| *u != user_id)
                .collect();
            send_to_connection(
                &self.connections,
                connection_id,
                &ServerEvent::PresenceSnapshot { online },
            );
        }

        outcome
    }

    /// Forget a closed connection. Broadcasts "offline" only if the
    /// connection was still the current one for its user.
    pub fn disconnect(&self, connection_id: ConnectionId) -> Option<UserId> {
        let mut registry = lock_registry(&self.registry);
        self.connections.close(connection_id);

        let Some(user_id) = registry.remove_by_connection(connection_id) else {
            tracing::debug!(connection_id = %connection_id, "Unmapped connection closed");
            return None;
        };

        let reached = broadcast_except(
            &self.connections,
            None,
            &ServerEvent::presence(user_id, PresenceStatus::Offline),
        );
        tracing::info!(
            user_id,
            connection_id = %connection_id,
            reached,
            "User offline"
        );
        Some(user_id)
    }

    pub fn online_users(&self) -> Vec<UserId> {
        lock_registry(&self.registry).online_users()
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        lock_registry(&self.registry).lookup(user_id).is_some()
    }
}

// --- REST endpoint handlers ---

#[derive(Debug, Serialize)]
pub struct PresenceResponse {
    pub online: Vec<UserId>,
}

/// GET /api/presence: users currently holding a live connection.
pub async fn get_presence(State(state): State<AppState>) -> Json<PresenceResponse> {
    Json(PresenceResponse {
        online: state.hub.online_users(),
    })
}
