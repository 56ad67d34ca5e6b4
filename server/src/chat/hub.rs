//! Real-time hub: the one handle the transport and REST layers share.
//!
//! Owns the connection table, the identity registry, the presence tracker
//! and the event router. Held in `AppState`, never a global, so tests can
//! run several independent hubs side by side.

use std::sync::Arc;

use crate::chat::presence::PresenceTracker;
use crate::chat::router::EventRouter;
use crate::config::RealtimeConfig;
use crate::ws::protocol::ServerEvent;
use crate::ws::registry::Announced;
use crate::ws::{
    lock_registry, new_shared_registry, ConnectionId, ConnectionSender, Connections,
    SharedRegistry, UserId,
};

pub struct RealtimeHub {
    connections: Arc<Connections>,
    registry: SharedRegistry,
    presence: PresenceTracker,
    router: EventRouter,
}

impl RealtimeHub {
    pub fn new(config: &RealtimeConfig) -> Self {
        let connections = Arc::new(Connections::new());
        let registry = new_shared_registry();
        Self {
            presence: PresenceTracker::new(
                registry.clone(),
                connections.clone(),
                config.presence_snapshot,
            ),
            router: EventRouter::new(registry.clone(), connections.clone()),
            connections,
            registry,
        }
    }

    /// A transport connection opened. It stays unmapped until it announces.
    pub fn connect(&self, sender: ConnectionSender) -> ConnectionId {
        let id = self.connections.open(sender);
        tracing::debug!(
            connection_id = %id,
            open = self.connections.len(),
            "Connection opened"
        );
        id
    }

    pub fn announce(&self, connection_id: ConnectionId, user_id: UserId) -> Announced {
        self.presence.announce(connection_id, user_id)
    }

    pub fn disconnect(&self, connection_id: ConnectionId) -> Option<UserId> {
        self.presence.disconnect(connection_id)
    }

    pub fn identity_of(&self, connection_id: ConnectionId) -> Option<UserId> {
        lock_registry(&self.registry).identity_of(connection_id)
    }

    pub fn online_users(&self) -> Vec<UserId> {
        self.presence.online_users()
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.presence.is_online(user_id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn route(&self, target_user_id: UserId, event: &ServerEvent) {
        self.router.route(target_user_id, event);
    }

    /// Tell `target_user_id` that a message landed in a conversation.
    pub fn notify_message(
        &self,
        target_user_id: UserId,
        conversation_id: i64,
        sender_id: UserId,
        message: serde_json::Value,
    ) {
        self.route(
            target_user_id,
            &ServerEvent::MessageDelivered {
                conversation_id,
                sender_id,
                message,
            },
        );
    }

    pub fn notify_typing(
        &self,
        target_user_id: UserId,
        conversation_id: i64,
        sender_id: UserId,
        is_typing: bool,
    ) {
        self.route(
            target_user_id,
            &ServerEvent::TypingIndicator {
                conversation_id,
                sender_id,
                is_typing,
            },
        );
    }
}
