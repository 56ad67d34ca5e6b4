//! Connection registry: which connection currently represents which user.
//!
//! At most one connection per user. A later announce for the same user
//! replaces the earlier mapping (multi-tab reconnection). Removal is keyed
//! by connection id, so a superseded connection closing never touches the
//! newer mapping.
//!
//! The reverse `connection -> user` index keeps removal O(1) instead of a
//! scan over every mapping.

use std::collections::HashMap;

use super::{ConnectionId, UserId};

/// What an `announce` changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Announced {
    /// The user had no connection before this announce.
    pub came_online: bool,
    /// The identical (connection, user) pair was already registered.
    pub unchanged: bool,
    /// Earlier connection of the same user that lost its mapping.
    pub displaced: Option<ConnectionId>,
    /// Different user previously announced on this same connection, now unmapped.
    pub released: Option<UserId>,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    by_user: HashMap<UserId, ConnectionId>,
    by_connection: HashMap<ConnectionId, UserId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the mapping for `user_id`. Never fails.
    pub fn announce(&mut self, connection_id: ConnectionId, user_id: UserId) -> Announced {
        if self.by_connection.get(&connection_id) == Some(&user_id) {
            return Announced {
                unchanged: true,
                ..Announced::default()
            };
        }

        let mut outcome = Announced::default();

        // This connection spoke for someone else until now.
        if let Some(previous_user) = self.by_connection.remove(&connection_id) {
            if self.by_user.get(&previous_user) == Some(&connection_id) {
                self.by_user.remove(&previous_user);
            }
            outcome.released = Some(previous_user);
        }

        match self.by_user.insert(user_id, connection_id) {
            Some(old_connection) => {
                self.by_connection.remove(&old_connection);
                outcome.displaced = Some(old_connection);
            }
            None => outcome.came_online = true,
        }
        self.by_connection.insert(connection_id, user_id);

        outcome
    }

    pub fn lookup(&self, user_id: UserId) -> Option<ConnectionId> {
        self.by_user.get(&user_id).copied()
    }

    pub fn identity_of(&self, connection_id: ConnectionId) -> Option<UserId> {
        self.by_connection.get(&connection_id).copied()
    }

    /// Drop whatever mapping points at `connection_id` and return its user.
    pub fn remove_by_connection(&mut self, connection_id: ConnectionId) -> Option<UserId> {
        let user_id = self.by_connection.remove(&connection_id)?;
        if self.by_user.get(&user_id) == Some(&connection_id) {
            self.by_user.remove(&user_id);
        }
        Some(user_id)
    }

    /// Users with a live mapping, in ascending id order.
    pub fn online_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.by_user.keys().copied().collect();
        users.sort_unstable();
        users
    }

    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }
}
