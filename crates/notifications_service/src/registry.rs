//! Socket registry: which connection receives pushes for which user.
//!
//! At most one connection per user. A newer connection for the same user
//! replaces the older one; the older socket stays open but no longer
//! receives pushes. Nothing here is persisted.
//!
//! Both indexes are DashMaps. Every mutation goes through per-key shard
//! locks, and the user-side removal on disconnect is a conditional
//! `remove_if`, so a late disconnect of a superseded connection can never
//! remove the newer entry.

use crate::client::ConnectionId;
use dashmap::DashMap;
use tracing::{debug, info};

/// Live mapping from user id to connection id.
#[derive(Debug, Default)]
pub struct SocketRegistry {
    /// User id → active connection.
    by_user: DashMap<String, ConnectionId>,
    /// Active connection → user id (reverse index for disconnects).
    by_connection: DashMap<ConnectionId, String>,
}

impl SocketRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route pushes for `user_id` to `connection_id`.
    ///
    /// Returns the connection that was displaced, if any.
    pub fn on_connect(&self, user_id: &str, connection_id: ConnectionId) -> Option<ConnectionId> {
        let previous = self.by_user.insert(user_id.to_string(), connection_id);
        if let Some(previous) = previous.filter(|prev| *prev != connection_id) {
            self.by_connection.remove(&previous);
            info!(
                "User {} reconnected on {}, replacing {}",
                user_id, connection_id, previous
            );
        } else {
            info!("User {} connected on {}", user_id, connection_id);
        }
        self.by_connection.insert(connection_id, user_id.to_string());
        previous.filter(|prev| *prev != connection_id)
    }

    /// Forget `connection_id`.
    ///
    /// Unknown or already-superseded connections are a no-op. Returns the
    /// user whose entry was removed.
    pub fn on_disconnect(&self, connection_id: ConnectionId) -> Option<String> {
        let (_, user_id) = self.by_connection.remove(&connection_id)?;
        let removed = self
            .by_user
            .remove_if(&user_id, |_, current| *current == connection_id);

        match removed {
            Some((user_id, _)) => {
                info!("User {} disconnected ({})", user_id, connection_id);
                Some(user_id)
            }
            None => {
                debug!(
                    "Connection {} for user {} was already superseded",
                    connection_id, user_id
                );
                None
            }
        }
    }

    /// Connection currently receiving pushes for `user_id`.
    pub fn resolve(&self, user_id: &str) -> Option<ConnectionId> {
        self.by_user.get(user_id).map(|entry| *entry)
    }

    /// Number of users with an active connection.
    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uuid::Uuid;

    #[test]
    fn test_last_connect_wins() {
        let registry = SocketRegistry::new();
        let (c1, c2) = (Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(registry.on_connect("u1", c1), None);
        assert_eq!(registry.on_connect("u1", c2), Some(c1));
        assert_eq!(registry.resolve("u1"), Some(c2));
        assert_eq!(registry.user_count(), 1);
    }

    #[test]
    fn test_disconnect_removes_entry() {
        let registry = SocketRegistry::new();
        let c1 = Uuid::new_v4();

        registry.on_connect("u1", c1);
        assert_eq!(registry.on_disconnect(c1), Some("u1".to_string()));
        assert_eq!(registry.resolve("u1"), None);
        assert_eq!(registry.user_count(), 0);
    }

    #[test]
    fn test_unknown_disconnect_is_noop() {
        let registry = SocketRegistry::new();
        let c1 = Uuid::new_v4();
        registry.on_connect("u1", c1);

        assert_eq!(registry.on_disconnect(Uuid::new_v4()), None);
        assert_eq!(registry.resolve("u1"), Some(c1));
    }

    #[test]
    fn test_superseded_disconnect_keeps_newer_connection() {
        let registry = SocketRegistry::new();
        let (c1, c2) = (Uuid::new_v4(), Uuid::new_v4());

        registry.on_connect("u1", c1);
        registry.on_connect("u1", c2);
        assert_eq!(registry.on_disconnect(c1), None);
        assert_eq!(registry.resolve("u1"), Some(c2));

        assert_eq!(registry.on_disconnect(c2), Some("u1".to_string()));
        assert_eq!(registry.resolve("u1"), None);
    }

    #[test]
    fn test_reconnect_same_connection() {
        let registry = SocketRegistry::new();
        let c1 = Uuid::new_v4();

        registry.on_connect("u1", c1);
        assert_eq!(registry.on_connect("u1", c1), None);
        assert_eq!(registry.on_disconnect(c1), Some("u1".to_string()));
    }

    #[test]
    fn test_users_are_independent() {
        let registry = SocketRegistry::new();
        let (c1, c2) = (Uuid::new_v4(), Uuid::new_v4());

        registry.on_connect("u1", c1);
        registry.on_connect("u2", c2);
        registry.on_disconnect(c1);

        assert_eq!(registry.resolve("u1"), None);
        assert_eq!(registry.resolve("u2"), Some(c2));
    }

    #[test]
    fn test_concurrent_connect_disconnect() {
        let registry = Arc::new(SocketRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let user = format!("user-{}", i % 4);
                    for _ in 0..500 {
                        let connection = Uuid::new_v4();
                        registry.on_connect(&user, connection);
                        registry.on_disconnect(connection);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Every connection was disconnected; no user may still resolve.
        for i in 0..4 {
            assert_eq!(registry.resolve(&format!("user-{}", i)), None);
        }
    }
}
