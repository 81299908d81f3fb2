//! Connection state and the table of open WebSocket connections.
//!
//! Uses lock-free DashMap for high-throughput concurrent access.

use crate::error::{NotificationError, Result};
use crate::protocol::ServerMessage;
use axum::extract::ws::Message;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Unique connection identifier.
pub type ConnectionId = Uuid;

/// Default buffer size for connection message channels.
/// Pushes are rare per user; a full buffer means the client stopped reading.
pub const CLIENT_CHANNEL_BUFFER_SIZE: usize = 256;

/// State for a single open connection.
pub struct ClientState {
    /// Unique connection identifier.
    pub id: ConnectionId,
    /// User id from the handshake, if one was given.
    pub user_id: Option<String>,
    /// Channel to send messages to the client's WebSocket.
    pub tx: mpsc::Sender<Message>,
    /// Timestamp when client connected.
    pub connected_at: i64,
    /// Timestamp of the last frame received from the client.
    pub last_ping: AtomicI64,
}

impl ClientState {
    /// Create a new client state with a fresh connection id.
    pub fn new(user_id: Option<String>, tx: mpsc::Sender<Message>) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: Uuid::new_v4(),
            user_id,
            tx,
            connected_at: now,
            last_ping: AtomicI64::new(now),
        }
    }

    /// Send a message to this client.
    /// Uses try_send for non-blocking behavior - fails if the buffer is full or closed.
    pub fn send(&self, msg: &ServerMessage) -> Result<()> {
        let json = serde_json::to_string(msg)?;
        self.tx
            .try_send(Message::Text(json.into()))
            .map_err(|_| NotificationError::ChannelSend)
    }

    /// Record that the client was heard from.
    pub fn update_ping(&self) {
        self.last_ping
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Get the last ping timestamp.
    pub fn last_ping_time(&self) -> i64 {
        self.last_ping.load(Ordering::Relaxed)
    }

    /// True if nothing was received for more than `max_idle_ms` before `now_ms`.
    pub fn is_stale(&self, now_ms: i64, max_idle_ms: i64) -> bool {
        now_ms - self.last_ping_time() > max_idle_ms
    }

    /// Milliseconds since the connection was opened.
    pub fn connected_for_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.connected_at
    }
}

/// Lock-free table of open connections.
#[derive(Default)]
pub struct ClientRegistry {
    clients: DashMap<ConnectionId, Arc<ClientState>>,
}

impl ClientRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection.
    pub fn register(&self, client: Arc<ClientState>) -> ConnectionId {
        let id = client.id;
        self.clients.insert(id, client);
        info!("Connection {} registered", id);
        id
    }

    /// Unregister a connection.
    pub fn unregister(&self, connection_id: &ConnectionId) -> Option<Arc<ClientState>> {
        let removed = self.clients.remove(connection_id).map(|(_, client)| client);
        if removed.is_some() {
            info!("Connection {} unregistered", connection_id);
        }
        removed
    }

    /// Get a connection by id.
    pub fn get(&self, connection_id: &ConnectionId) -> Option<Arc<ClientState>> {
        self.clients.get(connection_id).map(|r| r.clone())
    }

    /// Get the total number of open connections.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_unregister() {
        let registry = ClientRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        let id = registry.register(Arc::new(ClientState::new(Some("u1".to_string()), tx)));

        assert_eq!(registry.client_count(), 1);
        assert_eq!(registry.get(&id).unwrap().user_id.as_deref(), Some("u1"));

        assert!(registry.unregister(&id).is_some());
        assert!(registry.unregister(&id).is_none());
        assert!(registry.get(&id).is_none());
    }

    #[test]
    fn test_send_fails_when_buffer_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let client = ClientState::new(None, tx);
        let msg = ServerMessage::Error {
            message: "m".to_string(),
            code: "C".to_string(),
        };

        assert!(client.send(&msg).is_ok());
        assert!(matches!(client.send(&msg), Err(NotificationError::ChannelSend)));

        assert!(matches!(rx.try_recv(), Ok(Message::Text(_))));
    }

    #[test]
    fn test_stale_after_idle_period() {
        let (tx, _rx) = mpsc::channel(1);
        let client = ClientState::new(None, tx);
        let opened = client.connected_at;

        assert!(!client.is_stale(opened + 1_000, 90_000));
        assert!(client.is_stale(opened + 90_001, 90_000));

        client.update_ping();
        let seen = client.last_ping_time();
        assert!(seen >= opened);
        assert!(!client.is_stale(seen + 90_000, 90_000));
        assert_eq!(client.connected_for_ms(opened + 250), 250);
    }

    #[test]
    fn test_send_fails_when_closed() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let client = ClientState::new(None, tx);
        assert!(client.send(&ServerMessage::Error {
            message: "m".to_string(),
            code: "C".to_string(),
        })
        .is_err());
    }
}
