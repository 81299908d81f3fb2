//! Notifications service: domain events to stored notifications and live pushes.
//!
//! This service:
//! - Consumes task events from a durable JetStream work queue
//! - Stores one notification per known event
//! - Pushes the notification to the owner's WebSocket, if connected
//! - Serves the stored notifications over REST
//!
//! ## Architecture
//!
//! ```text
//! JetStream: tasks_events (durable consumer)
//!         ↓
//! EventDispatcher ──→ NotificationStore (memory / Redis)
//!         ↓
//! SocketRegistry (userId → connection id)
//!         ↓
//! ClientRegistry (connection id → outbound buffer)
//!         ↓
//! WebSocket client
//! ```
//!
//! Delivery from the queue is at-least-once. Pushes are best-effort; the
//! stored notification is the durable record.

pub mod api;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod protocol;
pub mod redis_store;
pub mod registry;
pub mod store;
pub mod supervisor;
pub mod ws_server;

pub use client::{ClientRegistry, ClientState, ConnectionId};
pub use config::{ServiceConfig, StoreBackend};
pub use dispatcher::{Disposition, EventDispatcher, Outcome};
pub use error::{NotificationError, Result};
pub use protocol::{ClientMessage, ServerMessage};
pub use redis_store::RedisNotificationStore;
pub use registry::SocketRegistry;
pub use store::{InMemoryNotificationStore, NotificationStore};
pub use supervisor::supervise;
pub use ws_server::{create_router, AppState};
