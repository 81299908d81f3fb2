//! Notification service error types.

use thiserror::Error;

/// Notification service error type.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Redis storage error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Storage backend error other than Redis.
    #[error("Store error: {0}")]
    Store(String),

    /// Outbound buffer of a connection is full or closed.
    #[error("Channel send error")]
    ChannelSend,

    /// Configuration value could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for notification service operations.
pub type Result<T> = std::result::Result<T, NotificationError>;
