//! WebSocket protocol message types.
//!
//! Every frame is a JSON text message of the form `{"event": <name>, "data": <payload>}`.
//! Notifications are pushed under their notification type as the event name,
//! e.g. `task:assigned`.

use chrono::{DateTime, Utc};
use common::{Notification, NotificationKind};
use serde::{Deserialize, Serialize};

// ============================================================================
// Client → Server Messages
// ============================================================================

/// Message sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Mark a notification as read.
    MarkRead {
        #[serde(rename = "notificationId")]
        notification_id: String,
    },
    /// Application-level keepalive.
    Ping,
}

// ============================================================================
// Server → Client Messages
// ============================================================================

/// Message sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    #[serde(rename = "task:created")]
    TaskCreated(Notification),
    #[serde(rename = "task:updated")]
    TaskUpdated(Notification),
    #[serde(rename = "task:assigned")]
    TaskAssigned(Notification),
    #[serde(rename = "comment:new")]
    CommentNew(Notification),
    /// Confirmation of a `mark_read`.
    #[serde(rename = "notification_read")]
    NotificationRead {
        #[serde(rename = "notificationId")]
        notification_id: String,
    },
    /// Pong response to ping.
    #[serde(rename = "pong")]
    Pong {
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// Error message.
    #[serde(rename = "error")]
    Error {
        /// Error message.
        message: String,
        /// Error code.
        code: String,
    },
}

impl ServerMessage {
    /// Wrap a notification in the push message named after its type.
    pub fn notification(notification: Notification) -> Self {
        match notification.kind {
            NotificationKind::TaskCreated => Self::TaskCreated(notification),
            NotificationKind::TaskUpdated => Self::TaskUpdated(notification),
            NotificationKind::TaskAssigned => Self::TaskAssigned(notification),
            NotificationKind::CommentNew => Self::CommentNew(notification),
        }
    }

    pub fn pong() -> Self {
        Self::Pong {
            message: "Pong!".to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::NewNotification;
    use serde_json::{json, Value};

    #[test]
    fn test_push_uses_notification_type_as_event() {
        let notification = NewNotification {
            user_id: "u1".to_string(),
            kind: NotificationKind::CommentNew,
            message: "New comment on a task".to_string(),
            task_id: None,
        }
        .into_notification();

        let json: Value =
            serde_json::to_value(ServerMessage::notification(notification.clone())).unwrap();
        assert_eq!(json["event"], "comment:new");
        assert_eq!(json["data"]["id"], notification.id.to_string());
        assert_eq!(json["data"]["taskId"], Value::Null);
    }

    #[test]
    fn test_parse_client_messages() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "event": "mark_read",
            "data": {"notificationId": "n1"}
        }))
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::MarkRead {
                notification_id: "n1".to_string()
            }
        );

        let msg: ClientMessage = serde_json::from_str(r#"{"event":"ping"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping);

        assert!(serde_json::from_str::<ClientMessage>(r#"{"event":"subscribe"}"#).is_err());
    }

    #[test]
    fn test_reply_shapes() {
        let json = serde_json::to_value(ServerMessage::NotificationRead {
            notification_id: "n1".to_string(),
        })
        .unwrap();
        assert_eq!(json, json!({"event": "notification_read", "data": {"notificationId": "n1"}}));

        let json = serde_json::to_value(ServerMessage::pong()).unwrap();
        assert_eq!(json["event"], "pong");
        assert_eq!(json["data"]["message"], "Pong!");
    }
}
