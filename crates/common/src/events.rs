//! Domain events carried on the task events queue.
//!
//! Events are JSON objects with a `type` discriminator and camelCase fields:
//!
//! ```text
//! {"type":"task.assigned","taskId":"t-1","userId":"u-7","timestamp":"..."}
//! ```
//!
//! Unrecognised types parse into [`DomainEvent::Unknown`] so new producers can
//! roll out before consumers learn about them. The same goes for JSON that is
//! not an object or whose `type` is missing or not a string.

use crate::error::Result;
use crate::notification::{NewNotification, NotificationKind};
use serde::Deserialize;
use serde_json::Value;

/// Payload of `task.created` and `task.updated`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskChanged {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub title: String,
    /// Owner of the task; receives the notification.
    pub created_by: String,
}

/// Payload of `task.assigned`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssigned {
    #[serde(default)]
    pub task_id: Option<String>,
    /// The assignee; receives the notification.
    pub user_id: String,
}

/// Payload of `comment.created`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentCreated {
    #[serde(default)]
    pub task_id: Option<String>,
    /// The task service publishes this as `authorId`.
    #[serde(alias = "authorId")]
    pub created_by: String,
}

/// A domain event read from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    TaskCreated(TaskChanged),
    TaskUpdated(TaskChanged),
    TaskAssigned(TaskAssigned),
    CommentCreated(CommentCreated),
    /// Any other `type`, kept verbatim for logging. Empty when the payload
    /// has no `type` at all; a non-string `type` is kept as its JSON text.
    Unknown(String),
}

impl DomainEvent {
    pub const TASK_CREATED: &'static str = "task.created";
    pub const TASK_UPDATED: &'static str = "task.updated";
    pub const TASK_ASSIGNED: &'static str = "task.assigned";
    pub const COMMENT_CREATED: &'static str = "comment.created";

    /// Parse a raw queue payload.
    ///
    /// Fails only if the payload is not JSON, or if a known event type lacks
    /// its owner field.
    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        let Value::Object(mut fields) = serde_json::from_slice::<Value>(payload)? else {
            return Ok(Self::Unknown(String::new()));
        };
        let event_type = match fields.remove("type") {
            Some(Value::String(event_type)) => event_type,
            Some(other) => return Ok(Self::Unknown(other.to_string())),
            None => return Ok(Self::Unknown(String::new())),
        };
        let fields = Value::Object(fields);

        let event = match event_type.as_str() {
            Self::TASK_CREATED => Self::TaskCreated(serde_json::from_value(fields)?),
            Self::TASK_UPDATED => Self::TaskUpdated(serde_json::from_value(fields)?),
            Self::TASK_ASSIGNED => Self::TaskAssigned(serde_json::from_value(fields)?),
            Self::COMMENT_CREATED => Self::CommentCreated(serde_json::from_value(fields)?),
            _ => Self::Unknown(event_type),
        };
        Ok(event)
    }

    /// The wire `type` of this event.
    pub fn event_type(&self) -> &str {
        match self {
            Self::TaskCreated(_) => Self::TASK_CREATED,
            Self::TaskUpdated(_) => Self::TASK_UPDATED,
            Self::TaskAssigned(_) => Self::TASK_ASSIGNED,
            Self::CommentCreated(_) => Self::COMMENT_CREATED,
            Self::Unknown(event_type) => event_type,
        }
    }

    /// Build the notification this event produces, if the type is known.
    pub fn to_notification(&self) -> Option<NewNotification> {
        let new = match self {
            Self::TaskCreated(e) => NewNotification {
                user_id: e.created_by.clone(),
                kind: NotificationKind::TaskCreated,
                message: format!("You created the task: {}", e.title),
                task_id: e.task_id.clone(),
            },
            Self::TaskUpdated(e) => NewNotification {
                user_id: e.created_by.clone(),
                kind: NotificationKind::TaskUpdated,
                message: format!("Task updated: {}", e.title),
                task_id: e.task_id.clone(),
            },
            Self::TaskAssigned(e) => NewNotification {
                user_id: e.user_id.clone(),
                kind: NotificationKind::TaskAssigned,
                message: "You were assigned to a task".to_string(),
                task_id: e.task_id.clone(),
            },
            Self::CommentCreated(e) => NewNotification {
                user_id: e.created_by.clone(),
                kind: NotificationKind::CommentNew,
                message: "New comment on a task".to_string(),
                task_id: e.task_id.clone(),
            },
            Self::Unknown(_) => return None,
        };
        Some(new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task_created() {
        let payload = br#"{"type":"task.created","taskId":"t1","title":"Write docs","createdBy":"u1","timestamp":"2024-01-01T00:00:00Z"}"#;
        let event = DomainEvent::from_slice(payload).unwrap();
        assert_eq!(
            event,
            DomainEvent::TaskCreated(TaskChanged {
                task_id: Some("t1".to_string()),
                title: "Write docs".to_string(),
                created_by: "u1".to_string(),
            })
        );
        assert_eq!(event.to_notification().unwrap().user_id, "u1");
        assert_eq!(event.event_type(), "task.created");
    }

    #[test]
    fn test_parse_task_assigned_owner_is_assignee() {
        let payload = br#"{"type":"task.assigned","taskId":"t1","userId":"u2","createdBy":"u1"}"#;
        let event = DomainEvent::from_slice(payload).unwrap();

        let new = event.to_notification().unwrap();
        assert_eq!(new.user_id, "u2");
        assert_eq!(new.kind, NotificationKind::TaskAssigned);
        assert_eq!(new.task_id.as_deref(), Some("t1"));
    }

    #[test]
    fn test_comment_accepts_author_id() {
        let payload = br#"{"type":"comment.created","taskId":"t1","authorId":"u3","content":"hi"}"#;
        let event = DomainEvent::from_slice(payload).unwrap();
        let new = event.to_notification().unwrap();
        assert_eq!(new.user_id, "u3");
        assert_eq!(new.kind, NotificationKind::CommentNew);
    }

    #[test]
    fn test_unknown_type() {
        let payload = br#"{"type":"task.archived","taskId":"t1"}"#;
        let event = DomainEvent::from_slice(payload).unwrap();
        assert_eq!(event, DomainEvent::Unknown("task.archived".to_string()));
        assert!(event.to_notification().is_none());
    }

    #[test]
    fn test_missing_owner_is_malformed() {
        assert!(DomainEvent::from_slice(br#"{"type":"task.updated","taskId":"t1"}"#).is_err());
        assert!(DomainEvent::from_slice(br#"{"type":"task.assigned","taskId":"t1"}"#).is_err());
    }

    #[test]
    fn test_not_json_is_malformed() {
        assert!(DomainEvent::from_slice(b"not json").is_err());
        assert!(DomainEvent::from_slice(b"").is_err());
    }

    #[test]
    fn test_json_without_usable_type_is_unknown() {
        let missing = DomainEvent::from_slice(br#"{"taskId":"t1","userId":"u1"}"#).unwrap();
        assert_eq!(missing, DomainEvent::Unknown(String::new()));
        assert!(missing.to_notification().is_none());

        let numeric = DomainEvent::from_slice(br#"{"type":42,"userId":"u1"}"#).unwrap();
        assert_eq!(numeric, DomainEvent::Unknown("42".to_string()));

        let array = DomainEvent::from_slice(br#"["task.created"]"#).unwrap();
        assert!(array.to_notification().is_none());
    }

    #[test]
    fn test_messages() {
        let created = DomainEvent::from_slice(
            br#"{"type":"task.created","title":"Ship it","createdBy":"u1"}"#,
        )
        .unwrap();
        assert_eq!(
            created.to_notification().unwrap().message,
            "You created the task: Ship it"
        );

        let updated = DomainEvent::from_slice(
            br#"{"type":"task.updated","title":"Ship it","createdBy":"u1"}"#,
        )
        .unwrap();
        let new = updated.to_notification().unwrap();
        assert_eq!(new.message, "Task updated: Ship it");
        assert!(new.task_id.is_none());
    }
}
