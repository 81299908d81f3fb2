//! Shared wire schema for the task platform.
//!
//! - [`events`]: domain events published by the task service onto the events queue
//! - [`notification`]: the stored notification record pushed to WebSocket clients

pub mod error;
pub mod events;
pub mod notification;

pub use error::{Error, Result};
pub use events::{CommentCreated, DomainEvent, TaskAssigned, TaskChanged};
pub use notification::{NewNotification, Notification, NotificationKind};
