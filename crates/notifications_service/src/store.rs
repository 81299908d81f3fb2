//! Notification persistence.
//!
//! The dispatcher and the API only see [`NotificationStore`]; the backend is
//! chosen at startup (in-memory or Redis).

use crate::error::Result;
use async_trait::async_trait;
use common::{NewNotification, Notification};
use dashmap::DashMap;
use uuid::Uuid;

/// Maximum number of notifications returned by [`NotificationStore::find_by_user`].
pub const MAX_LISTED: usize = 50;

/// Storage for notification records.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a new, unread notification.
    async fn create(&self, new: NewNotification) -> Result<Notification>;

    /// A user's notifications, newest first, at most [`MAX_LISTED`].
    async fn find_by_user(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>>;

    /// Mark one notification read. Returns `false` if it does not exist.
    async fn mark_read(&self, id: Uuid) -> Result<bool>;

    /// Mark all of a user's unread notifications read. Returns how many changed.
    async fn mark_all_read(&self, user_id: &str) -> Result<u64>;
}

/// Newest first, then truncate to [`MAX_LISTED`].
pub(crate) fn newest_first(mut notifications: Vec<Notification>) -> Vec<Notification> {
    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    notifications.truncate(MAX_LISTED);
    notifications
}

/// Process-local store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryNotificationStore {
    notifications: DashMap<Uuid, Notification>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored notifications.
    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn create(&self, new: NewNotification) -> Result<Notification> {
        let notification = new.into_notification();
        self.notifications
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn find_by_user(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
        let matching = self
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.read))
            .map(|n| n.value().clone())
            .collect();
        Ok(newest_first(matching))
    }

    async fn mark_read(&self, id: Uuid) -> Result<bool> {
        match self.notifications.get_mut(&id) {
            Some(mut notification) => {
                notification.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<u64> {
        let mut updated = 0;
        for mut notification in self.notifications.iter_mut() {
            if notification.user_id == user_id && !notification.read {
                notification.read = true;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::NotificationKind;
    use std::time::Duration;

    fn new_for(user_id: &str, message: &str) -> NewNotification {
        NewNotification {
            user_id: user_id.to_string(),
            kind: NotificationKind::TaskUpdated,
            message: message.to_string(),
            task_id: Some("t1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_starts_unread() {
        let store = InMemoryNotificationStore::new();
        let created = store.create(new_for("u1", "first")).await.unwrap();

        assert!(!created.read);
        assert_eq!(created.user_id, "u1");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_find_by_user_newest_first() {
        let store = InMemoryNotificationStore::new();
        store.create(new_for("u1", "first")).await.unwrap();
        std::thread::sleep(Duration::from_millis(2));
        store.create(new_for("u2", "other user")).await.unwrap();
        std::thread::sleep(Duration::from_millis(2));
        store.create(new_for("u1", "second")).await.unwrap();

        let listed = store.find_by_user("u1", false).await.unwrap();
        let messages: Vec<&str> = listed.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_find_by_user_limit() {
        let store = InMemoryNotificationStore::new();
        for i in 0..(MAX_LISTED + 5) {
            store.create(new_for("u1", &format!("n{}", i))).await.unwrap();
        }
        assert_eq!(store.find_by_user("u1", false).await.unwrap().len(), MAX_LISTED);
    }

    #[tokio::test]
    async fn test_mark_read_and_unread_filter() {
        let store = InMemoryNotificationStore::new();
        let a = store.create(new_for("u1", "a")).await.unwrap();
        store.create(new_for("u1", "b")).await.unwrap();

        assert!(store.mark_read(a.id).await.unwrap());
        assert!(!store.mark_read(Uuid::new_v4()).await.unwrap());

        let unread = store.find_by_user("u1", true).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].message, "b");
        assert_eq!(store.find_by_user("u1", false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_mark_all_read() {
        let store = InMemoryNotificationStore::new();
        let a = store.create(new_for("u1", "a")).await.unwrap();
        store.create(new_for("u1", "b")).await.unwrap();
        store.create(new_for("u2", "c")).await.unwrap();
        store.mark_read(a.id).await.unwrap();

        assert_eq!(store.mark_all_read("u1").await.unwrap(), 1);
        assert!(store.find_by_user("u1", true).await.unwrap().is_empty());
        assert_eq!(store.find_by_user("u2", true).await.unwrap().len(), 1);
    }
}
