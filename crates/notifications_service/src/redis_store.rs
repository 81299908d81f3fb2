//! Redis-backed notification store.
//!
//! Layout:
//! - `notification:{id}` → notification JSON
//! - `notifications:user:{user_id}` → sorted set of ids scored by creation time (ms)

use crate::error::Result;
use crate::store::{newest_first, NotificationStore, MAX_LISTED};
use async_trait::async_trait;
use common::{NewNotification, Notification};
use redis::AsyncCommands;
use tracing::{debug, info};
use uuid::Uuid;

/// Redis key prefix for notification records: notification:{id}
const NOTIFICATION_KEY_PREFIX: &str = "notification:";

/// Redis key prefix for per-user indexes: notifications:user:{user_id}
const USER_INDEX_KEY_PREFIX: &str = "notifications:user:";

fn notification_key(id: &str) -> String {
    format!("{}{}", NOTIFICATION_KEY_PREFIX, id)
}

fn user_index_key(user_id: &str) -> String {
    format!("{}{}", USER_INDEX_KEY_PREFIX, user_id)
}

/// `ZREVRANGE` stop index for the newest `limit` entries, or all of them.
fn index_stop(limit: Option<usize>) -> isize {
    limit.map_or(-1, |n| n as isize - 1)
}

/// Redis client wrapper for notification operations.
#[derive(Clone)]
pub struct RedisNotificationStore {
    client: redis::Client,
}

impl RedisNotificationStore {
    /// Create a new Redis store.
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// Get an async connection.
    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn)
    }

    /// Load a user's notifications in index order (newest first), at most
    /// `limit` of them.
    async fn load_user(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Notification>> {
        if limit == Some(0) {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = conn
            .zrevrange(user_index_key(user_id), 0, index_stop(limit))
            .await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for id in &ids {
            pipe.get(notification_key(id));
        }
        let values: Vec<Option<String>> = pipe.query_async(conn).await?;

        let mut notifications = Vec::with_capacity(values.len());
        for json in values.into_iter().flatten() {
            notifications.push(serde_json::from_str::<Notification>(&json)?);
        }
        Ok(notifications)
    }

    async fn save(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        notification: &Notification,
    ) -> Result<()> {
        let json = serde_json::to_string(notification)?;
        conn.set::<_, _, ()>(notification_key(&notification.id.to_string()), json)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for RedisNotificationStore {
    async fn create(&self, new: NewNotification) -> Result<Notification> {
        let mut conn = self.get_connection().await?;
        let notification = new.into_notification();
        let id = notification.id.to_string();
        let json = serde_json::to_string(&notification)?;

        let () = redis::pipe()
            .atomic()
            .set(notification_key(&id), json)
            .ignore()
            .zadd(
                user_index_key(&notification.user_id),
                &id,
                notification.created_at.timestamp_millis(),
            )
            .ignore()
            .query_async(&mut conn)
            .await?;

        debug!(
            "Stored notification {} for user {}",
            id, notification.user_id
        );
        Ok(notification)
    }

    async fn find_by_user(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
        let mut conn = self.get_connection().await?;
        // Only the unfiltered listing can stop at the newest MAX_LISTED ids
        let limit = (!unread_only).then_some(MAX_LISTED);
        let notifications = self
            .load_user(&mut conn, user_id, limit)
            .await?
            .into_iter()
            .filter(|n| !unread_only || !n.read)
            .collect();
        Ok(newest_first(notifications))
    }

    async fn mark_read(&self, id: Uuid) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let json: Option<String> = conn.get(notification_key(&id.to_string())).await?;

        let Some(json) = json else {
            return Ok(false);
        };
        let mut notification: Notification = serde_json::from_str(&json)?;
        if !notification.read {
            notification.read = true;
            self.save(&mut conn, &notification).await?;
        }
        Ok(true)
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<u64> {
        let mut conn = self.get_connection().await?;
        let mut updated = 0;
        for mut notification in self.load_user(&mut conn, user_id, None).await? {
            if !notification.read {
                notification.read = true;
                self.save(&mut conn, &notification).await?;
                updated += 1;
            }
        }
        info!("Marked {} notifications read for user {}", updated, user_id);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(notification_key("abc"), "notification:abc");
        assert_eq!(user_index_key("u1"), "notifications:user:u1");
    }

    #[test]
    fn test_index_stop() {
        assert_eq!(index_stop(None), -1);
        assert_eq!(index_stop(Some(MAX_LISTED)), 49);
        assert_eq!(index_stop(Some(1)), 0);
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(RedisNotificationStore::new("not-a-redis-url").is_err());
    }
}
