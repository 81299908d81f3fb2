//! Notifications service configuration from environment variables.

use crate::error::{NotificationError, Result};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HTTP_PORT: u16 = 3004;
pub const DEFAULT_METRICS_PORT: u16 = 9094;
pub const DEFAULT_ACK_WAIT_SECS: u64 = nats_client::DEFAULT_ACK_WAIT_SECS;

/// Which [`NotificationStore`](crate::store::NotificationStore) backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

impl FromStr for StoreBackend {
    type Err = NotificationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(NotificationError::Config(format!(
                "STORE_BACKEND must be 'memory' or 'redis', got '{}'",
                other
            ))),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub http_port: u16,
    pub metrics_port: u16,
    pub nats_url: String,
    pub events_queue: String,
    pub events_consumer: String,
    /// Redelivery timeout for unacknowledged queue messages.
    pub ack_wait: Duration,
    pub store_backend: StoreBackend,
    pub redis_url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
            nats_url: "nats://localhost:4222".to_string(),
            events_queue: "tasks_events".to_string(),
            events_consumer: "notifications".to_string(),
            ack_wait: Duration::from_secs(DEFAULT_ACK_WAIT_SECS),
            store_backend: StoreBackend::Memory,
            redis_url: "redis://localhost:6379".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            http_port: parse_port("HTTP_PORT", &lookup, defaults.http_port)?,
            metrics_port: parse_port("METRICS_PORT", &lookup, defaults.metrics_port)?,
            nats_url: lookup("NATS_URL").unwrap_or(defaults.nats_url),
            events_queue: non_empty("EVENTS_QUEUE", &lookup, defaults.events_queue)?,
            events_consumer: non_empty("EVENTS_CONSUMER", &lookup, defaults.events_consumer)?,
            ack_wait: match lookup("EVENTS_ACK_WAIT_SECS") {
                Some(value) => Duration::from_secs(parse_ack_wait(&value)?),
                None => defaults.ack_wait,
            },
            store_backend: match lookup("STORE_BACKEND") {
                Some(value) => value.parse()?,
                None => defaults.store_backend,
            },
            redis_url: lookup("REDIS_URL").unwrap_or(defaults.redis_url),
        })
    }
}

fn parse_port(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: u16) -> Result<u16> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| NotificationError::Config(format!("{} must be a port, got '{}'", key, value))),
        None => Ok(default),
    }
}

fn parse_ack_wait(value: &str) -> Result<u64> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(NotificationError::Config(format!(
            "EVENTS_ACK_WAIT_SECS must be a positive number of seconds, got '{}'",
            value
        ))),
    }
}

fn non_empty(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: String) -> Result<String> {
    match lookup(key) {
        Some(value) if value.trim().is_empty() => {
            Err(NotificationError::Config(format!("{} must not be empty", key)))
        }
        Some(value) => Ok(value.trim().to_string()),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ServiceConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.http_port, 3004);
        assert_eq!(config.metrics_port, 9094);
        assert_eq!(config.events_queue, "tasks_events");
        assert_eq!(config.events_consumer, "notifications");
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.ack_wait, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("HTTP_PORT", "8080"),
            ("NATS_URL", "nats://nats:4222"),
            ("EVENTS_QUEUE", "events"),
            ("EVENTS_ACK_WAIT_SECS", "5"),
            ("STORE_BACKEND", "Redis"),
            ("REDIS_URL", "redis://cache:6379"),
        ])
        .unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.nats_url, "nats://nats:4222");
        assert_eq!(config.events_queue, "events");
        assert_eq!(config.ack_wait, Duration::from_secs(5));
        assert_eq!(config.store_backend, StoreBackend::Redis);
        assert_eq!(config.redis_url, "redis://cache:6379");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(config_from(&[("HTTP_PORT", "http")]).is_err());
        assert!(config_from(&[("METRICS_PORT", "70000")]).is_err());
        assert!(config_from(&[("STORE_BACKEND", "postgres")]).is_err());
        assert!(config_from(&[("EVENTS_CONSUMER", " ")]).is_err());
        assert!(config_from(&[("EVENTS_ACK_WAIT_SECS", "0")]).is_err());
        assert!(config_from(&[("EVENTS_ACK_WAIT_SECS", "soon")]).is_err());
    }
}
