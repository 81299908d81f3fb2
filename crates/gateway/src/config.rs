//! Gateway configuration from environment variables.

use crate::error::{GatewayError, Result};
use crate::forwarder::DEFAULT_UPSTREAM_TIMEOUT;
use crate::routes::{parse_routes, Route};
use std::time::Duration;

pub const DEFAULT_HTTP_PORT: u16 = 3001;
pub const DEFAULT_METRICS_PORT: u16 = 9093;
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub const AUTH_PREFIX: &str = "/api/auth";
pub const TASKS_PREFIX: &str = "/api/tasks";
pub const NOTIFICATIONS_PREFIX: &str = "/api/notifications";

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub http_port: u16,
    pub metrics_port: u16,
    pub routes: Vec<Route>,
    pub upstream_timeout: Duration,
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
            routes: vec![
                Route {
                    prefix: AUTH_PREFIX.to_string(),
                    upstream: "http://auth-service:3002".to_string(),
                },
                Route {
                    prefix: TASKS_PREFIX.to_string(),
                    upstream: "http://tasks-service:3003".to_string(),
                },
            ],
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl GatewayConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults.
    ///
    /// `GATEWAY_ROUTES` replaces the whole route table. Otherwise the auth and
    /// tasks routes are taken from `AUTH_SERVICE_URL` / `TASKS_SERVICE_URL`,
    /// and a notifications route is added when `NOTIFICATIONS_SERVICE_URL` is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let routes = match lookup("GATEWAY_ROUTES") {
            Some(table) => parse_routes(&table)?,
            None => {
                let mut routes = vec![
                    Route::new(
                        AUTH_PREFIX,
                        &lookup("AUTH_SERVICE_URL")
                            .unwrap_or_else(|| "http://auth-service:3002".to_string()),
                    )?,
                    Route::new(
                        TASKS_PREFIX,
                        &lookup("TASKS_SERVICE_URL")
                            .unwrap_or_else(|| "http://tasks-service:3003".to_string()),
                    )?,
                ];
                if let Some(url) = lookup("NOTIFICATIONS_SERVICE_URL") {
                    routes.push(Route::new(NOTIFICATIONS_PREFIX, &url)?);
                }
                routes
            }
        };

        let upstream_timeout = match lookup("UPSTREAM_TIMEOUT_MS") {
            Some(ms) => Duration::from_millis(parse_var("UPSTREAM_TIMEOUT_MS", &ms)?),
            None => defaults.upstream_timeout,
        };

        Ok(Self {
            http_port: parse_or("HTTP_PORT", &lookup, defaults.http_port)?,
            metrics_port: parse_or("METRICS_PORT", &lookup, defaults.metrics_port)?,
            routes,
            upstream_timeout,
            max_body_bytes: parse_or("MAX_BODY_BYTES", &lookup, defaults.max_body_bytes)?,
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| GatewayError::Config(format!("{} must be a number, got '{}'", key, value)))
}

fn parse_or<T: std::str::FromStr>(
    key: &str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: T,
) -> Result<T> {
    match lookup(key) {
        Some(value) => parse_var(key, &value),
        None => Ok(default),
    }
}
