//! API gateway for the task platform.
//!
//! Forwards client requests to backend services by URL prefix:
//!
//! ```text
//! client → /api/auth/*  → auth service
//!        → /api/tasks/* → tasks service
//! ```
//!
//! The gateway is transparent to payloads. It removes connection-scoped
//! headers, adds `x-user-id` decoded from the bearer token, and relays the
//! upstream response unchanged. Upstream calls are bounded by a timeout.

pub mod config;
pub mod error;
pub mod forwarder;
pub mod identity;
pub mod routes;
pub mod server;

pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use forwarder::{Forwarder, UpstreamResponse};
pub use routes::{Route, RouteRegistry};
pub use server::{create_router, AppState};
