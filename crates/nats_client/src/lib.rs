//! NATS JetStream client shared by the platform services.

pub mod client;

pub use client::{NatsClient, QueueConfig, DEFAULT_ACK_WAIT_SECS, DEFAULT_MAX_BYTES, DEFAULT_MAX_MESSAGES};
