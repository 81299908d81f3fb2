//! Publish a task event to the events queue.
//!
//! Usage: `publish_event '<event json>'`, or pipe the JSON on stdin.
//! Reads `NATS_URL` and `EVENTS_QUEUE` like the service does.

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use common::DomainEvent;
use nats_client::{NatsClient, QueueConfig};
use notifications_service::ServiceConfig;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let payload = match std::env::args().nth(1) {
        Some(arg) => arg,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };
    let payload = payload.trim();
    if payload.is_empty() {
        bail!("usage: publish_event '<event json>'");
    }

    let event = DomainEvent::from_slice(payload.as_bytes()).context("invalid event")?;
    if let DomainEvent::Unknown(event_type) = &event {
        warn!("Event type '{}' will be ignored by the notifications service", event_type);
    }

    let config = ServiceConfig::from_env()?;
    let nats_client = NatsClient::connect(&config.nats_url).await?;
    let queue = QueueConfig::for_queue(&config.events_queue, &config.events_consumer);
    nats_client.ensure_queue(&queue).await?;

    nats_client
        .publish(config.events_queue.clone(), Bytes::copy_from_slice(payload.as_bytes()))
        .await?;

    info!(
        "Published {} event to '{}'",
        event.event_type(),
        config.events_queue
    );
    Ok(())
}
