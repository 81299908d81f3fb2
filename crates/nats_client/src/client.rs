//! NATS client implementation with JetStream support.
//!
//! Queues are JetStream streams with work-queue retention: a message is
//! removed once a consumer acknowledges it, and every instance bound to the
//! same durable consumer receives a disjoint share of the messages.

use anyhow::Result;
use async_nats::jetstream::{self, consumer::pull, consumer::AckPolicy, consumer::PullConsumer};
use async_nats::Client;
use std::time::Duration;
use tracing::info;

/// Default max messages per queue stream.
pub const DEFAULT_MAX_MESSAGES: i64 = 1_000_000;

/// Default max bytes per queue stream (1GB).
pub const DEFAULT_MAX_BYTES: i64 = 1_073_741_824;

/// Default time the server waits for an ack before redelivering.
pub const DEFAULT_ACK_WAIT_SECS: u64 = 30;

/// Configuration for a durable work queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Stream name.
    pub stream: String,
    /// Subjects captured by the stream.
    pub subjects: Vec<String>,
    /// Durable consumer name shared by all workers.
    pub consumer: String,
    /// Redelivery timeout for unacknowledged messages.
    pub ack_wait: Duration,
    /// Maximum number of messages.
    pub max_messages: i64,
    /// Maximum bytes.
    pub max_bytes: i64,
}

impl QueueConfig {
    /// Create a queue config.
    ///
    /// Creates stream named `{QUEUE}` capturing the subject `{queue}`, consumed
    /// through the durable consumer `consumer`.
    pub fn for_queue(queue: &str, consumer: &str) -> Self {
        Self {
            stream: queue.to_uppercase(),
            subjects: vec![queue.to_string()],
            consumer: consumer.to_string(),
            ack_wait: Duration::from_secs(DEFAULT_ACK_WAIT_SECS),
            max_messages: DEFAULT_MAX_MESSAGES,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }

    /// Set the redelivery timeout.
    pub fn with_ack_wait(mut self, ack_wait: Duration) -> Self {
        self.ack_wait = ack_wait;
        self
    }
}

/// Wrapper around the NATS client with JetStream context.
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
    jetstream: jetstream::Context,
}

impl std::fmt::Debug for NatsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsClient")
            .field("state", &self.client.connection_state())
            .finish()
    }
}

impl NatsClient {
    /// Connect to a NATS server and create a JetStream context.
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", url);
        let client = async_nats::connect(url).await?;
        let jetstream = jetstream::new(client.clone());

        Ok(Self { client, jetstream })
    }

    /// Create or get the queue's work-queue stream.
    pub async fn ensure_queue(&self, config: &QueueConfig) -> Result<jetstream::stream::Stream> {
        info!(
            "Ensuring queue stream '{}' exists (subjects: {:?})",
            config.stream, config.subjects
        );

        let stream = self
            .jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: config.stream.clone(),
                subjects: config.subjects.clone(),
                retention: jetstream::stream::RetentionPolicy::WorkQueue,
                max_messages: config.max_messages,
                max_bytes: config.max_bytes,
                storage: jetstream::stream::StorageType::File,
                ..Default::default()
            })
            .await?;
        Ok(stream)
    }

    /// Create or get the queue's stream, then create or get its durable
    /// pull consumer with explicit acknowledgement.
    pub async fn durable_consumer(&self, config: &QueueConfig) -> Result<PullConsumer> {
        let stream = self.ensure_queue(config).await?;

        let consumer = stream
            .get_or_create_consumer(
                &config.consumer,
                pull::Config {
                    durable_name: Some(config.consumer.clone()),
                    ack_policy: AckPolicy::Explicit,
                    ack_wait: config.ack_wait,
                    ..Default::default()
                },
            )
            .await?;

        info!(
            "Durable consumer '{}' bound to stream '{}'",
            config.consumer, config.stream
        );
        Ok(consumer)
    }

    /// Publish a message to JetStream (with acknowledgment).
    pub async fn publish(&self, subject: impl Into<String>, payload: bytes::Bytes) -> Result<()> {
        self.jetstream
            .publish(subject.into(), payload)
            .await?
            .await?;
        Ok(())
    }
}
