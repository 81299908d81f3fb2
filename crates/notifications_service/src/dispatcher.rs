//! Event dispatcher: durable queue → notification store → WebSocket push.
//!
//! Each queue message is handled to completion before the next one is pulled.
//! A message is acknowledged once its notification is stored (or once it is
//! known to produce no notification); anything else is negatively
//! acknowledged so the broker redelivers it.

use crate::client::ClientRegistry;
use crate::error::Result;
use crate::protocol::ServerMessage;
use crate::registry::SocketRegistry;
use crate::store::NotificationStore;
use async_nats::jetstream::consumer::PullConsumer;
use async_nats::jetstream::AckKind;
use common::{DomainEvent, Notification};
use futures::StreamExt;
use metrics::counter;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What to tell the broker about a processed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    Nak,
}

/// Result of handling one well-formed event.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Event type this service does not handle.
    Ignored(String),
    /// Notification stored; `pushed` tells whether it reached a live socket.
    Stored {
        notification: Notification,
        pushed: bool,
    },
}

/// Turns queue events into stored notifications and targeted pushes.
pub struct EventDispatcher {
    store: Arc<dyn NotificationStore>,
    sockets: Arc<SocketRegistry>,
    clients: Arc<ClientRegistry>,
}

impl EventDispatcher {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        sockets: Arc<SocketRegistry>,
        clients: Arc<ClientRegistry>,
    ) -> Self {
        Self {
            store,
            sockets,
            clients,
        }
    }

    /// Consume the queue until shutdown.
    ///
    /// Returns an error if the consumer cannot be read or its message stream
    /// ends on its own; the caller treats either as fatal.
    pub async fn run(
        self: Arc<Self>,
        consumer: PullConsumer,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) -> anyhow::Result<()> {
        let mut messages = consumer.messages().await?;
        info!("EventDispatcher running");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("EventDispatcher received shutdown signal");
                    break;
                }

                msg = messages.next() => {
                    match msg {
                        Some(Ok(msg)) => {
                            let ack = match self.process(&msg.payload).await {
                                Disposition::Ack => msg.ack().await,
                                Disposition::Nak => msg.ack_with(AckKind::Nak(None)).await,
                            };
                            if let Err(e) = ack {
                                warn!("Failed to acknowledge message: {}", e);
                            }
                        }
                        Some(Err(e)) => {
                            warn!("Queue consumer error: {}", e);
                        }
                        None => {
                            anyhow::bail!("queue message stream ended unexpectedly");
                        }
                    }
                }
            }
        }

        info!("EventDispatcher stopped");
        Ok(())
    }

    /// Handle one raw queue payload and decide how to acknowledge it.
    ///
    /// Malformed payloads and store failures are nak'd and will be redelivered
    /// indefinitely; there is no dead-letter path. A redelivered event that was
    /// already stored produces a duplicate notification.
    pub async fn process(&self, payload: &[u8]) -> Disposition {
        let event = match DomainEvent::from_slice(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!("Malformed event: {}", e);
                counter!("notifications_events_total", "type" => "malformed").increment(1);
                counter!("notifications_nak_total").increment(1);
                return Disposition::Nak;
            }
        };

        counter!("notifications_events_total", "type" => event_label(&event)).increment(1);

        match self.handle_event(&event).await {
            Ok(Outcome::Ignored(event_type)) => {
                debug!("Ignoring event of type {}", event_type);
                Disposition::Ack
            }
            Ok(Outcome::Stored {
                notification,
                pushed,
            }) => {
                debug!(
                    "Handled {} for user {} (notification {}, pushed: {})",
                    event.event_type(),
                    notification.user_id,
                    notification.id,
                    pushed
                );
                Disposition::Ack
            }
            Err(e) => {
                warn!("Failed to handle {} event: {}", event.event_type(), e);
                counter!("notifications_nak_total").increment(1);
                Disposition::Nak
            }
        }
    }

    /// Store the event's notification, then push it to the owner if connected.
    pub async fn handle_event(&self, event: &DomainEvent) -> Result<Outcome> {
        let Some(new) = event.to_notification() else {
            return Ok(Outcome::Ignored(event.event_type().to_string()));
        };

        let notification = self.store.create(new).await?;
        counter!("notifications_created_total").increment(1);

        let pushed = self.push(&notification);
        Ok(Outcome::Stored {
            notification,
            pushed,
        })
    }

    /// Best-effort push to the owner's current connection.
    pub fn push(&self, notification: &Notification) -> bool {
        let Some(connection_id) = self.sockets.resolve(&notification.user_id) else {
            debug!("User {} not connected", notification.user_id);
            return false;
        };
        let Some(client) = self.clients.get(&connection_id) else {
            debug!("Connection {} already closed", connection_id);
            return false;
        };

        match client.send(&ServerMessage::notification(notification.clone())) {
            Ok(()) => {
                counter!("notifications_pushed_total").increment(1);
                true
            }
            Err(e) => {
                debug!("Push to connection {} failed: {}", connection_id, e);
                counter!("notifications_push_failures_total").increment(1);
                false
            }
        }
    }
}

/// Bounded label set for the events counter.
fn event_label(event: &DomainEvent) -> &'static str {
    match event {
        DomainEvent::TaskCreated(_) => DomainEvent::TASK_CREATED,
        DomainEvent::TaskUpdated(_) => DomainEvent::TASK_UPDATED,
        DomainEvent::TaskAssigned(_) => DomainEvent::TASK_ASSIGNED,
        DomainEvent::CommentCreated(_) => DomainEvent::COMMENT_CREATED,
        DomainEvent::Unknown(_) => "unknown",
    }
}
