//! Notifications service entry point.
//!
//! Relays task events from the queue to WebSocket clients and serves the
//! stored notifications over REST.

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use nats_client::{NatsClient, QueueConfig};
use notifications_service::{
    create_router, supervise, AppState, EventDispatcher, InMemoryNotificationStore, NotificationStore,
    RedisNotificationStore, ServiceConfig, StoreBackend,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting notifications service");

    let config = ServiceConfig::from_env()?;

    info!("Configuration:");
    info!("  HTTP_PORT: {}", config.http_port);
    info!("  METRICS_PORT: {}", config.metrics_port);
    info!("  NATS_URL: {}", config.nats_url);
    info!("  EVENTS_QUEUE: {}", config.events_queue);
    info!("  EVENTS_CONSUMER: {}", config.events_consumer);
    info!("  EVENTS_ACK_WAIT_SECS: {}", config.ack_wait.as_secs());
    info!("  STORE_BACKEND: {:?}", config.store_backend);

    // Start Prometheus metrics server
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.metrics_port))
        .install()?;
    info!("Prometheus metrics server started on port {}", config.metrics_port);

    let store: Arc<dyn NotificationStore> = match config.store_backend {
        StoreBackend::Memory => {
            warn!("Using in-memory notification store; notifications are lost on restart");
            Arc::new(InMemoryNotificationStore::new())
        }
        StoreBackend::Redis => {
            info!("Using Redis notification store at {}", config.redis_url);
            Arc::new(RedisNotificationStore::new(&config.redis_url)?)
        }
    };

    // Connect to NATS and bind the durable consumer
    let nats_client = NatsClient::connect(&config.nats_url).await?;
    info!("Connected to NATS");
    let queue = QueueConfig::for_queue(&config.events_queue, &config.events_consumer)
        .with_ack_wait(config.ack_wait);
    let consumer = nats_client.durable_consumer(&queue).await?;

    let state = Arc::new(AppState::new(store.clone()));

    let dispatcher = Arc::new(EventDispatcher::new(
        store,
        state.sockets.clone(),
        state.clients.clone(),
    ));

    // Create shutdown channel for dispatcher
    let (dispatcher_shutdown_tx, dispatcher_shutdown_rx) = mpsc::channel(1);

    let dispatcher_handle =
        tokio::spawn(async move { dispatcher.run(consumer, dispatcher_shutdown_rx).await });

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr).await?;
    info!("Notifications service listening on {}", addr);

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();
    supervise(server, dispatcher_handle, dispatcher_shutdown_tx).await?;

    info!("Notifications service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received terminate signal"),
    }
}
