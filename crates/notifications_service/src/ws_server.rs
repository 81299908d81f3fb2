//! WebSocket server handler using Axum.

use crate::client::{ClientRegistry, ClientState, CLIENT_CHANNEL_BUFFER_SIZE};
use crate::error::Result;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::SocketRegistry;
use crate::store::NotificationStore;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::interval;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Interval between server-sent WebSocket pings.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// A connection silent for this long (three missed pongs) is closed.
const STALE_AFTER_MS: i64 = 3 * PING_INTERVAL.as_millis() as i64;

/// Shared application state.
pub struct AppState {
    pub clients: Arc<ClientRegistry>,
    pub sockets: Arc<SocketRegistry>,
    pub store: Arc<dyn NotificationStore>,
}

impl AppState {
    /// State with empty connection tables over the given store.
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self {
            clients: Arc::new(ClientRegistry::new()),
            sockets: Arc::new(SocketRegistry::new()),
            store,
        }
    }
}

/// Create the service router: WebSocket endpoint, health and REST API.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .merge(crate::api::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    connections: usize,
    users: usize,
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        connections: state.clients.client_count(),
        users: state.sockets.user_count(),
    })
}

#[derive(Debug, Deserialize)]
struct ConnectParams {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let user_id = params.user_id.filter(|id| !id.is_empty());
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: Option<String>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Bounded so a stalled reader turns pushes into failures instead of memory growth
    let (tx, mut rx) = mpsc::channel::<Message>(CLIENT_CHANNEL_BUFFER_SIZE);

    let client = Arc::new(ClientState::new(user_id.clone(), tx));
    let connection_id = state.clients.register(client.clone());

    match &user_id {
        Some(user_id) => {
            if let Some(previous) = state.sockets.on_connect(user_id, connection_id) {
                debug!(
                    "User {} moved from connection {} to {}",
                    user_id, previous, connection_id
                );
            }
        }
        None => debug!("Connection {} has no userId, pushes disabled", connection_id),
    }

    counter!("notifications_connections_total").increment(1);
    gauge!("notifications_active_connections").set(state.clients.client_count() as f64);

    info!("Client {} connected (user: {:?})", connection_id, user_id);

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut ping_interval = interval(PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(msg)) => {
                        client.update_ping();
                        if let Err(e) = handle_message(&state, &client, msg).await {
                            warn!("Error handling message from {}: {}", connection_id, e);
                            let reply = client.send(&ServerMessage::Error {
                                message: e.to_string(),
                                code: "PROCESSING_ERROR".to_string(),
                            });
                            if let Err(e) = reply {
                                debug!("Error reply to {} failed: {}", connection_id, e);
                            }
                        }
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", connection_id, e);
                        break;
                    }
                }
            }

            _ = ping_interval.tick() => {
                if client.is_stale(Utc::now().timestamp_millis(), STALE_AFTER_MS) {
                    warn!("Client {} stopped responding, closing", connection_id);
                    break;
                }
                match client.tx.try_send(Message::Ping(Default::default())) {
                    Ok(()) | Err(TrySendError::Full(_)) => {}
                    Err(TrySendError::Closed(_)) => break,
                }
            }
        }
    }

    state.clients.unregister(&connection_id);
    state.sockets.on_disconnect(connection_id);
    send_task.abort();

    gauge!("notifications_active_connections").set(state.clients.client_count() as f64);

    info!(
        "Client {} disconnected after {}ms",
        connection_id,
        client.connected_for_ms(Utc::now().timestamp_millis())
    );
}

/// Handle a single WebSocket frame.
async fn handle_message(
    state: &Arc<AppState>,
    client: &Arc<ClientState>,
    msg: Message,
) -> Result<()> {
    match msg {
        Message::Text(text) => {
            let client_msg: ClientMessage = serde_json::from_str(text.as_str())?;
            handle_client_message(state, client, client_msg).await
        }
        Message::Binary(data) => {
            let client_msg: ClientMessage = serde_json::from_slice(&data)?;
            handle_client_message(state, client, client_msg).await
        }
        // Liveness is recorded by the caller for every frame
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) => Ok(()),
    }
}

/// Handle a parsed client message.
async fn handle_client_message(
    state: &Arc<AppState>,
    client: &Arc<ClientState>,
    msg: ClientMessage,
) -> Result<()> {
    match msg {
        ClientMessage::MarkRead { notification_id } => {
            let found = match Uuid::parse_str(&notification_id) {
                Ok(id) => state.store.mark_read(id).await?,
                Err(_) => false,
            };

            if found {
                debug!("Client {} marked {} read", client.id, notification_id);
                client.send(&ServerMessage::NotificationRead { notification_id })
            } else {
                client.send(&ServerMessage::Error {
                    message: format!("Notification {} not found", notification_id),
                    code: "NOT_FOUND".to_string(),
                })
            }
        }
        ClientMessage::Ping => client.send(&ServerMessage::pong()),
    }
}
