//! HTTP server: gateway-owned routes plus the forwarding fallback.

use crate::error::{GatewayError, Result};
use crate::forwarder::{Forwarder, UpstreamResponse};
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use http_body_util::LengthLimitError;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state.
pub struct AppState {
    pub forwarder: Forwarder,
    pub max_body_bytes: usize,
}

/// Create the gateway router.
///
/// `/health` is answered by the gateway itself; every other request goes
/// through the forwarder.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .fallback(proxy_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    routes: Vec<String>,
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        routes: state
            .forwarder
            .routes()
            .prefixes()
            .into_iter()
            .map(str::to_string)
            .collect(),
    })
}

/// Forward any request not handled above.
async fn proxy_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Result<UpstreamResponse> {
    let path_and_query = uri
        .path_and_query()
        .map_or_else(|| uri.path(), |pq| pq.as_str());

    let body = axum::body::to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|e| {
            let inner = e.into_inner();
            if inner.is::<LengthLimitError>() {
                GatewayError::PayloadTooLarge
            } else {
                GatewayError::InvalidBody(inner.to_string())
            }
        })?;

    state
        .forwarder
        .forward(method, path_and_query, &headers, body)
        .await
}
