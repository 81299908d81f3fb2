//! REST endpoints for reading and acknowledging notifications.
//!
//! The caller is identified by the `x-user-id` header the gateway injects.

use crate::ws_server::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, patch},
    Router,
};
use common::Notification;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Notification routes, merged into the service router.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/notifications", get(list_handler))
        .route("/api/notifications/read-all", patch(mark_all_read_handler))
        .route("/api/notifications/{id}/read", patch(mark_read_handler))
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    #[serde(rename = "unreadOnly", default)]
    unread_only: bool,
}

#[derive(Serialize)]
struct MarkReadResponse {
    id: Uuid,
    read: bool,
}

#[derive(Serialize)]
struct MarkAllReadResponse {
    updated: u64,
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
    status: u16,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            message: message.into(),
            status: status.as_u16(),
        }),
    )
}

fn internal_error(e: impl std::fmt::Display) -> ApiError {
    error!("Notification store error: {}", e);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

/// The caller's user id, or 401.
fn caller(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "Missing user identity"))
}

// =============================================================================
// Handlers
// =============================================================================

/// List the caller's notifications, newest first.
async fn list_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let user_id = caller(&headers)?;
    let notifications = state
        .store
        .find_by_user(&user_id, query.unread_only)
        .await
        .map_err(internal_error)?;
    Ok(Json(notifications))
}

/// Mark a single notification read.
async fn mark_read_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let not_found = || api_error(StatusCode::NOT_FOUND, format!("Notification {} not found", id));

    let uuid = Uuid::parse_str(&id).map_err(|_| not_found())?;
    if !state.store.mark_read(uuid).await.map_err(internal_error)? {
        return Err(not_found());
    }

    debug!("Notification {} marked read", uuid);
    Ok(Json(MarkReadResponse {
        id: uuid,
        read: true,
    }))
}

/// Mark all of the caller's notifications read.
async fn mark_all_read_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<MarkAllReadResponse>, ApiError> {
    let user_id = caller(&headers)?;
    let updated = state
        .store
        .mark_all_read(&user_id)
        .await
        .map_err(internal_error)?;
    Ok(Json(MarkAllReadResponse { updated }))
}
