//! Gateway error types.

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Gateway error type.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No registered prefix matches the request path.
    #[error("Cannot {method} {path}")]
    NoRoute { method: Method, path: String },

    /// Upstream did not answer within the configured timeout.
    #[error("Upstream timed out: {url}")]
    UpstreamTimeout { url: String },

    /// Upstream refused the connection or the transport failed mid-request.
    #[error("Upstream unavailable: {url}: {source}")]
    UpstreamUnavailable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Upstream response body exceeded the configured limit.
    #[error("Upstream response too large: {url}")]
    UpstreamResponseTooLarge { url: String },

    /// Inbound body exceeded the configured limit.
    #[error("Request body too large")]
    PayloadTooLarge,

    /// Inbound body could not be read.
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// Route table entry could not be parsed.
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    /// Configuration value could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// HTTP client construction error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// JSON body returned to clients for gateway-originated errors.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub status: u16,
}

impl GatewayError {
    /// Status code returned to the client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NoRoute { .. } => StatusCode::NOT_FOUND,
            GatewayError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::UpstreamUnavailable { .. }
            | GatewayError::UpstreamResponseTooLarge { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            GatewayError::InvalidRoute(_) | GatewayError::Config(_) | GatewayError::Http(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to clients. Upstream addresses never leak.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::NoRoute { .. } | GatewayError::PayloadTooLarge => self.to_string(),
            GatewayError::UpstreamTimeout { .. } => "Upstream service timed out".to_string(),
            GatewayError::UpstreamUnavailable { .. } => "Upstream service unavailable".to_string(),
            GatewayError::UpstreamResponseTooLarge { .. } => {
                "Upstream response too large".to_string()
            }
            GatewayError::InvalidBody(_) => "Invalid request body".to_string(),
            GatewayError::InvalidRoute(_) | GatewayError::Config(_) | GatewayError::Http(_) => {
                "Internal Server Error".to_string()
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            message: self.public_message(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_route_message() {
        let err = GatewayError::NoRoute {
            method: Method::DELETE,
            path: "/api/unknown".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.public_message(), "Cannot DELETE /api/unknown");
    }

    #[test]
    fn test_timeout_hides_upstream() {
        let err = GatewayError::UpstreamTimeout {
            url: "http://tasks-service:3003/api/tasks".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert!(!err.public_message().contains("tasks-service"));
    }
}
