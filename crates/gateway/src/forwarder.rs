//! Request forwarder: relays inbound requests to the resolved upstream.
//!
//! For each request the forwarder:
//! - resolves the upstream by longest-prefix match
//! - keeps the full original path and query (the prefix is not stripped)
//! - drops connection-scoped headers (`host`, `content-length`, `connection`)
//! - injects `x-user-id` derived from the bearer token, when one can be decoded
//! - relays the upstream status and body unchanged, including error statuses
//!
//! Transport failures and timeouts become [`GatewayError`]s; they are never retried.

use crate::error::{GatewayError, Result};
use crate::identity::{derive_user_id, USER_ID_HEADER};
use crate::routes::RouteRegistry;
use axum::body::Body;
use axum::http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use metrics::counter;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default bound on a single upstream call.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default cap on a buffered upstream response body (10 MiB).
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

/// Headers that describe the inbound connection and are never relayed.
pub const CONNECTION_HEADERS: [HeaderName; 3] = [HOST, CONTENT_LENGTH, CONNECTION];

/// Response received from an upstream service.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        if let Some(content_type) = self.content_type {
            response.headers_mut().insert(CONTENT_TYPE, content_type);
        }
        response
    }
}

/// Build the header set relayed upstream.
///
/// All headers except [`CONNECTION_HEADERS`] pass through unchanged. If a
/// user id can be derived from the bearer token it replaces any inbound
/// `x-user-id`; otherwise the inbound headers are left as they are.
pub fn outbound_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = inbound.clone();
    for name in &CONNECTION_HEADERS {
        headers.remove(name);
    }

    if let Some(user_id) = derive_user_id(inbound) {
        match HeaderValue::from_str(&user_id) {
            Ok(value) => {
                headers.insert(HeaderName::from_static(USER_ID_HEADER), value);
            }
            Err(_) => debug!("Derived user id is not a valid header value, skipping"),
        }
    }

    headers
}

/// Stateless HTTP forwarder over a shared route table.
#[derive(Debug, Clone)]
pub struct Forwarder {
    routes: Arc<RouteRegistry>,
    http_client: reqwest::Client,
    max_response_bytes: usize,
}

impl Forwarder {
    /// Create a forwarder whose upstream calls are bounded by `timeout`.
    pub fn new(routes: Arc<RouteRegistry>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            routes,
            http_client,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        })
    }

    /// Cap the upstream response body; larger responses become
    /// [`GatewayError::UpstreamResponseTooLarge`].
    pub fn with_max_response_bytes(mut self, max_response_bytes: usize) -> Self {
        self.max_response_bytes = max_response_bytes;
        self
    }

    /// The route table this forwarder resolves against.
    pub fn routes(&self) -> &RouteRegistry {
        &self.routes
    }

    /// Forward a request.
    ///
    /// `path_and_query` is the request target exactly as the client sent it.
    /// Returns [`GatewayError::NoRoute`] when no prefix matches.
    pub async fn forward(
        &self,
        method: Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<UpstreamResponse> {
        let path = path_and_query
            .split_once('?')
            .map_or(path_and_query, |(path, _)| path);

        let Some(route) = self.routes.resolve(path) else {
            counter!("gateway_unrouted_total").increment(1);
            return Err(GatewayError::NoRoute {
                method,
                path: path.to_string(),
            });
        };

        let url = route.target_url(path_and_query);
        counter!("gateway_requests_total", "upstream" => route.prefix.clone()).increment(1);
        debug!("Forwarding {} {}", method, url);

        let started = Instant::now();
        let mut response = self
            .http_client
            .request(method.clone(), &url)
            .headers(outbound_headers(headers))
            .body(body)
            .send()
            .await
            .map_err(|e| upstream_error(&url, e))?;

        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let body = self.read_body(&url, &mut response).await?;

        debug!(
            "{} {} -> {} in {}ms",
            method,
            url,
            status,
            started.elapsed().as_millis()
        );

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}

impl Forwarder {
    /// Buffer the upstream body, refusing anything over `max_response_bytes`.
    async fn read_body(&self, url: &str, response: &mut reqwest::Response) -> Result<Bytes> {
        let limit = self.max_response_bytes;
        if response
            .content_length()
            .is_some_and(|len| len > limit as u64)
        {
            return Err(response_too_large(url, limit));
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| upstream_error(url, e))? {
            if body.len() + chunk.len() > limit {
                return Err(response_too_large(url, limit));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }
}

fn response_too_large(url: &str, limit: usize) -> GatewayError {
    warn!("Upstream response from {} exceeds {} bytes", url, limit);
    counter!("gateway_upstream_errors_total", "kind" => "too_large").increment(1);
    GatewayError::UpstreamResponseTooLarge {
        url: url.to_string(),
    }
}

fn upstream_error(url: &str, error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        warn!("Upstream timed out: {}", url);
        counter!("gateway_upstream_errors_total", "kind" => "timeout").increment(1);
        GatewayError::UpstreamTimeout {
            url: url.to_string(),
        }
    } else {
        warn!("Upstream unavailable: {}: {}", url, error);
        counter!("gateway_upstream_errors_total", "kind" => "unavailable").increment(1);
        GatewayError::UpstreamUnavailable {
            url: url.to_string(),
            source: error,
        }
    }
}
