//! Best-effort caller identity from the bearer token.
//!
//! The token payload is decoded without verifying the signature; upstream
//! services remain responsible for verification. Any decode failure yields
//! no identity rather than an error.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde_json::{Map, Value};

/// Header carrying the derived user id to upstream services.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Claims consulted for the user id, in precedence order.
const USER_ID_CLAIMS: [&str; 3] = ["sub", "id", "userId"];

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Decode the payload (middle) segment of a three-segment token.
pub fn decode_claims(token: &str) -> Option<Map<String, Value>> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .ok()?;

    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(claims) => Some(claims),
        _ => None,
    }
}

/// First of `sub`, `id`, `userId` present as a non-empty string or a number.
pub fn user_id_from_claims(claims: &Map<String, Value>) -> Option<String> {
    USER_ID_CLAIMS
        .iter()
        .filter_map(|claim| claims.get(*claim))
        .find_map(|value| match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Derive the caller's user id from request headers, if possible.
pub fn derive_user_id(headers: &HeaderMap) -> Option<String> {
    let token = bearer_token(headers)?;
    let claims = decode_claims(token)?;
    user_id_from_claims(&claims)
}
