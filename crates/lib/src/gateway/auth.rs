//! Bearer key check for the direct-call route.

use crate::gateway::error::RelayError;
use crate::gateway::server::GatewayState;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;

/// Token segment of `Authorization: <scheme> <token>`. None when the header is absent, not valid
/// UTF-8, or has no second segment.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value.split_whitespace().nth(1)
}

/// Middleware: 403 unless the bearer token equals the configured call key. Never runs the handler
/// after a rejection. With no key configured every request is rejected.
pub async fn require_call_key(
    State(state): State<GatewayState>,
    req: Request,
    next: Next,
) -> Result<Response, RelayError> {
    let Some(expected) = state.call_key.as_deref() else {
        log::warn!("direct call rejected: no call key configured");
        return Err(RelayError::Unauthorized);
    };
    match bearer_token(req.headers()) {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => Ok(next.run(req).await),
        Some(_) => {
            log::warn!("direct call rejected: bearer token mismatch");
            Err(RelayError::Unauthorized)
        }
        None => {
            log::warn!("direct call rejected: missing authorization");
            Err(RelayError::Unauthorized)
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
