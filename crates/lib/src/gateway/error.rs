//! Request-level failures and their HTTP mapping.

use crate::gateway::relay::BatchFailure;
use crate::llm::LlmError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Missing or wrong bearer key on the direct-call route.
    #[error("unauthorized")]
    Unauthorized,
    /// Missing or invalid webhook signature.
    #[error("webhook signature validation failed")]
    BadSignature,
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Route exists but its capability is not configured.
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Upstream(#[from] LlmError),
    #[error(transparent)]
    BatchFailed(#[from] BatchFailure),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::BadSignature => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::BatchFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Status only; details go to the log, never to the caller.
impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match &self {
            Self::Upstream(e) => log::warn!("direct call failed: {}", e),
            Self::BatchFailed(e) => log::error!("webhook batch failed: {}", e),
            Self::BadRequest(msg) => log::debug!("bad request: {}", msg),
            _ => {}
        }
        self.status().into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(RelayError::Unauthorized.status(), StatusCode::FORBIDDEN);
        assert_eq!(RelayError::BadSignature.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            RelayError::BadRequest("x".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(RelayError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            RelayError::from(LlmError::NoChoices).status(),
            StatusCode::BAD_GATEWAY
        );
        let batch = BatchFailure {
            failed: 1,
            total: 3,
            first_error: "boom".to_string(),
        };
        assert_eq!(
            RelayError::from(batch).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
