use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Unified error type for the teambot-auth service.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    // ── Token Errors ────────────────────────────────────────────────────
    #[error("no credentials stored for team {0}")]
    MissingCredential(String),

    #[error("no refresh token on record for team {0}")]
    RefreshTokenAbsent(String),

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    // ── OAuth Flow Errors ───────────────────────────────────────────────
    #[error("authorization exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    // ── Delivery Errors ─────────────────────────────────────────────────
    #[error("message delivery failed: {0}")]
    SendFailed(String),

    // ── Internal ────────────────────────────────────────────────────────
    #[error("credential store error: {0}")]
    Store(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // Token-class and internal failures keep their underlying cause out
        // of the response body; the exchange error is actionable for the
        // installing user and is surfaced verbatim.
        let (status, code, message) = match &self {
            AuthError::MissingCredential(_) => (
                StatusCode::UNAUTHORIZED,
                "not_installed",
                "Invalid or expired token".to_string(),
            ),
            AuthError::RefreshTokenAbsent(_) => (
                StatusCode::UNAUTHORIZED,
                "refresh_token_absent",
                "Invalid or expired token".to_string(),
            ),
            AuthError::RefreshFailed(_) => (
                StatusCode::UNAUTHORIZED,
                "refresh_failed",
                "Invalid or expired token".to_string(),
            ),
            AuthError::ExchangeFailed(reason) => (
                StatusCode::BAD_REQUEST,
                "oauth_exchange_failed",
                format!("OAuth failed: {reason}"),
            ),
            AuthError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "bad_request", reason.clone())
            }
            AuthError::SendFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "send_failed",
                "Failed to send message".to_string(),
            ),
            AuthError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "Service unavailable".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!("{self}");
        } else {
            tracing::warn!("{self}");
        }

        let body = json!({
            "error": {
                "code": code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
