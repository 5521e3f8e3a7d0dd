use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

/// Why a token refresh did not produce a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshFailure {
    /// The session holds no refresh token.
    MissingRefreshToken,
    /// The token endpoint answered, but not with a usable token set.
    Rejected,
    /// The refresh request never got an answer (network, TLS, timeout).
    Transient,
}

impl RefreshFailure {
    /// Terminal failures invalidate the persisted session as well.
    pub fn is_terminal(self) -> bool {
        !matches!(self, RefreshFailure::Transient)
    }
}

impl std::fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RefreshFailure::MissingRefreshToken => "no refresh token available",
            RefreshFailure::Rejected => "rejected by token endpoint",
            RefreshFailure::Transient => "transient failure",
        };
        f.write_str(s)
    }
}

/// Unified error type for the lifechanger-sync service.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    // ── Session Errors ──────────────────────────────────────────────────
    #[error("Failed to exchange code for token: {status} - {body}")]
    AuthExchange { status: u16, body: String },

    #[error("Invalid token response format: {0}")]
    InvalidTokenResponse(String),

    #[error("Not authenticated with Garmin")]
    AuthenticationRequired,

    #[error("Failed to refresh token ({kind}): {message}")]
    RefreshFailed {
        kind: RefreshFailure,
        message: String,
    },

    // ── Data Errors ─────────────────────────────────────────────────────
    #[error("Failed to fetch body battery data: {status} - {body}")]
    DataFetch { status: u16, body: String },

    #[error("Request failed: {0}")]
    Transport(String),

    // ── Storage / Crypto Errors ─────────────────────────────────────────
    #[error("Token storage error: {0}")]
    Storage(String),

    #[error("Crypto error: {0}")]
    CryptoError(String),

    #[error("Invalid state parameter")]
    InvalidState,

    // ── Request Errors ──────────────────────────────────────────────────
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(String),
}

impl AuthError {
    /// Errors after which the caller should treat the user as signed out.
    pub fn invalidates_session(&self) -> bool {
        matches!(
            self,
            AuthError::AuthenticationRequired | AuthError::RefreshFailed { .. }
        )
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::AuthExchange { .. } => (StatusCode::BAD_GATEWAY, "auth_exchange_failed"),
            AuthError::InvalidTokenResponse(_) => {
                (StatusCode::BAD_GATEWAY, "invalid_token_response")
            }
            AuthError::AuthenticationRequired => {
                (StatusCode::UNAUTHORIZED, "authentication_required")
            }
            AuthError::RefreshFailed { .. } => (StatusCode::UNAUTHORIZED, "refresh_failed"),
            AuthError::DataFetch { .. } => (StatusCode::BAD_GATEWAY, "data_fetch_failed"),
            AuthError::Transport(_) => (StatusCode::BAD_GATEWAY, "transport_error"),
            AuthError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            AuthError::CryptoError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "crypto_error"),
            AuthError::InvalidState => (StatusCode::BAD_REQUEST, "invalid_state"),
            AuthError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AuthError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        };

        let body = json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
