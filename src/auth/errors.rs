//! Authentication error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Authentication error
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("state did not match")]
    StateMismatch,

    #[error("no login flow in progress")]
    FlowNotFound,

    #[error("login flow expired")]
    FlowExpired,

    #[error("provider denied the request: {0}")]
    ProviderDenied(String),

    #[error("failed to exchange token: {0}")]
    TokenExchange(String),

    #[error("no id_token field in oauth2 token")]
    MissingIdToken,

    #[error("failed to verify ID token: {0}")]
    IdTokenVerification(String),

    #[error("provider request failed: {0}")]
    ProviderRequest(String),

    #[error("too many pending login flows")]
    TooManyFlows,

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("storage corruption: {0}")]
    StorageCorruption(String),

    #[error("unknown bucket: {0}")]
    UnknownBucket(String),

    #[error("display name service failed: {0}")]
    DisplayName(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// HTTP status for the error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::StateMismatch
            | Self::FlowNotFound
            | Self::FlowExpired
            | Self::ProviderDenied(_) => StatusCode::BAD_REQUEST,

            Self::TokenExchange(_) | Self::MissingIdToken | Self::ProviderRequest(_) => {
                StatusCode::BAD_GATEWAY
            }

            Self::IdTokenVerification(_) | Self::Unauthenticated => StatusCode::UNAUTHORIZED,

            Self::UnknownProvider(_) => StatusCode::NOT_FOUND,

            Self::TooManyFlows => StatusCode::SERVICE_UNAVAILABLE,

            Self::Storage(_)
            | Self::StorageCorruption(_)
            | Self::UnknownBucket(_)
            | Self::DisplayName(_)
            | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code
    pub fn error_code(&self) -> &str {
        match self {
            Self::StateMismatch => "state_mismatch",
            Self::FlowNotFound => "flow_not_found",
            Self::FlowExpired => "flow_expired",
            Self::ProviderDenied(_) => "provider_denied",
            Self::TokenExchange(_) => "token_exchange_failed",
            Self::MissingIdToken => "missing_id_token",
            Self::IdTokenVerification(_) => "invalid_id_token",
            Self::ProviderRequest(_) => "provider_error",
            Self::UnknownProvider(_) => "unknown_provider",
            Self::TooManyFlows => "too_many_flows",
            Self::Unauthenticated => "unauthenticated",
            Self::Storage(_) => "storage_error",
            Self::StorageCorruption(_) => "storage_corruption",
            Self::UnknownBucket(_) => "unknown_bucket",
            Self::DisplayName(_) => "display_name_error",
            Self::Config(_) => "config_error",
        }
    }

    /// Message shown to the browser
    pub fn user_message(&self) -> &str {
        match self {
            Self::StateMismatch => "state did not match, please sign in again",
            Self::FlowNotFound | Self::FlowExpired => "sign-in session expired, please sign in again",
            Self::ProviderDenied(_) => "sign-in was cancelled at the provider",
            Self::TokenExchange(_) | Self::MissingIdToken | Self::ProviderRequest(_) => {
                "the identity provider could not complete the sign-in"
            }
            Self::IdTokenVerification(_) => "the identity provider response could not be verified",
            Self::UnknownProvider(_) => "unknown sign-in provider",
            Self::TooManyFlows => "too many sign-ins in progress, please retry later",
            Self::Unauthenticated => "not signed in",
            Self::Storage(_)
            | Self::StorageCorruption(_)
            | Self::UnknownBucket(_)
            | Self::DisplayName(_)
            | Self::Config(_) => "internal error",
        }
    }

    /// Errors that break a data-model invariant or indicate a bug
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::StorageCorruption(_) | Self::UnknownBucket(_)
        )
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        AuthError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(e: serde_json::Error) -> Self {
        AuthError::Storage(format!("malformed stored value: {}", e))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.is_fatal() {
            tracing::error!(code = self.error_code(), "request failed: {}", self);
        } else if status.is_server_error() {
            tracing::warn!(code = self.error_code(), "request failed: {}", self);
        }

        // Internal details stay in the logs.
        let details = if status == StatusCode::INTERNAL_SERVER_ERROR {
            None
        } else {
            Some(self.to_string())
        };

        let body = Json(json!({
            "code": self.error_code(),
            "message": self.user_message(),
            "details": details,
        }));

        (status, body).into_response()
    }
}
