//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use raven_auth::AuthError;

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Another request holds the session for too long.
    #[error("session busy")]
    SessionBusy,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

/// Error details.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::SessionBusy => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SessionBusy => "session_busy",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if err.is_timeout() {
            tracing::warn!(error = %err, "Session lock timed out");
            return Self::SessionBusy;
        }
        if err.is_infrastructure() {
            tracing::error!(error = %err, "Session store error");
            return Self::Internal("storage error".to_string());
        }
        tracing::error!(error = %err, "Authentication error");
        Self::Internal("authentication error".to_string())
    }
}

impl From<raven_store::StoreError> for ApiError {
    fn from(err: raven_store::StoreError) -> Self {
        Self::from(AuthError::from(err))
    }
}
