//! Health check endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::state::GatewayState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Ids of the loaded verification keys.
    pub key_ids: Vec<String>,
}

/// Health check handler.
///
/// The service reports `degraded` while no verification key is loaded,
/// since every successful response will then be refused.
///
/// # Example
///
/// ```text
/// GET /health
///
/// Response: 200 OK
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "key_ids": ["2"]
/// }
/// ```
pub async fn health(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let keyring = state.auth.keyring();
    let response = HealthResponse {
        status: if keyring.is_empty() { "degraded" } else { "healthy" },
        version: env!("CARGO_PKG_VERSION"),
        key_ids: keyring.key_ids().into_iter().map(str::to_string).collect(),
    };

    (StatusCode::OK, Json(response))
}
