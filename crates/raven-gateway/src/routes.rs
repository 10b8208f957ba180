//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, login};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// - `GET /` - Protected page (`?logout=logout`, `?interact=interact`)
/// - `POST /` - Protected page with form parameters
/// - `GET /health` - Health check
pub fn create_router(state: GatewayState) -> Router {
    let request_timeout = state.config.request_timeout();
    let state = Arc::new(state);

    Router::new()
        .route("/", get(login::login).post(login::login))
        .route("/health", get(health::health))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use raven_auth::{Authenticator, Keyring, RavenConfig, SessionGateway};
    use raven_store::MemoryStore;
    use tower::ServiceExt;
    use url::Url;

    use crate::config::GatewayConfig;

    #[tokio::test]
    async fn unknown_route_is_404() {
        let auth = Authenticator::new(
            RavenConfig::new(Url::parse("http://localhost:8080/").unwrap()),
            Keyring::new(),
        );
        let sessions = SessionGateway::new(Arc::new(MemoryStore::new()));
        let app = create_router(GatewayState::new(auth, sessions, GatewayConfig::default()));

        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
