//! Gateway application state.
//!
//! This module defines the shared state that is available to all request handlers.

use std::sync::Arc;

use raven_auth::{Authenticator, SessionGateway};

use crate::config::GatewayConfig;

/// Shared application state for the gateway.
#[derive(Clone)]
pub struct GatewayState {
    /// The authentication pipeline.
    pub auth: Arc<Authenticator>,
    /// Session access with per-token locking.
    pub sessions: Arc<SessionGateway>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl GatewayState {
    /// Create a new gateway state.
    #[must_use]
    pub fn new(auth: Authenticator, sessions: SessionGateway, config: GatewayConfig) -> Self {
        Self::with_shared_sessions(auth, Arc::new(sessions), config)
    }

    /// Create a gateway state over a session gateway shared with other tasks,
    /// such as the purge task.
    #[must_use]
    pub fn with_shared_sessions(
        auth: Authenticator,
        sessions: Arc<SessionGateway>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            auth: Arc::new(auth),
            sessions,
            config,
        }
    }
}
