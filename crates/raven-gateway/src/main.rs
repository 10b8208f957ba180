//! Raven Gateway - demonstration site behind Raven authentication
//!
//! Configuration comes from the environment; see `raven_gateway::config`.
//! A missing or unreadable key file is logged and the service still starts,
//! but every successful response is refused until a key is available.
//!
//! Sessions are kept in `RocksDB` under `DATA_DIR` when it is set and in
//! memory otherwise.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use raven_auth::{Authenticator, Keyring, SessionGateway};
use raven_gateway::cleanup::spawn_purge_task;
use raven_gateway::{create_router, GatewayState};
use raven_store::{MemoryStore, RocksStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,raven=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Raven Gateway");

    let (config, raven) = raven_gateway::config::from_env()?;

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = ?config.data_dir,
        provider_url = %raven.provider_url,
        return_url = %raven.return_url,
        key_file = %config.key_file.display(),
        key_id = %config.key_id,
        max_skew_seconds = raven.max_skew_seconds,
        "Gateway configuration loaded"
    );

    let mut keyring = Keyring::new();
    if let Err(e) = keyring.load_pem_file(config.key_id.clone(), &config.key_file) {
        tracing::error!(
            error = %e,
            key_id = %config.key_id,
            "Failed to load verification key; signed responses will be refused"
        );
    }

    let store: Arc<dyn Store> = if let Some(dir) = &config.data_dir {
        tracing::info!(path = %dir.display(), "Opening RocksDB store");
        Arc::new(RocksStore::open(dir)?)
    } else {
        tracing::warn!("No DATA_DIR set - sessions are kept in memory");
        Arc::new(MemoryStore::new())
    };

    let sessions = Arc::new(SessionGateway::with_lock_timeout(
        store,
        config.session_lock_timeout(),
    ));
    let purge = spawn_purge_task(
        Arc::clone(&sessions),
        config.session_idle(),
        config.purge_interval(),
    );

    let listen_addr = config.listen_addr.clone();
    let state =
        GatewayState::with_shared_sessions(Authenticator::new(raven, keyring), sessions, config);

    let app = create_router(state);

    // Start HTTP server
    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    purge.abort();
    Ok(())
}
