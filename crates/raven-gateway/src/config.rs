//! Gateway configuration types.
//!
//! The gateway reads its settings from environment variables at startup.
//! Protocol settings end up in a [`RavenConfig`]; everything about serving
//! HTTP and keeping sessions lives in [`GatewayConfig`].

use std::path::PathBuf;
use std::time::Duration;

use raven_auth::keyring::{DEFAULT_KEY_FILE, DEFAULT_KEY_ID};
use raven_auth::{AuthError, RavenConfig};
use serde::Deserialize;
use url::Url;

/// Configuration for the gateway service.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:8080").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// `RocksDB` directory for sessions. Sessions are kept in memory when unset.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Verification key file.
    #[serde(default = "GatewayConfig::default_key_file")]
    pub key_file: PathBuf,

    /// Key id the key file is registered under.
    #[serde(default = "GatewayConfig::default_key_id")]
    pub key_id: String,

    /// Request timeout in seconds.
    #[serde(default = "GatewayConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// How long a request waits for another one holding the same session.
    #[serde(default = "GatewayConfig::default_session_lock_timeout")]
    pub session_lock_timeout_ms: u64,

    /// Sessions untouched for this long and not authenticated are purged.
    #[serde(default = "GatewayConfig::default_session_idle")]
    pub session_idle_seconds: u64,

    /// How often the purge runs.
    #[serde(default = "GatewayConfig::default_purge_interval")]
    pub purge_interval_seconds: u64,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    fn default_key_file() -> PathBuf {
        PathBuf::from(DEFAULT_KEY_FILE)
    }

    fn default_key_id() -> String {
        DEFAULT_KEY_ID.to_string()
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_session_lock_timeout() -> u64 {
        5000
    }

    const fn default_session_idle() -> u64 {
        3600 // 1 hour
    }

    const fn default_purge_interval() -> u64 {
        300 // 5 minutes
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Get the session lock timeout as a `Duration`.
    #[must_use]
    pub fn session_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.session_lock_timeout_ms)
    }

    /// Get the session idle limit as a `Duration`.
    #[must_use]
    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_seconds)
    }

    /// Get the purge interval as a `Duration`.
    #[must_use]
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_seconds)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            data_dir: None,
            key_file: Self::default_key_file(),
            key_id: Self::default_key_id(),
            request_timeout_seconds: Self::default_request_timeout(),
            session_lock_timeout_ms: Self::default_session_lock_timeout(),
            session_idle_seconds: Self::default_session_idle(),
            purge_interval_seconds: Self::default_purge_interval(),
        }
    }
}

/// Build both configurations from a variable lookup.
///
/// `lookup` returns the value of a named variable, if set. Unset variables
/// fall back to defaults; only `RAVEN_RETURN_URL` has none, and it defaults
/// to the local listen address.
///
/// # Errors
///
/// Returns `AuthError::InvalidConfig` for unparseable values or a
/// configuration that fails validation.
pub fn from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(GatewayConfig, RavenConfig), AuthError> {
    let mut gateway = GatewayConfig::default();
    if let Some(addr) = lookup("LISTEN_ADDR") {
        gateway.listen_addr = addr;
    }
    gateway.data_dir = lookup("DATA_DIR").map(PathBuf::from);
    if let Some(file) = lookup("RAVEN_KEY_FILE") {
        gateway.key_file = PathBuf::from(file);
    }
    if let Some(kid) = lookup("RAVEN_KEY_ID") {
        gateway.key_id = kid;
    }
    if let Some(ms) = lookup("SESSION_LOCK_TIMEOUT_MS") {
        gateway.session_lock_timeout_ms = parse_number("SESSION_LOCK_TIMEOUT_MS", &ms)?;
    }

    let return_url = match lookup("RAVEN_RETURN_URL") {
        Some(url) => parse_url("RAVEN_RETURN_URL", &url)?,
        None => local_url(&gateway.listen_addr)?,
    };

    let mut raven = RavenConfig::new(return_url);
    if let Some(url) = lookup("RAVEN_URL") {
        raven.provider_url = parse_url("RAVEN_URL", &url)?;
    }
    if let Some(description) = lookup("RAVEN_DESCRIPTION") {
        raven.description = description;
    }
    if let Some(message) = lookup("RAVEN_MESSAGE") {
        raven.message = message;
    }
    if let Some(skew) = lookup("RAVEN_MAX_SKEW") {
        raven.max_skew_seconds = parse_number("RAVEN_MAX_SKEW", &skew)?;
    }
    raven.validate()?;

    Ok((gateway, raven))
}

/// Build both configurations from the process environment.
///
/// # Errors
///
/// See [`from_lookup`].
pub fn from_env() -> Result<(GatewayConfig, RavenConfig), AuthError> {
    from_lookup(|name| std::env::var(name).ok())
}

fn parse_url(name: &str, value: &str) -> Result<Url, AuthError> {
    Url::parse(value).map_err(|e| AuthError::InvalidConfig(format!("{name}: {e}")))
}

fn parse_number(name: &str, value: &str) -> Result<u64, AuthError> {
    value
        .parse()
        .map_err(|e| AuthError::InvalidConfig(format!("{name}: {e}")))
}

fn local_url(listen_addr: &str) -> Result<Url, AuthError> {
    let port = listen_addr.rsplit(':').next().unwrap_or("8080");
    parse_url("LISTEN_ADDR", &format!("http://localhost:{port}/"))
}
