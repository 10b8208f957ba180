//! Background session cleanup task.
//!
//! Periodically removes sessions that have been idle for too long and hold
//! no valid authentication. Each removal goes through the session gateway's
//! per-token lock, so it never races a request for the same session.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use raven_auth::SessionGateway;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Spawn a background task that periodically purges stale sessions.
///
/// Returns a `JoinHandle` that can be used to abort the task.
pub fn spawn_purge_task(
    sessions: Arc<SessionGateway>,
    idle: Duration,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);

        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let sessions = Arc::clone(&sessions);
            let result = tokio::task::spawn_blocking(move || purge_once(&sessions, idle)).await;

            match result {
                Ok(Ok(0)) => debug!("Session purge: nothing stale"),
                Ok(Ok(count)) => info!(purged = count, "Session purge completed"),
                Ok(Err(e)) => warn!(error = %e, "Session purge failed"),
                Err(e) => warn!(error = %e, "Session purge task panicked"),
            }
        }
    })
}

/// Run one purge pass, returning the number of sessions removed.
///
/// # Errors
///
/// Returns the store's error if the sweep fails.
pub fn purge_once(sessions: &SessionGateway, idle: Duration) -> raven_store::Result<usize> {
    let now = Utc::now();
    let idle_before = chrono::Duration::from_std(idle)
        .ok()
        .and_then(|idle| now.checked_sub_signed(idle))
        .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
    let purged = sessions.purge_stale(idle_before, now)?;
    if let Ok(remaining) = sessions.store().count_sessions() {
        debug!(remaining, "Session store status");
    }
    Ok(purged)
}
