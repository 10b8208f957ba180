//! Domain types stored in the database.

use chrono::{DateTime, Utc};
use raven_core::{RequestId, SessionToken};
use serde::{Deserialize, Serialize};

/// The persisted state of one browser session.
///
/// `principal` and `expires_at` are always written together; a record never
/// carries one without the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Token naming this session.
    pub token: SessionToken,
    /// Identity of the authenticated user, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    /// Absolute expiry of the cached authentication, seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Serialized copy of the caller's request parameters, captured before
    /// redirecting to the identity provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_parameters: Option<String>,
    /// Nonce of the outstanding authentication request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Create an empty record for a new session.
    #[must_use]
    pub fn new(token: SessionToken, now: DateTime<Utc>) -> Self {
        Self {
            token,
            principal: None,
            expires_at: None,
            stored_parameters: None,
            request_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The cached principal, if it is non-empty and has not expired at `now`.
    #[must_use]
    pub fn authenticated_principal(&self, now: DateTime<Utc>) -> Option<&str> {
        match (self.principal.as_deref(), self.expires_at) {
            (Some(principal), Some(expires)) if !principal.is_empty() && expires > now.timestamp() => {
                Some(principal)
            }
            _ => None,
        }
    }

    /// Whether the record may be removed by a stale-session sweep.
    ///
    /// A record is stale when it was last touched before `idle_before` and
    /// carries no authentication still valid at `now`.
    #[must_use]
    pub fn is_stale(&self, idle_before: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.updated_at < idle_before && self.authenticated_principal(now).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record_at(now: DateTime<Utc>) -> SessionRecord {
        SessionRecord::new(SessionToken::generate(), now)
    }

    #[test]
    fn new_record_is_unauthenticated() {
        let now = Utc::now();
        let record = record_at(now);
        assert!(record.authenticated_principal(now).is_none());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn principal_valid_until_expiry() {
        let now = Utc::now();
        let mut record = record_at(now);
        record.principal = Some("alice".to_string());
        record.expires_at = Some(now.timestamp() + 60);

        assert_eq!(record.authenticated_principal(now), Some("alice"));
        assert!(record
            .authenticated_principal(now + Duration::seconds(60))
            .is_none());
    }

    #[test]
    fn empty_principal_is_not_authenticated() {
        let now = Utc::now();
        let mut record = record_at(now);
        record.principal = Some(String::new());
        record.expires_at = Some(now.timestamp() + 60);
        assert!(record.authenticated_principal(now).is_none());
    }

    #[test]
    fn stale_only_when_idle_and_unauthenticated() {
        let now = Utc::now();
        let mut record = record_at(now - Duration::hours(2));
        let cutoff = now - Duration::hours(1);
        assert!(record.is_stale(cutoff, now));

        record.principal = Some("alice".to_string());
        record.expires_at = Some(now.timestamp() + 60);
        assert!(!record.is_stale(cutoff, now));

        let fresh = record_at(now);
        assert!(!fresh.is_stale(cutoff, now));
    }
}
