//! The authentication pipeline.
//!
//! Each call to [`Authenticator::authenticate`] tries, in order:
//!
//! 1. the cached principal in the session,
//! 2. a signed response carried by the request,
//! 3. issuing a fresh request to the identity provider.
//!
//! The first stage that applies decides the outcome.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use raven_core::{RequestId, SessionToken};
use url::Url;

use crate::clock::{Clock, SystemClock};
use crate::codec::{build_request_url, SignedAssertion};
use crate::config::{Interaction, RavenConfig};
use crate::error::Result;
use crate::keyring::Keyring;
use crate::params::RequestParams;
use crate::session::{Session, SessionGateway};
use crate::signature;
use crate::status::StatusCode;

/// Result of an authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The user is authenticated as this principal.
    Authenticated(String),
    /// Authentication failed with this status.
    Denied(StatusCode),
    /// The caller must redirect the browser to `location` and send nothing
    /// else.
    PendingRedirect {
        /// The provider URL carrying the request.
        location: Url,
    },
}

impl AuthOutcome {
    /// The principal, if authenticated.
    #[must_use]
    pub fn principal(&self) -> Option<&str> {
        match self {
            Self::Authenticated(principal) => Some(principal),
            _ => None,
        }
    }
}

/// Runs the authentication pipeline for one configuration.
///
/// Shared freely between threads; all per-request state lives in the
/// [`Session`].
pub struct Authenticator {
    config: RavenConfig,
    keyring: Keyring,
    clock: Arc<dyn Clock>,
}

impl Authenticator {
    /// Create an authenticator using the system clock.
    #[must_use]
    pub fn new(config: RavenConfig, keyring: Keyring) -> Self {
        Self::with_clock(config, keyring, Arc::new(SystemClock))
    }

    /// Create an authenticator with an injected clock.
    #[must_use]
    pub fn with_clock(config: RavenConfig, keyring: Keyring, clock: Arc<dyn Clock>) -> Self {
        if keyring.is_empty() {
            tracing::warn!("No verification keys configured; signed responses will be rejected");
        }
        Self {
            config,
            keyring,
            clock,
        }
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &RavenConfig {
        &self.config
    }

    /// The trusted keys.
    #[must_use]
    pub const fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    /// Authenticate the request described by `params`.
    ///
    /// `message` and `interaction` override the configured defaults for this
    /// call. When a signed response is processed, `params` is replaced by the
    /// parameters stored before the redirect, if they can be restored.
    ///
    /// Changes are made to `session` only; the caller must
    /// [`close`](Session::close) it before sending the response.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Parameters` if the request parameters cannot be
    /// serialized for storage. Denials are returned as
    /// [`AuthOutcome::Denied`], not as errors.
    pub fn authenticate(
        &self,
        params: &mut RequestParams,
        session: &mut Session<'_>,
        message: Option<&str>,
        interaction: Option<Interaction>,
    ) -> Result<AuthOutcome> {
        let interaction = interaction.unwrap_or(self.config.iact);
        let now = self.clock.now();

        if !interaction.is_required() {
            if let Some(principal) = session.authenticated_principal(now) {
                tracing::debug!(principal, "Authenticated from session");
                return Ok(AuthOutcome::Authenticated(principal.to_string()));
            }
        }

        if let Some(raw) = params.signed_response().map(str::to_string) {
            return Ok(self.process_response(&raw, params, session, interaction, now));
        }

        self.issue_request(params, session, message, interaction)
    }

    fn process_response(
        &self,
        raw: &str,
        params: &mut RequestParams,
        session: &mut Session<'_>,
        interaction: Interaction,
        now: DateTime<Utc>,
    ) -> AuthOutcome {
        if let Some(stored) = session.stored_parameters() {
            match RequestParams::restore(stored) {
                Ok(restored) => *params = restored,
                Err(e) => tracing::warn!(error = %e, "Could not restore request parameters"),
            }
        }

        let expected = session.take_request_id();

        let assertion = match SignedAssertion::parse(raw) {
            Ok(assertion) => assertion,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected malformed response");
                return AuthOutcome::Denied(StatusCode::UNAUTHORISED);
            }
        };

        if let Err(status) = self.check(&assertion, expected.as_ref(), interaction, now) {
            tracing::warn!(
                status = status.as_u32(),
                response_id = %assertion.id,
                reason = status.description(),
                "Response rejected"
            );
            return AuthOutcome::Denied(status);
        }

        if !assertion.status.is_success() {
            tracing::info!(
                status = assertion.status.as_u32(),
                message = assertion.message.as_deref().unwrap_or_default(),
                "Provider reported failure"
            );
            return AuthOutcome::Denied(assertion.status);
        }

        if !self.signature_valid(&assertion) {
            tracing::warn!(
                response_id = %assertion.id,
                kid = assertion.kid.as_deref().unwrap_or_default(),
                "Response signature rejected"
            );
            return AuthOutcome::Denied(StatusCode::UNAUTHORISED);
        }

        let life = assertion
            .life
            .map_or(0, |life| i64::try_from(life).unwrap_or(i64::MAX));
        let expires_at = now.timestamp().saturating_add(life);
        session.set_authenticated(assertion.principal.clone(), expires_at);

        tracing::info!(
            principal = %assertion.principal,
            auth = assertion.auth.as_deref().unwrap_or_default(),
            expires_at,
            "Authenticated from signed response"
        );
        AuthOutcome::Authenticated(assertion.principal)
    }

    /// Protocol checks, in order. The first failure wins.
    fn check(
        &self,
        assertion: &SignedAssertion,
        expected: Option<&RequestId>,
        interaction: Interaction,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), StatusCode> {
        if assertion.version != self.config.version {
            return Err(StatusCode::UNSUPPORTED_VERSION);
        }
        if assertion.url != self.config.return_url.as_str() {
            return Err(StatusCode::DECLINED);
        }
        let skew = (now - assertion.issue).num_seconds().unsigned_abs();
        if skew >= self.config.max_skew_seconds {
            return Err(StatusCode::CLOCK_SKEW);
        }
        if interaction.is_required() && !assertion.was_interactive() {
            return Err(StatusCode::INTERACTION_REQUIRED);
        }
        if self.config.match_response_and_request
            && !expected.is_some_and(|nonce| nonce.matches(&assertion.params))
        {
            return Err(StatusCode::DECLINED);
        }
        Ok(())
    }

    fn signature_valid(&self, assertion: &SignedAssertion) -> bool {
        let (Some(kid), Some(sig)) = (assertion.kid.as_deref(), assertion.sig.as_deref()) else {
            return false;
        };
        if !self.keyring.contains(kid) {
            tracing::debug!(kid, "Unknown key id");
            return false;
        }
        signature::verify(assertion.raw(), kid, sig, &self.keyring)
    }

    fn issue_request(
        &self,
        params: &RequestParams,
        session: &mut Session<'_>,
        message: Option<&str>,
        interaction: Interaction,
    ) -> Result<AuthOutcome> {
        session.set_stored_parameters(params.store()?);

        let nonce = RequestId::generate();
        let location = build_request_url(
            &self.config,
            message.unwrap_or(&self.config.message),
            interaction,
            &nonce,
        );
        session.set_request_id(nonce);

        tracing::debug!(
            token = %session.token(),
            interaction = interaction.as_wire(),
            "Issued authentication request"
        );
        Ok(AuthOutcome::PendingRedirect { location })
    }
}

/// Log the user off this site by deleting their whole session.
///
/// The identity provider's own session is not affected. Returns `false` if
/// there was no session.
///
/// # Errors
///
/// Returns the store's error if the delete fails.
pub fn log_off(sessions: &SessionGateway, token: SessionToken) -> Result<bool> {
    let removed = sessions.delete(token)?;
    tracing::info!(token = %token, removed, "Logged off");
    Ok(removed)
}
