//! Session cookie extractor.
//!
//! Every browser is identified by an opaque token in the `raven_session`
//! cookie. Requests without a usable cookie get a freshly minted token,
//! which the response must then set.

use std::convert::Infallible;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderName, HeaderValue};

use raven_core::SessionToken;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "raven_session";

/// The session token carried by a request.
#[derive(Debug, Clone, Copy)]
pub struct SessionCookie {
    /// The token.
    pub token: SessionToken,
    /// Whether the token was minted for this request.
    pub fresh: bool,
}

impl SessionCookie {
    /// Read the token from a `Cookie` header value.
    #[must_use]
    pub fn parse(header: &str) -> Option<SessionToken> {
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .and_then(|(_, value)| value.parse().ok())
    }

    /// The `Set-Cookie` header establishing this token, if it is new.
    #[must_use]
    pub fn set_cookie(&self) -> Option<(HeaderName, HeaderValue)> {
        if !self.fresh {
            return None;
        }
        let cookie = format!(
            "{SESSION_COOKIE}={}; HttpOnly; SameSite=Lax; Path=/",
            self.token
        );
        HeaderValue::from_str(&cookie)
            .ok()
            .map(|value| (SET_COOKIE, value))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionCookie
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let existing = parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(Self::parse);

        Ok(match existing {
            Some(token) => Self {
                token,
                fresh: false,
            },
            None => Self {
                token: SessionToken::generate(),
                fresh: true,
            },
        })
    }
}
