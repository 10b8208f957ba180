//! Status codes of the Raven protocol.
//!
//! Codes are plain integers on the wire. Some are reported by the identity
//! provider, others are produced locally when a response fails validation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A numeric Raven status code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(u32);

impl StatusCode {
    /// Successful authentication.
    pub const SUCCESS: Self = Self(200);
    /// The user cancelled the authentication request.
    pub const CANCELLED: Self = Self(410);
    /// No mutually acceptable authentication types.
    pub const NO_ACCEPTABLE_AUTH: Self = Self(510);
    /// Unsupported protocol version.
    pub const UNSUPPORTED_VERSION: Self = Self(520);
    /// General request parameter error.
    pub const PARAMETER_ERROR: Self = Self(530);
    /// Interaction was required but did not take place.
    pub const INTERACTION_REQUIRED: Self = Self(540);
    /// Issue time outside the permitted clock skew.
    pub const CLOCK_SKEW: Self = Self(550);
    /// Unknown key id or signature verification failure.
    pub const UNAUTHORISED: Self = Self(560);
    /// Return URL mismatch, or a response not matching any issued request.
    pub const DECLINED: Self = Self(570);

    /// Wrap a raw code.
    #[must_use]
    pub const fn new(code: u32) -> Self {
        Self(code)
    }

    /// The numeric value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Whether this is the success code.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == Self::SUCCESS.0
    }

    /// A short human-readable explanation, suitable for an error page.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self.0 {
            200 => "Successful authentication",
            410 => "The user cancelled the authentication request",
            510 => "No mutually acceptable authentication types available",
            520 => "Unsupported protocol version",
            530 => "General request parameter error",
            540 => "Interaction would be required",
            550 => "The response was issued outside the permitted clock skew",
            560 => "The response could not be authenticated",
            570 => "Authentication declined",
            _ => "Unrecognised status",
        }
    }
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatusCode({})", self.0)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for StatusCode {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

impl From<StatusCode> for u32 {
    fn from(code: StatusCode) -> Self {
        code.0
    }
}
