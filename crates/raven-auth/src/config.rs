//! Client configuration.
//!
//! A `RavenConfig` is built once per process and shared read-only by every
//! authentication call.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AuthError, Result};

/// Whether the identity provider must interact with the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Interaction {
    /// The provider may answer from its own single-sign-on cache (wire `""`).
    #[default]
    #[serde(rename = "")]
    Optional,
    /// The provider must re-authenticate the user (wire `"yes"`).
    #[serde(rename = "yes")]
    Required,
}

impl Interaction {
    /// The value sent in the `iact` request parameter.
    #[must_use]
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::Optional => "",
            Self::Required => "yes",
        }
    }

    /// Whether interaction is required.
    #[must_use]
    pub const fn is_required(self) -> bool {
        matches!(self, Self::Required)
    }
}

impl fmt::Display for Interaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Configuration for a Raven client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RavenConfig {
    /// Address of the identity provider's authentication page.
    #[serde(default = "RavenConfig::default_provider_url")]
    pub provider_url: Url,

    /// Protocol version sent in requests and required in responses.
    #[serde(default = "RavenConfig::default_version")]
    pub version: String,

    /// Maximum permitted difference between the response issue time and the
    /// local clock, in seconds. The check is strict: a difference equal to
    /// this value is rejected.
    #[serde(default = "RavenConfig::default_max_skew")]
    pub max_skew_seconds: u64,

    /// Where the provider sends the user back to. Responses naming any other
    /// URL are rejected.
    pub return_url: Url,

    /// Description of this site, shown by the provider.
    #[serde(default = "RavenConfig::default_description")]
    pub description: String,

    /// Default reason for requesting authentication, shown by the provider.
    #[serde(default = "RavenConfig::default_message")]
    pub message: String,

    /// Acceptable authentication methods. Empty means anything the provider
    /// accepts.
    #[serde(default)]
    pub aauth: Vec<String>,

    /// Default interaction policy.
    #[serde(default)]
    pub iact: Interaction,

    /// Only accept responses echoing the nonce of a request this client issued.
    #[serde(default = "RavenConfig::default_match_response_and_request")]
    pub match_response_and_request: bool,

    /// Ask the provider to handle failures itself and only ever return
    /// successful responses (wire `fail=yes`).
    #[serde(default)]
    pub fail: bool,
}

impl RavenConfig {
    /// Create a configuration with default values for everything but the
    /// return URL.
    #[must_use]
    pub fn new(return_url: Url) -> Self {
        Self {
            provider_url: Self::default_provider_url(),
            version: Self::default_version(),
            max_skew_seconds: Self::default_max_skew(),
            return_url,
            description: Self::default_description(),
            message: Self::default_message(),
            aauth: Vec::new(),
            iact: Interaction::default(),
            match_response_and_request: Self::default_match_response_and_request(),
            fail: false,
        }
    }

    fn default_provider_url() -> Url {
        Url::parse("https://raven.cam.ac.uk/auth/authenticate.html")
            .expect("default provider URL is valid")
    }

    fn default_version() -> String {
        "1".to_string()
    }

    const fn default_max_skew() -> u64 {
        90
    }

    fn default_description() -> String {
        "There is no description for this website".to_string()
    }

    fn default_message() -> String {
        "No reason has been given".to_string()
    }

    const fn default_match_response_and_request() -> bool {
        true
    }

    /// The `fail` request parameter value.
    #[must_use]
    pub const fn fail_wire(&self) -> &'static str {
        if self.fail {
            "yes"
        } else {
            ""
        }
    }

    /// Check the configuration for values that would make every response
    /// fail or that cannot be sent to the provider.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(AuthError::InvalidConfig("protocol version is empty".into()));
        }
        if self.max_skew_seconds == 0 {
            return Err(AuthError::InvalidConfig(
                "max skew must be at least one second".into(),
            ));
        }
        if !matches!(self.provider_url.scheme(), "http" | "https") {
            return Err(AuthError::InvalidConfig(format!(
                "provider URL must be http(s): {}",
                self.provider_url
            )));
        }
        if let Some(method) = self.aauth.iter().find(|m| m.is_empty() || m.contains(',')) {
            return Err(AuthError::InvalidConfig(format!(
                "invalid authentication method name: {method:?}"
            )));
        }
        Ok(())
    }
}
