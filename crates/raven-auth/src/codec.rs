//! Wire format of the Raven protocol.
//!
//! Responses arrive as one `!`-delimited string of 13 fields:
//!
//! ```text
//! ver!status!msg!issue!id!url!principal!auth!sso!life!params!kid!sig
//! ```
//!
//! Literal `!` and `%` inside a field are sent as `%21` and `%25`. Requests go
//! out as query parameters `ver, url, desc, msg, iact, aauth, params, fail`
//! appended to the provider URL.

use std::borrow::Cow;

use chrono::{DateTime, NaiveDateTime, Utc};
use percent_encoding::percent_decode_str;
use raven_core::RequestId;
use url::Url;

use crate::config::{Interaction, RavenConfig};
use crate::error::{AuthError, Result};
use crate::status::StatusCode;

/// Number of fields in a response.
pub const RESPONSE_FIELDS: usize = 13;

/// Format of the `issue` field.
pub const ISSUE_TIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// A parsed signed response.
///
/// Fields are typed and percent-decoded; the raw string is kept because the
/// signature covers its exact bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAssertion {
    /// Protocol version.
    pub version: String,
    /// Outcome reported by the provider.
    pub status: StatusCode,
    /// Optional human-readable status message.
    pub message: Option<String>,
    /// When the provider issued the response.
    pub issue: DateTime<Utc>,
    /// Provider-assigned response id.
    pub id: String,
    /// The return URL the response is addressed to.
    pub url: String,
    /// The authenticated user. Non-empty whenever `status` is 200.
    pub principal: String,
    /// Method used to authenticate, `None` if the provider answered from its
    /// own session cache.
    pub auth: Option<String>,
    /// Methods used earlier in the provider's session.
    pub sso: Vec<String>,
    /// Remaining life of the provider's session, in seconds.
    pub life: Option<u64>,
    /// The `params` value from the request, echoed back.
    pub params: String,
    /// Id of the key that signed the response.
    pub kid: Option<String>,
    /// Signature, still in the transport alphabet.
    pub sig: Option<String>,
    raw: String,
}

impl SignedAssertion {
    /// Parse a raw response.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MalformedResponse` if the field count is not 13,
    /// a typed field does not parse, or a status-200 response lacks a
    /// principal, key id or signature.
    pub fn parse(raw: &str) -> Result<Self> {
        let fields: Vec<&str> = raw.split('!').collect();
        let [ver, status, msg, issue, id, url, principal, auth, sso, life, params, kid, sig] =
            fields.as_slice()
        else {
            return Err(malformed(format!(
                "expected {RESPONSE_FIELDS} fields, got {}",
                fields.len()
            )));
        };

        let status = parse_status(status)?;

        let life = if life.is_empty() {
            None
        } else {
            Some(
                life.parse::<u64>()
                    .map_err(|_| malformed(format!("life is not a number: {life:?}")))?,
            )
        };

        let assertion = Self {
            version: decode_field(ver)?.into_owned(),
            status,
            message: non_empty(decode_field(msg)?),
            issue: parse_issue_time(issue)?,
            id: decode_field(id)?.into_owned(),
            url: decode_field(url)?.into_owned(),
            principal: decode_field(principal)?.into_owned(),
            auth: non_empty(decode_field(auth)?),
            sso: decode_field(sso)?
                .split(',')
                .filter(|method| !method.is_empty())
                .map(str::to_string)
                .collect(),
            life,
            params: decode_field(params)?.into_owned(),
            kid: non_empty(decode_field(kid)?),
            sig: non_empty(Cow::Borrowed(*sig)),
            raw: raw.to_string(),
        };

        if assertion.status.is_success() {
            if assertion.principal.is_empty() {
                return Err(malformed("successful response without a principal"));
            }
            if assertion.kid.is_none() || assertion.sig.is_none() {
                return Err(malformed("successful response is not signed"));
            }
        }

        Ok(assertion)
    }

    /// The response exactly as received.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether the provider interacted with the user for this response.
    #[must_use]
    pub fn was_interactive(&self) -> bool {
        self.auth.is_some()
    }
}

/// Parse an issue timestamp of the form `YYYYMMDDTHHMMSSZ`.
///
/// # Errors
///
/// Returns `AuthError::MalformedResponse` if the value does not match.
pub fn parse_issue_time(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, ISSUE_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| malformed(format!("bad issue time: {value:?}")))
}

/// Format a timestamp as an issue time.
#[must_use]
pub fn format_issue_time(time: DateTime<Utc>) -> String {
    time.format(ISSUE_TIME_FORMAT).to_string()
}

/// Build the provider URL that starts an authentication request.
///
/// Parameters are appended in the order `ver, url, desc, msg, iact, aauth,
/// params, fail`, each form-encoded. Any query already on the provider URL is
/// kept.
#[must_use]
pub fn build_request_url(
    config: &RavenConfig,
    message: &str,
    interaction: Interaction,
    nonce: &RequestId,
) -> Url {
    let mut url = config.provider_url.clone();
    url.query_pairs_mut()
        .append_pair("ver", &config.version)
        .append_pair("url", config.return_url.as_str())
        .append_pair("desc", &config.description)
        .append_pair("msg", message)
        .append_pair("iact", interaction.as_wire())
        .append_pair("aauth", &config.aauth.join(","))
        .append_pair("params", nonce.as_str())
        .append_pair("fail", config.fail_wire());
    url
}

/// Status codes are bare ASCII digits; a sign or whitespace is malformed.
fn parse_status(value: &str) -> Result<StatusCode> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(format!("status is not a number: {value:?}")));
    }
    value
        .parse::<u32>()
        .map(StatusCode::new)
        .map_err(|_| malformed(format!("status out of range: {value:?}")))
}

fn decode_field(field: &str) -> Result<Cow<'_, str>> {
    percent_decode_str(field)
        .decode_utf8()
        .map_err(|_| malformed("field is not valid UTF-8 after decoding"))
}

fn non_empty(value: Cow<'_, str>) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.into_owned())
    }
}

fn malformed(reason: impl Into<String>) -> AuthError {
    AuthError::MalformedResponse(reason.into())
}
