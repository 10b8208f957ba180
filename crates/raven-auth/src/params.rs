//! Request parameters of the protected page.
//!
//! Before redirecting to the identity provider the caller's parameters are
//! stored in the session, so they can be handed back once the user returns
//! with a signed response in place of the original query.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::error::{AuthError, Result};

/// Name of the query parameter carrying the signed response.
pub const RESPONSE_PARAM: &str = "WLS-Response";

/// A parameter value: repeated keys collect into `Multiple`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A key that appeared once.
    Single(String),
    /// A key that appeared several times, in order.
    Multiple(Vec<String>),
}

impl ParamValue {
    /// The first value.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::Multiple(values) => values.first().map(String::as_str),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            Self::Single(existing) => {
                let first = std::mem::take(existing);
                *self = Self::Multiple(vec![first, value]);
            }
            Self::Multiple(values) => values.push(value),
        }
    }
}

/// An ordered map of request parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestParams(BTreeMap<String, ParamValue>);

impl RequestParams {
    /// Create an empty parameter map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `application/x-www-form-urlencoded` query string.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::new();
        params.extend_form(query.as_bytes());
        params
    }

    /// Append the pairs of an `application/x-www-form-urlencoded` body, such
    /// as a posted form, after the ones already present.
    pub fn extend_form(&mut self, body: &[u8]) {
        for (key, value) in form_urlencoded::parse(body) {
            self.append(key.into_owned(), value.into_owned());
        }
    }

    /// Add a value, turning an existing key into a multi-valued one.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        match self.0.entry(key.into()) {
            Entry::Occupied(mut existing) => existing.get_mut().push(value),
            Entry::Vacant(slot) => {
                slot.insert(ParamValue::Single(value));
            }
        }
    }

    /// The first value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(ParamValue::first)
    }

    /// The full value for `key`.
    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// The signed response, if present and non-empty.
    #[must_use]
    pub fn signed_response(&self) -> Option<&str> {
        self.get(RESPONSE_PARAM).filter(|value| !value.is_empty())
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over keys and values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Serialize for storage in the session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Parameters` if encoding fails.
    pub fn store(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| AuthError::Parameters(e.to_string()))
    }

    /// Rebuild parameters from their stored form.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Parameters` if the stored value is not a valid
    /// parameter map.
    pub fn restore(stored: &str) -> Result<Self> {
        serde_json::from_str(stored).map_err(|e| AuthError::Parameters(e.to_string()))
    }
}
