//! Trusted verification keys, selected by key id.
//!
//! Keys are supplied at startup and never change afterwards, so a `Keyring`
//! is shared across threads without locking. Cloning is cheap.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::signature::{RsaVerificationKey, VerificationKey};

/// Key id of the provider's current signing key.
pub const DEFAULT_KEY_ID: &str = "2";

/// File the default key is conventionally read from.
pub const DEFAULT_KEY_FILE: &str = "pubkey2.txt";

/// Map from key id to verification key.
#[derive(Clone, Default)]
pub struct Keyring {
    keys: HashMap<String, Arc<dyn VerificationKey>>,
}

impl Keyring {
    /// Create an empty keyring. Every signed response fails verification
    /// until a key is added.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the key for `kid`.
    pub fn insert(&mut self, kid: impl Into<String>, key: impl VerificationKey + 'static) {
        self.keys.insert(kid.into(), Arc::new(key));
    }

    /// Load an ASCII-armored RSA public key file as `kid`.
    ///
    /// On failure the keyring is left unchanged; the caller decides whether
    /// to carry on without the key.
    ///
    /// # Errors
    ///
    /// Returns the read or parse error for the file.
    pub fn load_pem_file(&mut self, kid: impl Into<String>, path: impl AsRef<Path>) -> Result<()> {
        let kid = kid.into();
        let path = path.as_ref();
        let key = RsaVerificationKey::from_pem_file(path)?;
        tracing::info!(kid = %kid, path = %path.display(), "Loaded verification key");
        self.insert(kid, key);
        Ok(())
    }

    /// Get the key for `kid`.
    #[must_use]
    pub fn get(&self, kid: &str) -> Option<&Arc<dyn VerificationKey>> {
        self.keys.get(kid)
    }

    /// Whether a key is registered for `kid`.
    #[must_use]
    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the keyring holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Registered key ids, sorted.
    #[must_use]
    pub fn key_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyring")
            .field("key_ids", &self.key_ids())
            .finish()
    }
}
