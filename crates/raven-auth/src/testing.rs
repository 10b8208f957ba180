//! Helpers for producing signed responses in tests.
//!
//! The signer uses a fixed RSA key whose public half is the
//! `tests/fixtures/pubkey2.pem` fixture, so responses it signs verify against
//! the same key as the recorded fixtures.

use chrono::{DateTime, Utc};
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;

use crate::codec::format_issue_time;
use crate::keyring::{Keyring, DEFAULT_KEY_ID};
use crate::signature::{encode_signature, RsaVerificationKey};
use crate::status::StatusCode;

const FIXTURE_PRIVATE_KEY: &str = include_str!("../tests/fixtures/test_key.pem");

/// Signs responses the way the identity provider does.
pub struct TestSigner {
    kid: String,
    private: RsaPrivateKey,
}

impl TestSigner {
    /// A signer using the fixture key under key id `"2"`.
    ///
    /// # Panics
    ///
    /// Panics if the bundled fixture key does not parse.
    #[must_use]
    pub fn fixture() -> Self {
        let private =
            RsaPrivateKey::from_pkcs8_pem(FIXTURE_PRIVATE_KEY).expect("fixture key parses");
        Self {
            kid: DEFAULT_KEY_ID.to_string(),
            private,
        }
    }

    /// The key id responses are signed under.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// The matching verification key.
    #[must_use]
    pub fn verification_key(&self) -> RsaVerificationKey {
        RsaVerificationKey::new(RsaPublicKey::from(&self.private))
    }

    /// A keyring trusting this signer.
    #[must_use]
    pub fn keyring(&self) -> Keyring {
        let mut keyring = Keyring::new();
        keyring.insert(self.kid.clone(), self.verification_key());
        keyring
    }

    /// Sign `signed_part` and return the signature in the transport alphabet.
    #[must_use]
    pub fn sign(&self, signed_part: &str) -> String {
        let key = SigningKey::<Sha1>::new(self.private.clone());
        let signature = key.sign(signed_part.as_bytes());
        encode_signature(&signature.to_bytes())
    }
}

/// Builds raw responses field by field.
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    version: String,
    status: StatusCode,
    message: String,
    issue: DateTime<Utc>,
    id: String,
    url: String,
    principal: String,
    auth: String,
    sso: Vec<String>,
    life: Option<u64>,
    params: String,
    kid: Option<String>,
}

impl ResponseBuilder {
    /// A successful password authentication of `principal` with one hour of
    /// life.
    #[must_use]
    pub fn success(url: &str, principal: &str, params: &str, issue: DateTime<Utc>) -> Self {
        Self {
            version: "1".to_string(),
            status: StatusCode::SUCCESS,
            message: String::new(),
            issue,
            id: format!("{}-1-1", issue.timestamp()),
            url: url.to_string(),
            principal: principal.to_string(),
            auth: "pwd".to_string(),
            sso: Vec::new(),
            life: Some(3600),
            params: params.to_string(),
            kid: None,
        }
    }

    /// An unsuccessful response with `status`.
    #[must_use]
    pub fn failure(status: StatusCode, url: &str, params: &str, issue: DateTime<Utc>) -> Self {
        Self {
            status,
            principal: String::new(),
            auth: String::new(),
            life: None,
            ..Self::success(url, "", params, issue)
        }
    }

    /// Set the protocol version.
    #[must_use]
    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Set the status message.
    #[must_use]
    pub fn message(mut self, message: &str) -> Self {
        self.message = message.to_string();
        self
    }

    /// Set the authentication method used; empty means none.
    #[must_use]
    pub fn auth(mut self, auth: &str) -> Self {
        self.auth = auth.to_string();
        self
    }

    /// Set the methods used earlier in the provider session.
    #[must_use]
    pub fn sso(mut self, sso: &[&str]) -> Self {
        self.sso = sso.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Set the remaining life.
    #[must_use]
    pub const fn life(mut self, life: Option<u64>) -> Self {
        self.life = life;
        self
    }

    /// Sign under a different key id than the signer's own.
    #[must_use]
    pub fn kid(mut self, kid: &str) -> Self {
        self.kid = Some(kid.to_string());
        self
    }

    /// The signed part of the response.
    #[must_use]
    pub fn signed_part(&self) -> String {
        let life = self.life.map(|life| life.to_string()).unwrap_or_default();
        [
            escape(&self.version),
            self.status.to_string(),
            escape(&self.message),
            format_issue_time(self.issue),
            escape(&self.id),
            escape(&self.url),
            escape(&self.principal),
            escape(&self.auth),
            escape(&self.sso.join(",")),
            life,
            escape(&self.params),
        ]
        .join("!")
    }

    /// The complete response without key id or signature.
    #[must_use]
    pub fn unsigned(&self) -> String {
        format!("{}!!", self.signed_part())
    }

    /// The complete response signed by `signer`.
    #[must_use]
    pub fn sign(&self, signer: &TestSigner) -> String {
        let signed = self.signed_part();
        let sig = signer.sign(&signed);
        let kid = self.kid.as_deref().unwrap_or(signer.kid());
        format!("{signed}!{kid}!{sig}")
    }
}

fn escape(field: &str) -> String {
    field.replace('%', "%25").replace('!', "%21")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SignedAssertion;
    use crate::signature::verify;
    use chrono::TimeZone;

    #[test]
    fn signer_reproduces_recorded_signature() {
        let signed = include_str!("../tests/fixtures/response_signed_part.txt");
        let recorded = SignedAssertion::parse(include_str!("../tests/fixtures/response_200.txt"))
            .unwrap()
            .sig
            .unwrap();
        assert_eq!(TestSigner::fixture().sign(signed), recorded);
    }

    #[test]
    fn built_response_parses_and_verifies() {
        let signer = TestSigner::fixture();
        let issue = Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap();
        let raw = ResponseBuilder::success("http://x/a", "al!ce", "n1", issue)
            .sso(&["pwd", "card"])
            .sign(&signer);

        let assertion = SignedAssertion::parse(&raw).unwrap();
        assert_eq!(assertion.principal, "al!ce");
        assert_eq!(assertion.sso.len(), 2);
        assert!(verify(&raw, "2", assertion.sig.as_deref().unwrap(), &signer.keyring()));
    }

    #[test]
    fn unsigned_failure_parses() {
        let issue = Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap();
        let raw = ResponseBuilder::failure(StatusCode::CANCELLED, "http://x/a", "n1", issue).unsigned();
        let assertion = SignedAssertion::parse(&raw).unwrap();
        assert_eq!(assertion.status, StatusCode::CANCELLED);
        assert!(assertion.sig.is_none());
    }
}
