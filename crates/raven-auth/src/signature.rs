//! Response signature verification.
//!
//! The provider signs the response up to and including the `params` field
//! with RSA over a SHA-1 digest (PKCS#1 v1.5), then base64-encodes the
//! signature with a transport-safe alphabet: `+` becomes `-`, `/` becomes
//! `.` and the `=` padding becomes `_`.

use std::fmt;
use std::path::Path;

use base64::prelude::*;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha1::Sha1;

use crate::error::{AuthError, Result};
use crate::keyring::Keyring;

/// Digest algorithms a response may be signed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    /// SHA-1, the only digest protocol version 1 uses.
    Sha1,
}

/// A public key able to check response signatures.
///
/// Implementations must be cheap to share; the keyring hands out the same
/// instance to every concurrent verification.
pub trait VerificationKey: Send + Sync {
    /// Check `signature` over `signed` using `digest`.
    ///
    /// Returns `false` for any failure, including digests the key does not
    /// support.
    fn verify(&self, digest: DigestAlgorithm, signature: &[u8], signed: &[u8]) -> bool;
}

/// An RSA public key.
#[derive(Clone)]
pub struct RsaVerificationKey {
    key: RsaPublicKey,
}

impl RsaVerificationKey {
    /// Wrap an RSA public key.
    #[must_use]
    pub const fn new(key: RsaPublicKey) -> Self {
        Self { key }
    }

    /// Parse an ASCII-armored key, either `BEGIN PUBLIC KEY` (SPKI) or
    /// `BEGIN RSA PUBLIC KEY` (PKCS#1).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidKey` if the text holds neither form.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let pem = pem.trim();
        let key = if pem.starts_with("-----BEGIN RSA PUBLIC KEY-----") {
            RsaPublicKey::from_pkcs1_pem(pem).map_err(|e| AuthError::InvalidKey(e.to_string()))?
        } else {
            RsaPublicKey::from_public_key_pem(pem)
                .map_err(|e| AuthError::InvalidKey(e.to_string()))?
        };
        Ok(Self::new(key))
    }

    /// Read and parse an ASCII-armored key file.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyFile` if the file cannot be read and
    /// `AuthError::InvalidKey` if it does not hold an RSA public key.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pem = std::fs::read_to_string(path).map_err(|source| AuthError::KeyFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_pem(&pem)
    }
}

impl fmt::Debug for RsaVerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use rsa::traits::PublicKeyParts;

        f.debug_struct("RsaVerificationKey")
            .field("bits", &self.key.size().saturating_mul(8))
            .finish()
    }
}

impl VerificationKey for RsaVerificationKey {
    fn verify(&self, digest: DigestAlgorithm, signature: &[u8], signed: &[u8]) -> bool {
        match digest {
            DigestAlgorithm::Sha1 => {
                let Ok(signature) = Signature::try_from(signature) else {
                    return false;
                };
                VerifyingKey::<Sha1>::new(self.key.clone())
                    .verify(signed, &signature)
                    .is_ok()
            }
        }
    }
}

/// Decode a signature from the transport alphabet.
///
/// # Errors
///
/// Returns `AuthError::InvalidSignatureEncoding` if the translated text is not
/// standard base64.
pub fn decode_signature(sig: &str) -> Result<Vec<u8>> {
    let standard: String = sig
        .chars()
        .map(|c| match c {
            '-' => '+',
            '.' => '/',
            '_' => '=',
            other => other,
        })
        .collect();
    BASE64_STANDARD
        .decode(standard)
        .map_err(|e| AuthError::InvalidSignatureEncoding(e.to_string()))
}

/// Encode raw signature bytes in the transport alphabet.
#[must_use]
pub fn encode_signature(signature: &[u8]) -> String {
    BASE64_STANDARD
        .encode(signature)
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '.',
            '=' => '_',
            other => other,
        })
        .collect()
}

/// The signed portion of a raw response: everything before the last two
/// `!`-separated fields.
///
/// Returns `None` if the response has fewer than three fields.
#[must_use]
pub fn signed_bytes(raw: &str) -> Option<&str> {
    let mut parts = raw.rsplitn(3, '!');
    let _sig = parts.next()?;
    let _kid = parts.next()?;
    parts.next()
}

/// Verify a raw response against the key named by `kid`.
///
/// An unknown `kid`, an undecodable signature and a signature that does not
/// verify all return `false`.
#[must_use]
pub fn verify(raw: &str, kid: &str, sig: &str, keyring: &Keyring) -> bool {
    let Some(key) = keyring.get(kid) else {
        tracing::debug!(kid, "No verification key for key id");
        return false;
    };
    let Some(signed) = signed_bytes(raw) else {
        return false;
    };
    match decode_signature(sig) {
        Ok(signature) => key.verify(DigestAlgorithm::Sha1, &signature, signed.as_bytes()),
        Err(e) => {
            tracing::debug!(error = %e, "Undecodable signature");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SignedAssertion;

    const PUBKEY_SPKI: &str = include_str!("../tests/fixtures/pubkey2.pem");
    const PUBKEY_PKCS1: &str = include_str!("../tests/fixtures/pubkey2_pkcs1.pem");
    const FIXTURE_200: &str = include_str!("../tests/fixtures/response_200.txt");

    fn keyring() -> Keyring {
        let mut keyring = Keyring::new();
        keyring.insert("2", RsaVerificationKey::from_pem(PUBKEY_SPKI).unwrap());
        keyring
    }

    fn fixture_parts() -> (String, String) {
        let assertion = SignedAssertion::parse(FIXTURE_200).unwrap();
        (assertion.kid.unwrap(), assertion.sig.unwrap())
    }

    #[test]
    fn recorded_response_verifies() {
        let (kid, sig) = fixture_parts();
        assert!(verify(FIXTURE_200, &kid, &sig, &keyring()));
    }

    #[test]
    fn pkcs1_key_verifies_too() {
        let mut keyring = Keyring::new();
        keyring.insert("2", RsaVerificationKey::from_pem(PUBKEY_PKCS1).unwrap());
        let (kid, sig) = fixture_parts();
        assert!(verify(FIXTURE_200, &kid, &sig, &keyring));
    }

    #[test]
    fn unknown_kid_fails() {
        let (_, sig) = fixture_parts();
        assert!(!verify(FIXTURE_200, "99", &sig, &keyring()));
    }

    #[test]
    fn every_single_bit_flip_in_signed_part_fails() {
        let (kid, sig) = fixture_parts();
        let keyring = keyring();
        let signed = signed_bytes(FIXTURE_200).unwrap();
        let suffix = &FIXTURE_200[signed.len()..];

        for index in 0..signed.len() {
            for bit in 0..7 {
                let mut bytes = signed.as_bytes().to_vec();
                bytes[index] ^= 1 << bit;
                let Ok(mutated) = String::from_utf8(bytes) else {
                    continue;
                };
                let raw = format!("{mutated}{suffix}");
                assert!(
                    !verify(&raw, &kid, &sig, &keyring),
                    "bit {bit} of byte {index} flipped but signature verified"
                );
            }
        }
    }

    #[test]
    fn tampered_signature_fails() {
        let (kid, sig) = fixture_parts();
        let mut bytes = decode_signature(&sig).unwrap();
        bytes[10] ^= 0x01;
        let tampered = encode_signature(&bytes);
        assert!(!verify(FIXTURE_200, &kid, &tampered, &keyring()));
    }

    #[test]
    fn transport_alphabet_is_a_bijection() {
        let bytes: Vec<u8> = (0..=255).collect();
        let encoded = encode_signature(&bytes);
        assert!(!encoded.contains(['+', '/', '=']));
        assert_eq!(decode_signature(&encoded).unwrap(), bytes);

        // One and two bytes of padding.
        assert_eq!(encode_signature(&[0xfb]), "-w__");
        assert_eq!(encode_signature(&[0xff, 0xff]), "..8_");
        assert_eq!(decode_signature("-w__").unwrap(), vec![0xfb]);
    }

    #[test]
    fn invalid_encoding_is_an_error() {
        assert!(matches!(
            decode_signature("not base64!"),
            Err(AuthError::InvalidSignatureEncoding(_))
        ));
    }

    #[test]
    fn signed_bytes_strips_two_fields() {
        assert_eq!(signed_bytes("a!b!c!kid!sig"), Some("a!b!c"));
        assert_eq!(signed_bytes("a!!"), Some("a"));
        assert_eq!(signed_bytes("kid!sig"), None);
    }

    #[test]
    fn rejects_non_rsa_text() {
        assert!(matches!(
            RsaVerificationKey::from_pem("-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----"),
            Err(AuthError::InvalidKey(_))
        ));
    }
}
