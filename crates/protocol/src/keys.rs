// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Long-lived Ed25519 signing identity for a Conclave component.
//!
//! Every hub and spoke process owns exactly one signing pair. The private key
//! is persisted as PKCS#8 PEM under the component's key directory; the public
//! half travels inside envelopes and registration requests as SPKI PEM. The
//! fingerprint (hex SHA-256 of the raw public key bytes) is the stable short
//! identity peers log and compare.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey},
    Signature, Signer, SigningKey, Verifier, VerifyingKey,
};
use pkcs8::LineEnding;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use tracing::info;

const SIGNING_KEY_FILE: &str = "signing.pem";

#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("No key material at {0}")]
    MissingKeyMaterial(PathBuf),

    #[error("Failed to read key material: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid key encoding: {0}")]
    InvalidEncoding(String),
}

/// Holds the process signing pair and exposes sign/verify primitives.
pub struct KeyStore {
    signing_key: SigningKey,
    public_key_pem: String,
    fingerprint: String,
}

impl KeyStore {
    /// Load the signing pair from `key_dir`, surfacing missing material so
    /// the caller can decide to generate instead.
    pub fn load(key_dir: &Path) -> Result<Self, KeyStoreError> {
        let path = key_dir.join(SIGNING_KEY_FILE);
        if !path.exists() {
            return Err(KeyStoreError::MissingKeyMaterial(path));
        }

        let pem = std::fs::read_to_string(&path)?;
        let signing_key = SigningKey::from_pkcs8_pem(&pem)
            .map_err(|e| KeyStoreError::InvalidEncoding(e.to_string()))?;

        Self::from_signing_key(signing_key)
    }

    /// Generate a fresh pair and persist it under `key_dir`.
    pub fn generate(key_dir: &Path) -> Result<Self, KeyStoreError> {
        std::fs::create_dir_all(key_dir)?;

        let signing_key = SigningKey::generate(&mut OsRng);
        let pem = signing_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| KeyStoreError::InvalidEncoding(e.to_string()))?;
        std::fs::write(key_dir.join(SIGNING_KEY_FILE), pem.as_bytes())?;

        let store = Self::from_signing_key(signing_key)?;
        info!(fingerprint = %store.fingerprint, "Generated new signing pair");
        Ok(store)
    }

    /// Startup path: reuse persisted material when present, generate otherwise.
    pub fn load_or_generate(key_dir: &Path) -> Result<Self, KeyStoreError> {
        match Self::load(key_dir) {
            Ok(store) => {
                info!(fingerprint = %store.fingerprint, "Loaded signing pair");
                Ok(store)
            }
            Err(KeyStoreError::MissingKeyMaterial(_)) => Self::generate(key_dir),
            Err(e) => Err(e),
        }
    }

    fn from_signing_key(signing_key: SigningKey) -> Result<Self, KeyStoreError> {
        let verifying_key = signing_key.verifying_key();
        let public_key_pem = verifying_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| KeyStoreError::InvalidEncoding(e.to_string()))?;
        let fingerprint = hex::encode(Sha256::digest(verifying_key.as_bytes()));

        Ok(Self {
            signing_key,
            public_key_pem,
            fingerprint,
        })
    }

    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    /// Hex SHA-256 of the raw public key bytes.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Sign arbitrary bytes, returning the signature base64-encoded.
    pub fn sign(&self, bytes: &[u8]) -> String {
        let signature = self.signing_key.sign(bytes);
        STANDARD.encode(signature.to_bytes())
    }

    /// Verify `signature_b64` over `bytes` under a peer's SPKI PEM public key.
    ///
    /// A failed verification is an expected outcome, not an error; malformed
    /// keys or signatures also report `false`.
    pub fn verify(bytes: &[u8], signature_b64: &str, sender_pem: &str) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_public_key_pem(sender_pem) else {
            return false;
        };
        let Ok(decoded) = STANDARD.decode(signature_b64) else {
            return false;
        };
        let sig_bytes: [u8; 64] = match decoded.try_into() {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };

        verifying_key
            .verify(bytes, &Signature::from_bytes(&sig_bytes))
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();

        let generated = KeyStore::generate(dir.path()).unwrap();
        let loaded = KeyStore::load(dir.path()).unwrap();

        assert_eq!(generated.fingerprint(), loaded.fingerprint());
        assert_eq!(generated.public_key_pem(), loaded.public_key_pem());
    }

    #[test]
    fn test_load_missing_material_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            KeyStore::load(dir.path()),
            Err(KeyStoreError::MissingKeyMaterial(_))
        ));

        // load_or_generate recovers by generating
        let store = KeyStore::load_or_generate(dir.path()).unwrap();
        assert_eq!(store.fingerprint().len(), 64);
    }

    #[test]
    fn test_sign_verify() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::generate(dir.path()).unwrap();

        let signature = store.sign(b"payload bytes");
        assert!(KeyStore::verify(
            b"payload bytes",
            &signature,
            store.public_key_pem()
        ));
        assert!(!KeyStore::verify(
            b"tampered bytes",
            &signature,
            store.public_key_pem()
        ));
    }

    #[test]
    fn test_verify_wrong_key_fails() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let alice = KeyStore::generate(dir_a.path()).unwrap();
        let mallory = KeyStore::generate(dir_b.path()).unwrap();

        let signature = alice.sign(b"hello");
        assert!(!KeyStore::verify(
            b"hello",
            &signature,
            mallory.public_key_pem()
        ));
    }

    #[test]
    fn test_verify_garbage_inputs_report_false() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::generate(dir.path()).unwrap();

        assert!(!KeyStore::verify(b"x", "not-base64!!", store.public_key_pem()));
        assert!(!KeyStore::verify(b"x", &store.sign(b"x"), "not a pem"));
    }
}
