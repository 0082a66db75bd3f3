// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Signed (optionally encrypted) envelopes for cross-VM messaging.
//!
//! Every hop between Conclave services travels as a [`WireEnvelope`]: a
//! canonical JSON serialization of the inner [`Envelope`] signed by the
//! sender's Ed25519 key, either attached in the clear or sealed under a
//! per-message AES-256-GCM key. Receivers verify in a fixed order —
//! signature material present, decrypt, re-serialize canonically, check
//! signature, check freshness, check the nonce against the replay window —
//! and any failure maps to one of the [`EnvelopeError`] kinds.

use std::sync::Arc;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::keys::KeyStore;
use crate::replay::ReplayGuard;

/// Freshness window for envelope timestamps; doubles as the replay-cache
/// retention period.
pub const FRESHNESS_WINDOW_SECS: i64 = 300;

const GCM_TAG_LEN: usize = 16;

/// Enumerated message kinds carried by envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    CollaborationRequest,
    CollaborationResponse,
    HealthCheck,
    Error,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CollaborationRequest => "collaboration_request",
            Self::CollaborationResponse => "collaboration_response",
            Self::HealthCheck => "health_check",
            Self::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// The inner, signed unit of exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender_id: String,
    pub recipient_id: String,
    pub message_type: MessageKind,
    pub timestamp: DateTime<Utc>,
    /// Hex encoding of 16 random bytes, unique per message.
    pub nonce: String,
    pub payload: Value,
}

/// Self-contained AES-256-GCM ciphertext record. All fields base64.
///
/// The symmetric key rides inside the record; a deployment that wraps it to
/// the recipient's public key replaces only this struct's `key` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CipherBlob {
    pub key: String,
    pub iv: String,
    pub ciphertext: String,
    pub tag: String,
}

/// The on-the-wire shape of a secure message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEnvelope {
    pub encrypted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_payload: Option<String>,
    pub signature: String,
    pub sender_public_key: String,
    pub sender_fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("Envelope is missing signature or sender public key")]
    MissingSignature,

    #[error("Envelope signature does not verify under the advertised key")]
    SignatureInvalid,

    #[error("Envelope timestamp is outside the freshness window")]
    Stale,

    #[error("Envelope nonce was already accepted from this sender")]
    Replay,

    #[error("Envelope payload failed to decrypt")]
    DecryptFailed,

    #[error("Malformed envelope: {0}")]
    Malformed(String),
}

impl EnvelopeError {
    /// Stable error kind surfaced at service boundaries.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingSignature | Self::SignatureInvalid => "envelope_signature_invalid",
            Self::Stale => "envelope_stale",
            Self::Replay => "envelope_replay",
            Self::DecryptFailed => "envelope_decrypt_failed",
            Self::Malformed(_) => "bad_request",
        }
    }
}

/// Canonical serialization: JSON with lexicographically sorted keys at every
/// level. `serde_json::Map` is BTreeMap-backed, so a round-trip through
/// `Value` yields the sorted form.
pub fn canonical_bytes(value: &Value) -> Result<Vec<u8>, EnvelopeError> {
    serde_json::to_vec(value).map_err(|e| EnvelopeError::Malformed(e.to_string()))
}

fn fresh_nonce() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Builds and verifies envelopes on behalf of one local identity.
pub struct SecureChannel {
    local_id: String,
    keys: Arc<KeyStore>,
    replay: ReplayGuard,
    freshness: Duration,
}

impl SecureChannel {
    pub fn new(local_id: impl Into<String>, keys: Arc<KeyStore>) -> Self {
        let freshness = Duration::seconds(FRESHNESS_WINDOW_SECS);
        Self {
            local_id: local_id.into(),
            keys,
            replay: ReplayGuard::new(freshness),
            freshness,
        }
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Compose, sign, and optionally encrypt a message for `recipient_id`.
    ///
    /// Encryption is applied when the recipient's public key is known; the
    /// wire shape is identical for the receiver either way.
    pub fn seal(
        &self,
        recipient_id: &str,
        kind: MessageKind,
        payload: Value,
        recipient_public_key: Option<&str>,
    ) -> Result<WireEnvelope, EnvelopeError> {
        let envelope = Envelope {
            sender_id: self.local_id.clone(),
            recipient_id: recipient_id.to_string(),
            message_type: kind,
            timestamp: Utc::now(),
            nonce: fresh_nonce(),
            payload,
        };

        let value =
            serde_json::to_value(&envelope).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        let canonical = canonical_bytes(&value)?;
        let signature = self.keys.sign(&canonical);

        let wire = if recipient_public_key.is_some() {
            WireEnvelope {
                encrypted: true,
                message: None,
                encrypted_payload: Some(encrypt_payload(&canonical)?),
                signature,
                sender_public_key: self.keys.public_key_pem().to_string(),
                sender_fingerprint: self.keys.fingerprint().to_string(),
            }
        } else {
            WireEnvelope {
                encrypted: false,
                message: Some(value),
                encrypted_payload: None,
                signature,
                sender_public_key: self.keys.public_key_pem().to_string(),
                sender_fingerprint: self.keys.fingerprint().to_string(),
            }
        };

        debug!(recipient = recipient_id, kind = %kind, encrypted = wire.encrypted, "Sealed envelope");
        Ok(wire)
    }

    /// Verify an incoming wire envelope and return the inner message.
    ///
    /// Steps run in a fixed order and the first failure wins; the replay
    /// window is only touched by envelopes that pass every earlier check.
    pub fn open(&self, wire: &WireEnvelope) -> Result<Envelope, EnvelopeError> {
        if wire.signature.is_empty() || wire.sender_public_key.is_empty() {
            return Err(EnvelopeError::MissingSignature);
        }

        let value: Value = if wire.encrypted {
            let blob = wire
                .encrypted_payload
                .as_ref()
                .ok_or_else(|| EnvelopeError::Malformed("encrypted without payload".into()))?;
            let plaintext = decrypt_payload(blob)?;
            serde_json::from_slice(&plaintext)
                .map_err(|e| EnvelopeError::Malformed(e.to_string()))?
        } else {
            wire.message
                .clone()
                .ok_or_else(|| EnvelopeError::Malformed("missing message content".into()))?
        };

        let canonical = canonical_bytes(&value)?;
        if !KeyStore::verify(&canonical, &wire.signature, &wire.sender_public_key) {
            return Err(EnvelopeError::SignatureInvalid);
        }

        let envelope: Envelope =
            serde_json::from_value(value).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;

        let age = Utc::now().signed_duration_since(envelope.timestamp);
        if age.num_seconds().abs() > self.freshness.num_seconds() {
            return Err(EnvelopeError::Stale);
        }

        if envelope.nonce.is_empty() {
            return Err(EnvelopeError::Malformed("missing nonce".into()));
        }
        if !self.replay.accept(&envelope.sender_id, &envelope.nonce) {
            return Err(EnvelopeError::Replay);
        }

        debug!(sender = %envelope.sender_id, kind = %envelope.message_type, "Verified envelope");
        Ok(envelope)
    }
}

fn encrypt_payload(plaintext: &[u8]) -> Result<String, EnvelopeError> {
    let mut key_bytes = [0u8; 32];
    OsRng.fill_bytes(&mut key_bytes);
    let mut iv = [0u8; 12];
    OsRng.fill_bytes(&mut iv);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    let sealed = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| EnvelopeError::Malformed("encryption failed".into()))?;

    let (ciphertext, tag) = sealed.split_at(sealed.len() - GCM_TAG_LEN);
    let blob = CipherBlob {
        key: STANDARD.encode(key_bytes),
        iv: STANDARD.encode(iv),
        ciphertext: STANDARD.encode(ciphertext),
        tag: STANDARD.encode(tag),
    };
    let blob_json =
        serde_json::to_vec(&blob).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
    Ok(STANDARD.encode(blob_json))
}

fn decrypt_payload(encrypted_payload: &str) -> Result<Vec<u8>, EnvelopeError> {
    let blob_json = STANDARD
        .decode(encrypted_payload)
        .map_err(|_| EnvelopeError::DecryptFailed)?;
    let blob: CipherBlob =
        serde_json::from_slice(&blob_json).map_err(|_| EnvelopeError::DecryptFailed)?;

    let key = STANDARD
        .decode(&blob.key)
        .map_err(|_| EnvelopeError::DecryptFailed)?;
    let iv = STANDARD
        .decode(&blob.iv)
        .map_err(|_| EnvelopeError::DecryptFailed)?;
    let mut sealed = STANDARD
        .decode(&blob.ciphertext)
        .map_err(|_| EnvelopeError::DecryptFailed)?;
    let mut tag = STANDARD
        .decode(&blob.tag)
        .map_err(|_| EnvelopeError::DecryptFailed)?;
    sealed.append(&mut tag);

    if key.len() != 32 || iv.len() != 12 {
        return Err(EnvelopeError::DecryptFailed);
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    cipher
        .decrypt(Nonce::from_slice(&iv), sealed.as_ref())
        .map_err(|_| EnvelopeError::DecryptFailed)
}
