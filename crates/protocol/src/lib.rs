// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # conclave-protocol
//!
//! The shared coordination substrate for the Conclave federation: the
//! long-lived signing identity each service holds, the attestation evidence
//! exchanged at admission, and the signed (optionally encrypted) envelope
//! every cross-VM hop travels in.
//!
//! ## Modules
//!
//! | Module | Responsibility |
//! |---|---|
//! | [`identity`] | Enumerated agent kinds and their well-known ports |
//! | [`keys`] | Ed25519 signing pair: generate/load, PEM export, fingerprint, sign/verify |
//! | [`attestation`] | Quote parsing and measurement policy (dev + allow-list verifiers) |
//! | [`envelope`] | Envelope build/verify: canonical serialization, AES-256-GCM, freshness |
//! | [`replay`] | Sliding-window `(sender, nonce)` replay defense |
//! | [`handler`] | Per-kind message handler registry with uniform signature |

pub mod attestation;
pub mod envelope;
pub mod handler;
pub mod identity;
pub mod keys;
pub mod replay;

pub use attestation::{
    generate_dev_quote, generate_quote, AttestationError, AttestationSnapshot,
    AttestationVerifier, DevAttestationVerifier, Measurements, PolicyAttestationVerifier,
};
pub use envelope::{
    canonical_bytes, CipherBlob, Envelope, EnvelopeError, MessageKind, SecureChannel,
    WireEnvelope, FRESHNESS_WINDOW_SECS,
};
pub use handler::{HandlerError, HandlerRegistry, MessageHandler};
pub use identity::AgentKind;
pub use keys::{KeyStore, KeyStoreError};
pub use replay::ReplayGuard;
