// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Attestation evidence and its verification policy.
//!
//! Evidence is an opaque base64 blob carrying a measurement report. The
//! verifier parses it, extracts the measurement map, and checks it against
//! policy. Two policies ship: a development policy that accepts any
//! syntactically valid quote, and an allow-list policy for production.
//! Provenance of the report chain is out of scope; the registry only needs
//! the measurements back so it can store them with the admitted record.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Measurement map extracted from a quote, keyed by register name.
pub type Measurements = BTreeMap<String, String>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AttestationError {
    #[error("Quote is not valid base64")]
    NotBase64,

    #[error("Quote payload is not a valid report: {0}")]
    MalformedReport(String),

    #[error("Measurement {register} = {value} is not in the allow-list")]
    MeasurementRejected { register: String, value: String },

    #[error("Quote carries no measurements")]
    NoMeasurements,
}

/// The parsed interior of a quote blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteReport {
    pub format: String,
    pub measurements: Measurements,
    pub issued_at: DateTime<Utc>,
    /// Fingerprint of the key the quote binds to.
    pub key_fingerprint: String,
}

/// Snapshot served from a component's `/attestation` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationSnapshot {
    pub status: String,
    pub quote: String,
    pub public_key_fingerprint: String,
    pub generated_at: DateTime<Utc>,
}

/// Verifies a peer's attestation quote and exposes its measurements.
#[async_trait]
pub trait AttestationVerifier: Send + Sync {
    async fn verify_quote(&self, quote: &str) -> Result<Measurements, AttestationError>;
}

fn parse_quote(quote: &str) -> Result<QuoteReport, AttestationError> {
    let raw = STANDARD
        .decode(quote.trim())
        .map_err(|_| AttestationError::NotBase64)?;
    serde_json::from_slice(&raw).map_err(|e| AttestationError::MalformedReport(e.to_string()))
}

/// Development policy: any syntactically valid quote passes. Quotes with an
/// empty measurement map get synthetic measurements so downstream records
/// still carry something inspectable.
pub struct DevAttestationVerifier;

#[async_trait]
impl AttestationVerifier for DevAttestationVerifier {
    async fn verify_quote(&self, quote: &str) -> Result<Measurements, AttestationError> {
        let report = parse_quote(quote)?;
        if !report.measurements.is_empty() {
            return Ok(report.measurements);
        }

        let mut synthetic = Measurements::new();
        synthetic.insert("mr_enclave".into(), format!("dev-{}", report.key_fingerprint));
        synthetic.insert("mr_signer".into(), "dev-signer".into());
        Ok(synthetic)
    }
}

/// Production policy: every measurement register named in the allow-list must
/// be present in the quote with an allowed value.
pub struct PolicyAttestationVerifier {
    allowed: HashMap<String, HashSet<String>>,
}

impl PolicyAttestationVerifier {
    pub fn new(allowed: HashMap<String, HashSet<String>>) -> Self {
        Self { allowed }
    }
}

#[async_trait]
impl AttestationVerifier for PolicyAttestationVerifier {
    async fn verify_quote(&self, quote: &str) -> Result<Measurements, AttestationError> {
        let report = parse_quote(quote)?;
        if report.measurements.is_empty() {
            return Err(AttestationError::NoMeasurements);
        }

        for (register, values) in &self.allowed {
            let observed = report.measurements.get(register).ok_or_else(|| {
                AttestationError::MeasurementRejected {
                    register: register.clone(),
                    value: "<absent>".into(),
                }
            })?;
            if !values.contains(observed) {
                return Err(AttestationError::MeasurementRejected {
                    register: register.clone(),
                    value: observed.clone(),
                });
            }
        }

        Ok(report.measurements)
    }
}

/// Produce a development-mode quote binding to `key_fingerprint`.
pub fn generate_dev_quote(key_fingerprint: &str) -> String {
    let report = json!({
        "format": "conclave-dev",
        "measurements": {},
        "issued_at": Utc::now(),
        "key_fingerprint": key_fingerprint,
    });
    STANDARD.encode(report.to_string())
}

/// Produce a quote with explicit measurements (used by production spokes
/// whose runtime supplies real register values).
pub fn generate_quote(key_fingerprint: &str, measurements: &Measurements) -> String {
    let report = json!({
        "format": "conclave",
        "measurements": measurements,
        "issued_at": Utc::now(),
        "key_fingerprint": key_fingerprint,
    });
    STANDARD.encode(report.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dev_verifier_accepts_dev_quote() {
        let quote = generate_dev_quote("abc123");
        let measurements = DevAttestationVerifier.verify_quote(&quote).await.unwrap();

        assert_eq!(
            measurements.get("mr_enclave"),
            Some(&"dev-abc123".to_string())
        );
    }

    #[tokio::test]
    async fn test_dev_verifier_rejects_garbage() {
        assert!(matches!(
            DevAttestationVerifier.verify_quote("!!!not-base64").await,
            Err(AttestationError::NotBase64)
        ));

        let not_a_report = STANDARD.encode("plain text");
        assert!(matches!(
            DevAttestationVerifier.verify_quote(&not_a_report).await,
            Err(AttestationError::MalformedReport(_))
        ));
    }

    #[tokio::test]
    async fn test_policy_verifier_allow_list() {
        let mut measurements = Measurements::new();
        measurements.insert("mr_enclave".into(), "aaaa".into());
        let quote = generate_quote("fp", &measurements);

        let mut allowed = HashMap::new();
        allowed.insert(
            "mr_enclave".to_string(),
            HashSet::from(["aaaa".to_string()]),
        );
        let verifier = PolicyAttestationVerifier::new(allowed);
        assert!(verifier.verify_quote(&quote).await.is_ok());

        let mut disallowed = HashMap::new();
        disallowed.insert(
            "mr_enclave".to_string(),
            HashSet::from(["bbbb".to_string()]),
        );
        let verifier = PolicyAttestationVerifier::new(disallowed);
        assert!(matches!(
            verifier.verify_quote(&quote).await,
            Err(AttestationError::MeasurementRejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_policy_verifier_requires_measurements() {
        let quote = generate_dev_quote("fp");
        let verifier = PolicyAttestationVerifier::new(HashMap::new());

        assert!(matches!(
            verifier.verify_quote(&quote).await,
            Err(AttestationError::NoMeasurements)
        ));
    }
}
