// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Application context: every service the handlers touch, wired once at
//! startup and passed explicitly. No process-wide mutable state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use tracing::info;

use conclave_protocol::{
    generate_dev_quote, AttestationSnapshot, AttestationVerifier, DevAttestationVerifier,
    KeyStore, PolicyAttestationVerifier, SecureChannel,
};

use crate::application::engine::OrchestrationEngine;
use crate::application::intake::DocumentIntake;
use crate::application::package::{CatalogIndex, DataPackageAssembler};
use crate::application::registry::AgentRegistry;
use crate::config::HubConfig;
use crate::domain::transport::PeerTransport;
use crate::infrastructure::cortex::{KeywordCortex, KeywordRouter, PlainTextExtractor};
use crate::infrastructure::transport::HttpPeerTransport;

pub struct AppContext {
    pub config: HubConfig,
    pub keys: Arc<KeyStore>,
    pub channel: Arc<SecureChannel>,
    pub registry: Arc<AgentRegistry>,
    pub engine: Arc<OrchestrationEngine>,
    pub intake: Arc<DocumentIntake>,
    pub transport: Arc<dyn PeerTransport>,
    pub started_at: DateTime<Utc>,
    quote: String,
}

impl AppContext {
    /// Wire all hub services. Key-store unavailability is the only fatal
    /// startup error; everything downstream degrades per-call.
    pub fn initialize(config: HubConfig) -> anyhow::Result<Arc<Self>> {
        let keys = Arc::new(
            KeyStore::load_or_generate(&config.key_dir())
                .context("key store unavailable at startup")?,
        );
        let channel = Arc::new(SecureChannel::new("hub", keys.clone()));

        let verifier: Arc<dyn AttestationVerifier> = if config.development_mode {
            info!("Development mode: accepting any syntactically valid attestation quote");
            Arc::new(DevAttestationVerifier)
        } else {
            Arc::new(PolicyAttestationVerifier::new(load_allow_list(&config)?))
        };

        let registry = Arc::new(AgentRegistry::new(verifier));
        let transport: Arc<dyn PeerTransport> = Arc::new(HttpPeerTransport::from_config(&config));

        let intake = Arc::new(DocumentIntake::new(
            &config.data_root,
            Arc::new(PlainTextExtractor),
            Arc::new(KeywordCortex::new()),
        )?);

        let catalog: Arc<dyn CatalogIndex> = intake.clone();
        let assembler = DataPackageAssembler::new(channel.clone(), catalog);
        let engine = Arc::new(OrchestrationEngine::new(
            registry.clone(),
            transport.clone(),
            Arc::new(KeywordRouter),
            Arc::new(KeywordCortex::new()),
            assembler,
        ));

        let quote = generate_dev_quote(keys.fingerprint());

        Ok(Arc::new(Self {
            config,
            keys,
            channel,
            registry,
            engine,
            intake,
            transport,
            started_at: Utc::now(),
            quote,
        }))
    }

    /// Evidence served from `/attestation` on the secondary port.
    pub fn attestation_snapshot(&self) -> AttestationSnapshot {
        AttestationSnapshot {
            status: "healthy".into(),
            quote: self.quote.clone(),
            public_key_fingerprint: self.keys.fingerprint().to_string(),
            generated_at: Utc::now(),
        }
    }

    pub fn uptime_seconds(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }
}

/// Allow-list for production attestation policy, read from the data root.
/// Absent file means an empty list: quotes pass as long as they carry
/// measurements.
fn load_allow_list(config: &HubConfig) -> anyhow::Result<HashMap<String, HashSet<String>>> {
    let path = config.data_root.join("attestation_allowlist.json");
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}
