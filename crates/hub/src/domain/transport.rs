// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Transport seam between the engine and spoke VMs.
//!
//! The engine only ever sees this trait; the HTTP connector lives in
//! `infrastructure::transport`. Injection at construction breaks the
//! orchestration ↔ transport ↔ registry cycle.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::agent::AgentKind;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Agent VM {0} not configured")]
    NotConfigured(String),

    #[error("Timeout communicating with {0} VM")]
    Timeout(String),

    #[error("Agent VM returned {code}: {body}")]
    HttpStatus { code: u16, body: String },

    #[error("Failed to reach agent VM: {cause}")]
    Unreachable { cause: String },
}

/// Probe verdict for one configured peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    pub status: String,
    pub endpoint: String,
    #[serde(default)]
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub detail: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Request/response delivery to spoke VMs with bounded timeouts.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// POST a work payload to the peer of the given kind.
    async fn send(
        &self,
        kind: AgentKind,
        payload: Value,
        timeout: Duration,
    ) -> Result<Value, TransportError>;

    /// Probe every configured peer's health endpoint (10 s budget each).
    async fn probe_all(&self) -> BTreeMap<String, ProbeReport>;

    /// Fan a payload out to all configured peers in parallel.
    async fn broadcast(&self, payload: Value) -> BTreeMap<String, Result<Value, TransportError>>;

    fn configured_kinds(&self) -> Vec<AgentKind>;
}
