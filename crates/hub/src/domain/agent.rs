// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Registry-side agent model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use conclave_protocol::Measurements;

pub use conclave_protocol::AgentKind;

/// Admission status. Monotone from `Verified` towards `Inactive`/`Failed`
/// until a re-registration replaces the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Verified,
    Unverified,
    Inactive,
    Failed,
}

/// A registered agent, scoped to its owning client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub agent_id: String,
    pub agent_type: AgentKind,
    pub capabilities: Vec<String>,
    pub endpoint: String,
    pub attestation_endpoint: String,
    pub public_key: String,
    pub attestation_quote: String,
    pub status: AgentStatus,
    pub registered_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub client_id: String,
    #[serde(default)]
    pub measurements: Measurements,
}

/// Attestation material carried by a registration request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttestationData {
    #[serde(default)]
    pub quote: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
}

/// Registration request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistration {
    pub agent_id: String,
    pub agent_type: AgentKind,
    #[serde(default)]
    pub capabilities: Vec<String>,
    pub endpoint: String,
    pub attestation_endpoint: String,
    #[serde(default)]
    pub attestation_data: AttestationData,
}

/// Successful admission acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationAck {
    pub status: String,
    pub verification_status: String,
    pub agent_id: String,
    pub measurements: Measurements,
}

/// Directory view of a verified agent with a derived liveness flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub agent_id: String,
    pub agent_type: AgentKind,
    pub capabilities: Vec<String>,
    pub endpoint: String,
    pub status: String,
}

/// One agent's slot in a health bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHealthInfo {
    pub agent_id: String,
    pub agent_type: AgentKind,
    pub last_seen: DateTime<Utc>,
}

/// Liveness sweep output: healthy < 5 min, unhealthy < 15 min, the rest
/// inactive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthBuckets {
    pub healthy: Vec<AgentHealthInfo>,
    pub unhealthy: Vec<AgentHealthInfo>,
    pub inactive: Vec<AgentHealthInfo>,
}

/// Heartbeat body posted by spokes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub agent_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}
