// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Attestation-gated agent registry.
//!
//! Records are keyed `(client_id, agent_id)`; every lookup scopes by client
//! and cross-client lookups report not-found. Admission requires a quote and
//! a public key that pass the injected [`AttestationVerifier`]; a rejection
//! persists nothing. Liveness is heartbeat-driven: the sweep buckets agents
//! by idle time and transitions the long-idle to `Inactive`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{info, warn};

use conclave_protocol::AttestationVerifier;

use crate::domain::agent::{
    AgentHealthInfo, AgentRecord, AgentRegistration, AgentStatus, DirectoryEntry, HealthBuckets,
    RegistrationAck,
};
use crate::error::HubError;

const ONLINE_WINDOW_MINUTES: i64 = 5;
const INACTIVE_THRESHOLD_MINUTES: i64 = 15;

pub struct AgentRegistry {
    verifier: Arc<dyn AttestationVerifier>,
    agents: DashMap<String, HashMap<String, AgentRecord>>,
}

impl AgentRegistry {
    pub fn new(verifier: Arc<dyn AttestationVerifier>) -> Self {
        Self {
            verifier,
            agents: DashMap::new(),
        }
    }

    /// Admit an agent after attestation verification. A verifier rejection is
    /// a clean failure: nothing is persisted and the reason is surfaced.
    pub async fn register(
        &self,
        registration: AgentRegistration,
        client_id: &str,
    ) -> Result<RegistrationAck, HubError> {
        let quote = registration
            .attestation_data
            .quote
            .clone()
            .filter(|q| !q.is_empty())
            .ok_or_else(|| HubError::AttestationFailed("Missing attestation quote".into()))?;
        let public_key = registration
            .attestation_data
            .public_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| HubError::AttestationFailed("Missing public key".into()))?;

        let measurements = self.verifier.verify_quote(&quote).await.map_err(|e| {
            warn!(agent_id = %registration.agent_id, client_id, error = %e, "Attestation rejected");
            HubError::AttestationFailed(e.to_string())
        })?;

        let now = Utc::now();
        let record = AgentRecord {
            agent_id: registration.agent_id.clone(),
            agent_type: registration.agent_type,
            capabilities: registration.capabilities,
            endpoint: registration.endpoint,
            attestation_endpoint: registration.attestation_endpoint,
            public_key,
            attestation_quote: quote,
            status: AgentStatus::Verified,
            registered_at: now,
            last_seen: now,
            client_id: client_id.to_string(),
            measurements: measurements.clone(),
        };

        self.agents
            .entry(client_id.to_string())
            .or_default()
            .insert(registration.agent_id.clone(), record);

        info!(agent_id = %registration.agent_id, client_id, "Agent registered");

        Ok(RegistrationAck {
            status: "registered".into(),
            verification_status: "verified".into(),
            agent_id: registration.agent_id,
            measurements,
        })
    }

    /// Client-scoped lookup; the only sanctioned read path.
    pub fn get_agent(&self, agent_id: &str, client_id: &str) -> Option<AgentRecord> {
        self.agents
            .get(client_id)
            .and_then(|scope| scope.get(agent_id).cloned())
    }

    pub fn all_agents(&self, client_id: &str) -> Vec<AgentRecord> {
        self.agents
            .get(client_id)
            .map(|scope| scope.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn verified_agents(&self, client_id: &str) -> Vec<AgentRecord> {
        let mut agents: Vec<AgentRecord> = self
            .all_agents(client_id)
            .into_iter()
            .filter(|a| a.status == AgentStatus::Verified)
            .collect();
        agents.sort_by(|a, b| {
            a.registered_at
                .cmp(&b.registered_at)
                .then_with(|| a.agent_id.cmp(&b.agent_id))
        });
        agents
    }

    pub fn agents_by_capability(&self, capability: &str, client_id: &str) -> Vec<AgentRecord> {
        self.verified_agents(client_id)
            .into_iter()
            .filter(|a| a.capabilities.iter().any(|c| c == capability))
            .collect()
    }

    /// Refresh last-seen, only when the record exists for that client.
    pub fn update_heartbeat(&self, agent_id: &str, client_id: &str) -> bool {
        match self.agents.get_mut(client_id) {
            Some(mut scope) => match scope.get_mut(agent_id) {
                Some(record) => {
                    record.last_seen = Utc::now();
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    pub fn check_agent_health(&self, client_id: &str) -> HealthBuckets {
        self.check_agent_health_at(client_id, Utc::now())
    }

    /// Bucket agents by idle time and transition the long-idle to `Inactive`.
    pub fn check_agent_health_at(&self, client_id: &str, now: DateTime<Utc>) -> HealthBuckets {
        let mut buckets = HealthBuckets::default();
        let Some(mut scope) = self.agents.get_mut(client_id) else {
            return buckets;
        };

        for record in scope.values_mut() {
            let idle = now.signed_duration_since(record.last_seen);
            let info = AgentHealthInfo {
                agent_id: record.agent_id.clone(),
                agent_type: record.agent_type,
                last_seen: record.last_seen,
            };
            if idle < Duration::minutes(ONLINE_WINDOW_MINUTES) {
                buckets.healthy.push(info);
            } else if idle < Duration::minutes(INACTIVE_THRESHOLD_MINUTES) {
                buckets.unhealthy.push(info);
            } else {
                buckets.inactive.push(info);
                if record.status == AgentStatus::Verified {
                    info!(agent_id = %record.agent_id, client_id, "Agent marked inactive");
                    record.status = AgentStatus::Inactive;
                }
            }
        }

        buckets
    }

    pub fn directory(&self, client_id: &str) -> Vec<DirectoryEntry> {
        self.directory_at(client_id, Utc::now())
    }

    /// Verified agents only, with a derived online flag (seen < 5 min ago).
    pub fn directory_at(&self, client_id: &str, now: DateTime<Utc>) -> Vec<DirectoryEntry> {
        self.all_agents(client_id)
            .into_iter()
            .filter(|a| a.status == AgentStatus::Verified)
            .map(|a| {
                let online = now.signed_duration_since(a.last_seen)
                    < Duration::minutes(ONLINE_WINDOW_MINUTES);
                DirectoryEntry {
                    agent_id: a.agent_id,
                    agent_type: a.agent_type,
                    capabilities: a.capabilities,
                    endpoint: a.endpoint,
                    status: if online { "online".into() } else { "offline".into() },
                }
            })
            .collect()
    }

    pub fn remove_agent(&self, agent_id: &str, client_id: &str) -> bool {
        match self.agents.get_mut(client_id) {
            Some(mut scope) => {
                let removed = scope.remove(agent_id).is_some();
                if removed {
                    info!(agent_id, client_id, "Agent removed from registry");
                }
                removed
            }
            None => false,
        }
    }

    pub fn registered_count(&self) -> usize {
        self.agents.iter().map(|scope| scope.len()).sum()
    }
}
