// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Orchestration model: routing requests, in-flight collaborations, and the
//! router policy seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::agent::{AgentKind, AgentRecord};
use crate::domain::cortex::Synthesis;

fn default_timeout_seconds() -> u64 {
    60
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Routing request from a client or a collaborating agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationRequest {
    pub query: String,
    #[serde(default)]
    pub requesting_agent: Option<String>,
    #[serde(default)]
    pub context: serde_json::Map<String, Value>,
    #[serde(default)]
    pub data_requirements: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Router policy output. Deterministic given its inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub selected_kind: AgentKind,
    pub reasoning: String,
    pub priority: Priority,
    pub estimated_minutes: u32,
    pub confidence: f64,
}

/// Chooses a target agent from a query and the currently-verified agent set.
///
/// The default implementation is keyword-driven; a learned policy can sit
/// behind the same seam.
#[async_trait]
pub trait RouterPolicy: Send + Sync {
    async fn select(&self, query: &str, available: &[AgentRecord]) -> RoutingDecision;
}

/// One collaborating agent's answer inside an active collaboration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub agent_type: Option<String>,
    pub result: Value,
    pub received_at: DateTime<Utc>,
}

/// Body posted to `/orchestration/response/{routing_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CollaborationResponseBody {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub agent_type: Option<String>,
    pub result: Value,
}

/// An in-flight orchestrated collaboration. Created at routing time, mutated
/// only by the engine, destroyed at synthesis or by the reaper.
#[derive(Debug, Clone)]
pub struct ActiveCollaboration {
    pub routing_id: String,
    pub request: OrchestrationRequest,
    pub target_agent: AgentRecord,
    pub client_id: String,
    pub started_at: DateTime<Utc>,
    pub responses: Vec<AgentResponse>,
}

/// Successful routing outcome returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteOutcome {
    pub routing_id: String,
    pub target_agent: String,
    pub agent_type: AgentKind,
    pub reasoning: String,
    pub estimated_time_minutes: u32,
    pub data_package_size: usize,
    pub routed_at: DateTime<Utc>,
    pub peer_ack: Value,
}

/// Terminal result of a collaboration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedCollaboration {
    pub routing_id: String,
    pub status: String,
    pub synthesis: Synthesis,
    pub responses: Vec<AgentResponse>,
    pub completed_at: DateTime<Utc>,
}

/// Emitted when a low-confidence response triggers a second opinion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationNotice {
    pub routing_id: String,
    pub status: String,
    pub escalated_to: String,
    pub agent_type: AgentKind,
    pub responses_so_far: usize,
}

/// What processing one response produced: either a second opinion is on its
/// way, or the collaboration is finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollaborationProgress {
    Escalated(EscalationNotice),
    Completed(CompletedCollaboration),
}

/// Listing row for `GET /orchestration/active`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSummary {
    pub routing_id: String,
    pub target_agent: AgentKind,
    pub started_at: DateTime<Utc>,
    pub status: String,
}
