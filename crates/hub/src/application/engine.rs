// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Orchestration engine: per-query routing, response tracking, escalation,
//! and synthesis.
//!
//! The engine holds abstract references to the registry, the transport, the
//! router policy, and the synthesizer — all injected at construction. The
//! active-collaborations table is keyed by routing id; append, the
//! escalation decision, and finalize run as one serialized sequence under
//! the entry lock. A dispatch failure never leaves a ghost entry.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::{rngs::OsRng, RngCore};
use serde_json::json;
use tracing::{info, warn};

use crate::application::package::DataPackageAssembler;
use crate::application::registry::AgentRegistry;
use crate::domain::agent::AgentRecord;
use crate::domain::cortex::Synthesizer;
use crate::domain::orchestration::{
    ActiveCollaboration, ActiveSummary, AgentResponse, CollaborationProgress,
    CollaborationResponseBody, CompletedCollaboration, EscalationNotice, OrchestrationRequest,
    RouteOutcome, RouterPolicy,
};
use crate::domain::transport::PeerTransport;
use crate::error::HubError;

/// Below this confidence the engine seeks a second opinion.
const ESCALATION_CONFIDENCE_FLOOR: f64 = 0.7;
/// At most one escalation per original request.
const MAX_RESPONSES: usize = 2;
/// Capacity policy for in-flight collaborations per client.
const MAX_ACTIVE_PER_CLIENT: usize = 1024;
/// Slack past the request deadline before the reaper collects an entry.
const REAP_GRACE_SECS: i64 = 60;

enum Decision {
    Escalate {
        next: AgentRecord,
        request: OrchestrationRequest,
        client_id: String,
        responses_so_far: usize,
    },
    Finalize(ActiveCollaboration),
}

pub struct OrchestrationEngine {
    registry: Arc<AgentRegistry>,
    transport: Arc<dyn PeerTransport>,
    router: Arc<dyn RouterPolicy>,
    synthesizer: Arc<dyn Synthesizer>,
    assembler: DataPackageAssembler,
    active: DashMap<String, ActiveCollaboration>,
}

impl OrchestrationEngine {
    pub fn new(
        registry: Arc<AgentRegistry>,
        transport: Arc<dyn PeerTransport>,
        router: Arc<dyn RouterPolicy>,
        synthesizer: Arc<dyn Synthesizer>,
        assembler: DataPackageAssembler,
    ) -> Self {
        Self {
            registry,
            transport,
            router,
            synthesizer,
            assembler,
            active: DashMap::new(),
        }
    }

    /// Route a collaboration request to the best available agent.
    pub async fn route_request(
        &self,
        request: OrchestrationRequest,
        client_id: &str,
    ) -> Result<RouteOutcome, HubError> {
        let mut available = self.registry.verified_agents(client_id);
        if let Some(requester) = &request.requesting_agent {
            available.retain(|a| &a.agent_id != requester);
        }
        if available.is_empty() {
            return Err(HubError::NoAgentsAvailable);
        }

        let mut decision = self.router.select(&request.query, &available).await;
        let target = match available
            .iter()
            .find(|a| a.agent_type == decision.selected_kind)
        {
            Some(agent) => agent.clone(),
            None => {
                let fallback = available[0].clone();
                decision.reasoning = format!(
                    "{} (preferred {} unavailable, substituted {})",
                    decision.reasoning, decision.selected_kind, fallback.agent_type
                );
                decision.selected_kind = fallback.agent_type;
                fallback
            }
        };

        let (package, package_size) = self.assembler.assemble(&request, client_id, &target)?;

        let in_flight = self
            .active
            .iter()
            .filter(|entry| entry.client_id == client_id)
            .count();
        if in_flight >= MAX_ACTIVE_PER_CLIENT {
            return Err(HubError::Internal(format!(
                "Active collaboration capacity ({}) exhausted for client {}",
                MAX_ACTIVE_PER_CLIENT, client_id
            )));
        }

        let routing_id = self.fresh_routing_id();
        let routed_at = Utc::now();
        self.active.insert(
            routing_id.clone(),
            ActiveCollaboration {
                routing_id: routing_id.clone(),
                request: request.clone(),
                target_agent: target.clone(),
                client_id: client_id.to_string(),
                started_at: routed_at,
                responses: Vec::new(),
            },
        );

        let dispatch = json!({
            "routing_id": routing_id,
            "query": request.query,
            "context": request.context,
            "data_package": package,
            "requesting_agent": request.requesting_agent,
            "priority": decision.priority,
        });
        let timeout = StdDuration::from_secs(request.timeout_seconds);

        let peer_ack = match self.transport.send(target.agent_type, dispatch, timeout).await {
            Ok(ack) => ack,
            Err(e) => {
                // No ghost entries: a failed dispatch rolls the insert back.
                self.active.remove(&routing_id);
                return Err(e.into());
            }
        };

        info!(routing_id, target = %target.agent_type, client_id, "Routed request");

        Ok(RouteOutcome {
            routing_id,
            target_agent: target.agent_id,
            agent_type: target.agent_type,
            reasoning: decision.reasoning,
            estimated_time_minutes: decision.estimated_minutes,
            data_package_size: package_size,
            routed_at,
            peer_ack,
        })
    }

    /// Process a collaborating agent's answer for `routing_id`.
    pub async fn process_response(
        &self,
        routing_id: &str,
        body: CollaborationResponseBody,
    ) -> Result<CollaborationProgress, HubError> {
        let decision = match self.active.entry(routing_id.to_string()) {
            Entry::Vacant(_) => {
                return Err(HubError::UnknownRoutingId(routing_id.to_string()));
            }
            Entry::Occupied(mut occupied) => {
                let (confidence, count) = {
                    let entry = occupied.get_mut();
                    let confidence = body
                        .result
                        .get("confidence_score")
                        .and_then(|v| v.as_f64())
                        .unwrap_or(1.0);
                    entry.responses.push(AgentResponse {
                        agent_id: body.agent_id,
                        agent_type: body.agent_type,
                        result: body.result,
                        received_at: Utc::now(),
                    });
                    (confidence, entry.responses.len())
                };

                if confidence < ESCALATION_CONFIDENCE_FLOOR && count < MAX_RESPONSES {
                    match self.next_agent(occupied.get()) {
                        Some(next) => {
                            let entry = occupied.get_mut();
                            entry.target_agent = next.clone();
                            Decision::Escalate {
                                next,
                                request: entry.request.clone(),
                                client_id: entry.client_id.clone(),
                                responses_so_far: entry.responses.len(),
                            }
                        }
                        None => Decision::Finalize(occupied.remove()),
                    }
                } else {
                    Decision::Finalize(occupied.remove())
                }
            }
        };

        match decision {
            Decision::Escalate {
                next,
                request,
                client_id,
                responses_so_far,
            } => {
                info!(routing_id, escalated_to = %next.agent_id, "Escalating for a second opinion");
                match self
                    .dispatch_escalation(routing_id, &request, &client_id, &next)
                    .await
                {
                    Ok(()) => Ok(CollaborationProgress::Escalated(EscalationNotice {
                        routing_id: routing_id.to_string(),
                        status: "escalated".into(),
                        escalated_to: next.agent_id,
                        agent_type: next.agent_type,
                        responses_so_far,
                    })),
                    Err(e) => {
                        // The second opinion is unreachable; finish with what
                        // we already have rather than stranding the entry.
                        warn!(routing_id, error = %e, "Escalation dispatch failed, finalizing");
                        let collab = self
                            .active
                            .remove(routing_id)
                            .map(|(_, collab)| collab)
                            .ok_or_else(|| {
                                HubError::UnknownRoutingId(routing_id.to_string())
                            })?;
                        self.finalize(collab).await
                    }
                }
            }
            Decision::Finalize(collab) => self.finalize(collab).await,
        }
    }

    async fn finalize(
        &self,
        collab: ActiveCollaboration,
    ) -> Result<CollaborationProgress, HubError> {
        let synthesis = self
            .synthesizer
            .synthesize(&collab.responses)
            .await
            .map_err(|e| HubError::Internal(e.to_string()))?;

        info!(
            routing_id = %collab.routing_id,
            responses = collab.responses.len(),
            "Collaboration completed"
        );

        Ok(CollaborationProgress::Completed(CompletedCollaboration {
            routing_id: collab.routing_id,
            status: "completed".into(),
            synthesis,
            responses: collab.responses,
            completed_at: Utc::now(),
        }))
    }

    async fn dispatch_escalation(
        &self,
        routing_id: &str,
        request: &OrchestrationRequest,
        client_id: &str,
        next: &AgentRecord,
    ) -> Result<(), HubError> {
        let (package, _) = self.assembler.assemble(request, client_id, next)?;
        let dispatch = json!({
            "routing_id": routing_id,
            "query": request.query,
            "context": request.context,
            "data_package": package,
            "requesting_agent": request.requesting_agent,
            "priority": request.priority,
        });
        let timeout = StdDuration::from_secs(request.timeout_seconds);
        self.transport
            .send(next.agent_type, dispatch, timeout)
            .await?;
        Ok(())
    }

    /// First verified agent that has not yet responded and is not the
    /// original requester.
    fn next_agent(&self, collab: &ActiveCollaboration) -> Option<AgentRecord> {
        let responded_ids: Vec<&str> = collab
            .responses
            .iter()
            .filter_map(|r| r.agent_id.as_deref())
            .collect();
        let responded_types: Vec<&str> = collab
            .responses
            .iter()
            .filter_map(|r| r.agent_type.as_deref())
            .collect();

        self.registry
            .verified_agents(&collab.client_id)
            .into_iter()
            .find(|agent| {
                !responded_ids.contains(&agent.agent_id.as_str())
                    && !responded_types.contains(&agent.agent_type.as_str())
                    && collab.request.requesting_agent.as_deref() != Some(agent.agent_id.as_str())
            })
    }

    pub fn active_requests(&self, client_id: &str) -> Vec<ActiveSummary> {
        let mut summaries: Vec<ActiveSummary> = self
            .active
            .iter()
            .filter(|entry| entry.client_id == client_id)
            .map(|entry| ActiveSummary {
                routing_id: entry.routing_id.clone(),
                target_agent: entry.target_agent.agent_type,
                started_at: entry.started_at,
                status: "active".into(),
            })
            .collect();
        summaries.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        summaries
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Drop entries older than their request deadline plus grace.
    pub fn reap_expired(&self) -> usize {
        self.reap_expired_at(Utc::now())
    }

    pub fn reap_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.active.len();
        self.active.retain(|routing_id, collab| {
            let deadline = collab.started_at
                + Duration::seconds(collab.request.timeout_seconds as i64)
                + Duration::seconds(REAP_GRACE_SECS);
            let keep = now <= deadline;
            if !keep {
                warn!(routing_id, "Reaping abandoned collaboration");
            }
            keep
        });
        before.saturating_sub(self.active.len())
    }

    fn fresh_routing_id(&self) -> String {
        loop {
            let mut bytes = [0u8; 4];
            OsRng.fill_bytes(&mut bytes);
            let id = hex::encode(bytes);
            if !self.active.contains_key(&id) {
                return id;
            }
        }
    }
}

/// Background sweep for abandoned collaborations.
pub fn spawn_reaper(engine: Arc<OrchestrationEngine>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(StdDuration::from_secs(30));
        loop {
            interval.tick().await;
            let reaped = engine.reap_expired();
            if reaped > 0 {
                info!(reaped, "Reaper collected abandoned collaborations");
            }
        }
    })
}
