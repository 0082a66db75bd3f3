// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the orchestration engine against an in-memory
//! transport: happy-path routing, escalation, liveness-driven routing, and
//! dispatch-failure rollback.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};

use conclave_hub::application::engine::OrchestrationEngine;
use conclave_hub::application::package::{DataPackageAssembler, EmptyCatalog};
use conclave_hub::application::registry::AgentRegistry;
use conclave_hub::domain::agent::{AgentKind, AgentRegistration, AttestationData};
use conclave_hub::domain::orchestration::{
    CollaborationProgress, CollaborationResponseBody, OrchestrationRequest, Priority,
};
use conclave_hub::domain::transport::{PeerTransport, ProbeReport, TransportError};
use conclave_hub::infrastructure::cortex::{KeywordCortex, KeywordRouter};
use conclave_hub::HubError;
use conclave_protocol::{generate_dev_quote, DevAttestationVerifier, KeyStore, SecureChannel};

struct RecordingTransport {
    fail: bool,
    dispatches: Mutex<Vec<(AgentKind, Value)>>,
}

impl RecordingTransport {
    fn new() -> Self {
        Self {
            fail: false,
            dispatches: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            dispatches: Mutex::new(Vec::new()),
        }
    }

    fn dispatched(&self) -> Vec<(AgentKind, Value)> {
        self.dispatches.lock().clone()
    }
}

#[async_trait]
impl PeerTransport for RecordingTransport {
    async fn send(
        &self,
        kind: AgentKind,
        payload: Value,
        _timeout: StdDuration,
    ) -> Result<Value, TransportError> {
        if self.fail {
            return Err(TransportError::Unreachable {
                cause: "connection refused".into(),
            });
        }
        self.dispatches.lock().push((kind, payload));
        Ok(json!({ "status": "accepted" }))
    }

    async fn probe_all(&self) -> BTreeMap<String, ProbeReport> {
        BTreeMap::new()
    }

    async fn broadcast(&self, _payload: Value) -> BTreeMap<String, Result<Value, TransportError>> {
        BTreeMap::new()
    }

    fn configured_kinds(&self) -> Vec<AgentKind> {
        vec![AgentKind::Finance, AgentKind::Marketing]
    }
}

struct Harness {
    registry: Arc<AgentRegistry>,
    engine: Arc<OrchestrationEngine>,
    transport: Arc<RecordingTransport>,
    _key_dir: tempfile::TempDir,
}

fn harness_with(transport: RecordingTransport) -> Harness {
    let key_dir = tempfile::tempdir().unwrap();
    let keys = Arc::new(KeyStore::generate(key_dir.path()).unwrap());
    let channel = Arc::new(SecureChannel::new("hub", keys));
    let registry = Arc::new(AgentRegistry::new(Arc::new(DevAttestationVerifier)));
    let transport = Arc::new(transport);

    let engine = Arc::new(OrchestrationEngine::new(
        registry.clone(),
        transport.clone(),
        Arc::new(KeywordRouter),
        Arc::new(KeywordCortex::new()),
        DataPackageAssembler::new(channel, Arc::new(EmptyCatalog)),
    ));

    Harness {
        registry,
        engine,
        transport,
        _key_dir: key_dir,
    }
}

fn harness() -> Harness {
    harness_with(RecordingTransport::new())
}

async fn register(harness: &Harness, agent_id: &str, kind: AgentKind, client_id: &str) {
    harness
        .registry
        .register(
            AgentRegistration {
                agent_id: agent_id.to_string(),
                agent_type: kind,
                capabilities: vec![format!("{}_analysis", kind)],
                endpoint: format!("http://{}:8081", agent_id),
                attestation_endpoint: format!("http://{}:29344", agent_id),
                attestation_data: AttestationData {
                    quote: Some(generate_dev_quote(agent_id)),
                    public_key: Some(format!("-----BEGIN PUBLIC KEY-----{}", agent_id)),
                },
            },
            client_id,
        )
        .await
        .unwrap();
}

fn roi_request() -> OrchestrationRequest {
    OrchestrationRequest {
        query: "Compute Q4 ROI".into(),
        requesting_agent: None,
        context: json!({ "marketing_spend": 50_000 })
            .as_object()
            .cloned()
            .unwrap(),
        data_requirements: vec!["financial_data".into()],
        priority: Priority::Medium,
        timeout_seconds: 60,
    }
}

fn response(agent_id: &str, agent_type: &str, confidence: f64) -> CollaborationResponseBody {
    CollaborationResponseBody {
        agent_id: Some(agent_id.to_string()),
        agent_type: Some(agent_type.to_string()),
        result: json!({
            "confidence_score": confidence,
            "summary": format!("{} analysis complete", agent_type),
        }),
    }
}

#[tokio::test]
async fn test_happy_path_route_and_synthesize() {
    let harness = harness();
    register(&harness, "finance-1", AgentKind::Finance, "acme").await;

    let outcome = harness
        .engine
        .route_request(roi_request(), "acme")
        .await
        .unwrap();

    assert_eq!(outcome.routing_id.len(), 8);
    assert_eq!(outcome.agent_type, AgentKind::Finance);
    assert_eq!(outcome.target_agent, "finance-1");
    assert!(outcome.data_package_size > 0);
    assert_eq!(outcome.peer_ack, json!({ "status": "accepted" }));
    assert_eq!(harness.engine.active_requests("acme").len(), 1);

    // The dispatched payload carried the routing id and the data package
    let dispatches = harness.transport.dispatched();
    assert_eq!(dispatches.len(), 1);
    assert_eq!(
        dispatches[0].1["routing_id"],
        json!(outcome.routing_id.clone())
    );
    assert_eq!(dispatches[0].1["data_package"]["encrypted"], json!(true));

    let progress = harness
        .engine
        .process_response(&outcome.routing_id, response("finance-1", "finance", 0.9))
        .await
        .unwrap();

    match progress {
        CollaborationProgress::Completed(done) => {
            assert_eq!(done.routing_id, outcome.routing_id);
            assert_eq!(done.status, "completed");
            assert_eq!(done.responses.len(), 1);
            assert!(done
                .synthesis
                .executive_summary
                .contains("finance analysis complete"));
        }
        other => panic!("Expected completion, got {:?}", other),
    }

    assert!(harness.engine.active_requests("acme").is_empty());
}

#[tokio::test]
async fn test_low_confidence_escalates_once() {
    let harness = harness();
    register(&harness, "finance-1", AgentKind::Finance, "acme").await;
    register(&harness, "marketing-1", AgentKind::Marketing, "acme").await;

    let outcome = harness
        .engine
        .route_request(roi_request(), "acme")
        .await
        .unwrap();
    assert_eq!(outcome.agent_type, AgentKind::Finance);

    // First answer is shaky: the engine must seek exactly one second opinion
    let progress = harness
        .engine
        .process_response(&outcome.routing_id, response("finance-1", "finance", 0.6))
        .await
        .unwrap();

    match progress {
        CollaborationProgress::Escalated(notice) => {
            assert_eq!(notice.escalated_to, "marketing-1");
            assert_ne!(notice.escalated_to, "finance-1");
            assert_eq!(notice.responses_so_far, 1);
        }
        other => panic!("Expected escalation, got {:?}", other),
    }

    let dispatches = harness.transport.dispatched();
    assert_eq!(dispatches.len(), 2);
    assert_eq!(dispatches[1].0, AgentKind::Marketing);
    assert_eq!(dispatches[1].1["routing_id"], json!(outcome.routing_id));

    let progress = harness
        .engine
        .process_response(
            &outcome.routing_id,
            response("marketing-1", "marketing", 0.85),
        )
        .await
        .unwrap();

    match progress {
        CollaborationProgress::Completed(done) => {
            assert_eq!(done.responses.len(), 2);
        }
        other => panic!("Expected completion, got {:?}", other),
    }

    // The entry is gone: a late third post is an unknown routing id
    let err = harness
        .engine
        .process_response(&outcome.routing_id, response("finance-1", "finance", 0.9))
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::UnknownRoutingId(_)));
}

#[tokio::test]
async fn test_two_low_confidence_responses_still_finalize() {
    let harness = harness();
    register(&harness, "finance-1", AgentKind::Finance, "acme").await;
    register(&harness, "marketing-1", AgentKind::Marketing, "acme").await;

    let outcome = harness
        .engine
        .route_request(roi_request(), "acme")
        .await
        .unwrap();

    let first = harness
        .engine
        .process_response(&outcome.routing_id, response("finance-1", "finance", 0.5))
        .await
        .unwrap();
    assert!(matches!(first, CollaborationProgress::Escalated(_)));

    // Second answer is also low-confidence, but two responses is the cap
    let second = harness
        .engine
        .process_response(
            &outcome.routing_id,
            response("marketing-1", "marketing", 0.4),
        )
        .await
        .unwrap();
    match second {
        CollaborationProgress::Completed(done) => assert_eq!(done.responses.len(), 2),
        other => panic!("Expected completion at the response cap, got {:?}", other),
    }
}

#[tokio::test]
async fn test_no_second_agent_finalizes_with_one_response() {
    let harness = harness();
    register(&harness, "finance-1", AgentKind::Finance, "acme").await;

    let outcome = harness
        .engine
        .route_request(roi_request(), "acme")
        .await
        .unwrap();

    // Low confidence but nobody else to ask
    let progress = harness
        .engine
        .process_response(&outcome.routing_id, response("finance-1", "finance", 0.5))
        .await
        .unwrap();

    match progress {
        CollaborationProgress::Completed(done) => assert_eq!(done.responses.len(), 1),
        other => panic!("Expected completion, got {:?}", other),
    }
    assert_eq!(harness.engine.active_count(), 0);
}

#[tokio::test]
async fn test_dispatch_failure_leaves_no_ghost_entry() {
    let harness = harness_with(RecordingTransport::failing());
    register(&harness, "finance-1", AgentKind::Finance, "acme").await;

    let err = harness
        .engine
        .route_request(roi_request(), "acme")
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::Transport(_)));
    assert_eq!(harness.engine.active_count(), 0);
}

#[tokio::test]
async fn test_route_with_no_agents_fails() {
    let harness = harness();

    let err = harness
        .engine
        .route_request(roi_request(), "acme")
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::NoAgentsAvailable));
}

#[tokio::test]
async fn test_requesting_agent_is_excluded() {
    let harness = harness();
    register(&harness, "finance-1", AgentKind::Finance, "acme").await;

    let mut request = roi_request();
    request.requesting_agent = Some("finance-1".into());

    // The only registered agent asked the question, so nobody can answer
    let err = harness
        .engine
        .route_request(request, "acme")
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::NoAgentsAvailable));
}

#[tokio::test]
async fn test_inactive_agents_are_skipped_by_routing() {
    let harness = harness();
    register(&harness, "finance-1", AgentKind::Finance, "acme").await;

    // Sixteen idle minutes later, the sweep retires the agent
    let later = Utc::now() + Duration::minutes(16);
    let buckets = harness.registry.check_agent_health_at("acme", later);
    assert_eq!(buckets.inactive.len(), 1);

    let err = harness
        .engine
        .route_request(roi_request(), "acme")
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::NoAgentsAvailable));
}

#[tokio::test]
async fn test_client_scoping_of_active_requests() {
    let harness = harness();
    register(&harness, "finance-1", AgentKind::Finance, "acme").await;
    register(&harness, "finance-9", AgentKind::Finance, "globex").await;

    let outcome = harness
        .engine
        .route_request(roi_request(), "acme")
        .await
        .unwrap();

    assert_eq!(harness.engine.active_requests("acme").len(), 1);
    assert!(harness.engine.active_requests("globex").is_empty());

    harness
        .engine
        .process_response(&outcome.routing_id, response("finance-1", "finance", 0.9))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_reaper_collects_expired_entries() {
    let harness = harness();
    register(&harness, "finance-1", AgentKind::Finance, "acme").await;

    let mut request = roi_request();
    request.timeout_seconds = 1;
    harness.engine.route_request(request, "acme").await.unwrap();
    assert_eq!(harness.engine.active_count(), 1);

    // Still inside deadline + grace
    assert_eq!(
        harness
            .engine
            .reap_expired_at(Utc::now() + Duration::seconds(30)),
        0
    );
    // Past deadline + grace
    assert_eq!(
        harness
            .engine
            .reap_expired_at(Utc::now() + Duration::seconds(120)),
        1
    );
    assert_eq!(harness.engine.active_count(), 0);
}
