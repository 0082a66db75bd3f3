// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent HTTP surface tests: routed work, peer collaboration envelopes, and
//! the replay defense observed from the outside.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use conclave_agent::analyzer::FinanceAnalyzer;
use conclave_agent::api::{app, AgentContext};
use conclave_agent::hub_client::HubClient;
use conclave_agent::{AgentConfig, AgentRuntime};
use conclave_protocol::{AgentKind, KeyStore, MessageKind, SecureChannel, WireEnvelope};

fn test_config(data_root: &std::path::Path) -> AgentConfig {
    AgentConfig {
        agent_id: "finance-1".into(),
        kind: AgentKind::Finance,
        client_id: "acme".into(),
        hub_endpoint: "http://localhost:8080".into(),
        host: "127.0.0.1".into(),
        api_port: 0,
        attestation_port: 0,
        data_root: data_root.to_path_buf(),
        log_level: "warn".into(),
        development_mode: true,
        mock_llm: true,
    }
}

fn test_app(dir: &tempfile::TempDir) -> axum::Router {
    let config = test_config(dir.path());
    let keys = Arc::new(KeyStore::generate(&config.key_dir()).unwrap());
    let runtime = AgentRuntime::new(&config, keys.clone(), Arc::new(FinanceAnalyzer));
    let hub_client = HubClient::new(&config, keys, runtime.channel().clone());
    app(Arc::new(AgentContext {
        runtime,
        hub_client,
    }))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_process_routed_work() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let response = app
        .oneshot(post_json(
            "/api/v1/process",
            &json!({
                "routing_id": "abcd1234",
                "query": "Compute Q4 ROI",
                "data_package": {
                    "encrypted": false,
                    "data": { "financial_data": { "revenue": 1_000_000, "expenses": 600_000 } },
                },
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], json!("completed"));
    assert_eq!(body["agent_type"], json!("finance"));
    assert_eq!(body["result"]["detailed_results"]["net_profit"], json!(400_000.0));
    assert!(body["result"]["confidence_score"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_capabilities_and_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let response = app
        .clone()
        .oneshot(
            Request::get("/api/v1/capabilities")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["agent_type"], json!("finance"));
    assert!(body["capabilities"]
        .as_array()
        .unwrap()
        .contains(&json!("roi_calculation")));

    let response = app
        .oneshot(Request::get("/api/v1/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["requests_processed"], json!(0));
}

#[tokio::test]
async fn test_collaborate_round_trip_and_replay() {
    let dir = tempfile::tempdir().unwrap();
    let peer_dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let peer_keys = Arc::new(KeyStore::generate(peer_dir.path()).unwrap());
    let peer = SecureChannel::new("marketing-1", peer_keys);

    let envelope = peer
        .seal(
            "finance-1",
            MessageKind::CollaborationRequest,
            json!({
                "task_description": "Assess margins",
                "data_package": {
                    "data": { "financial_data": { "revenue": 800_000, "expenses": 700_000 } }
                },
            }),
            None,
        )
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_json("/api/v1/collaborate", &json!(envelope)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let reply: WireEnvelope = serde_json::from_value(body_json(response).await).unwrap();
    let opened = peer.open(&reply).unwrap();
    assert_eq!(opened.message_type, MessageKind::CollaborationResponse);
    assert_eq!(opened.payload["status"], json!("completed"));

    // The very same envelope again: the agent's replay window rejects it and
    // answers with a signed error envelope.
    let response = app
        .oneshot(post_json("/api/v1/collaborate", &json!(envelope)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let reply: WireEnvelope = serde_json::from_value(body_json(response).await).unwrap();
    let opened = peer.open(&reply).unwrap();
    assert_eq!(opened.message_type, MessageKind::Error);
    assert_eq!(opened.payload["error"], json!("envelope_replay"));
}

#[tokio::test]
async fn test_health_and_attestation_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let response = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["status"], json!("healthy"));
    assert_eq!(body["hub_registered"], json!(false));

    let response = app
        .oneshot(Request::get("/attestation").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["public_key_fingerprint"].as_str().unwrap().len(), 64);
}
