// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP boundary tests: attestation rejection, client scoping, and error
//! kind mapping, driven through the axum router with `tower::oneshot`.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use conclave_hub::presentation::api::app;
use conclave_hub::{AppContext, HubConfig};
use conclave_protocol::generate_dev_quote;

fn test_config(data_root: &std::path::Path) -> HubConfig {
    HubConfig {
        development_mode: true,
        mock_llm: true,
        client_id: "default".into(),
        host: "127.0.0.1".into(),
        api_port: 0,
        attestation_port: 0,
        data_root: data_root.to_path_buf(),
        log_level: "warn".into(),
        finance_endpoint: None,
        marketing_endpoint: None,
        sales_endpoint: None,
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn registration_body(agent_id: &str, quote: &str) -> Value {
    json!({
        "agent_id": agent_id,
        "agent_type": "finance",
        "capabilities": ["financial_analysis"],
        "endpoint": format!("http://{}:8081", agent_id),
        "attestation_endpoint": format!("http://{}:29344", agent_id),
        "attestation_data": {
            "quote": quote,
            "public_key": "-----BEGIN PUBLIC KEY-----",
        },
    })
}

fn post_json(uri: &str, client_id: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Client-ID", client_id)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_register_then_directory_lists_agent() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = AppContext::initialize(test_config(dir.path())).unwrap();
    let app = app(ctx);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/agents/register",
            "acme",
            &registration_body("finance-1", &generate_dev_quote("fp")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["verification_status"], json!("verified"));

    let response = app
        .oneshot(
            Request::get("/api/v1/agents/directory")
                .header("X-Client-ID", "acme")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["agents"][0]["agent_id"], json!("finance-1"));
    assert_eq!(body["agents"][0]["status"], json!("online"));
}

#[tokio::test]
async fn test_rejected_attestation_is_a_clean_400() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = AppContext::initialize(test_config(dir.path())).unwrap();
    let app = app(ctx);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/agents/register",
            "acme",
            &registration_body("finance-bad", "!!!not-a-quote"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["status"], json!("rejected"));
    assert_eq!(body["verification_status"], json!("failed"));

    // The rejected agent never shows up in the directory
    let response = app
        .oneshot(
            Request::get("/api/v1/agents/directory")
                .header("X-Client-ID", "acme")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["agents"], json!([]));
}

#[tokio::test]
async fn test_missing_client_id_is_400() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = AppContext::initialize(test_config(dir.path())).unwrap();
    let app = app(ctx);

    let response = app
        .oneshot(
            Request::get("/api/v1/agents/directory")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], json!("client_id_missing"));
}

#[tokio::test]
async fn test_heartbeat_for_unknown_agent_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = AppContext::initialize(test_config(dir.path())).unwrap();
    let app = app(ctx);

    let response = app
        .oneshot(post_json(
            "/api/v1/agents/heartbeat",
            "acme",
            &json!({ "agent_id": "ghost-1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], json!("not_found"));
}

fn multipart_upload(client_id: &str, filename: &str, content: &str) -> Request<Body> {
    let boundary = "conclave-test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: text/plain\r\n\r\n{c}\r\n--{b}--\r\n",
        b = boundary,
        f = filename,
        c = content,
    );
    Request::post("/api/v1/documents/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .header("X-Client-ID", client_id)
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_document_upload_is_client_scoped() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = AppContext::initialize(test_config(dir.path())).unwrap();
    let app = app(ctx);

    let response = app
        .clone()
        .oneshot(multipart_upload(
            "client-a",
            "q4.txt",
            "Q4 revenue and budget review",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    let document_id = body["document_id"].as_str().unwrap().to_string();
    assert_eq!(body["categorization"]["department"], json!("Finance"));

    // The owner reads it back
    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/api/v1/documents/{}", document_id))
                .header("X-Client-ID", "client-a")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // A different client is refused
    let response = app
        .oneshot(
            Request::get(format!("/api/v1/documents/{}", document_id))
                .header("X-Client-ID", "client-b")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_attestation_endpoint_serves_evidence() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = AppContext::initialize(test_config(dir.path())).unwrap();
    let app = app(ctx);

    let response = app
        .oneshot(Request::get("/attestation").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["public_key_fingerprint"].as_str().unwrap().len(), 64);
    assert!(body["quote"].is_string());
}
