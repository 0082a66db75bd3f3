// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Spoke agent HTTP surface, versioned under `/api/v1`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::error;

use conclave_protocol::WireEnvelope;

use crate::hub_client::HubClient;
use crate::runtime::AgentRuntime;

pub struct AgentContext {
    pub runtime: Arc<AgentRuntime>,
    pub hub_client: Arc<HubClient>,
}

pub fn app(ctx: Arc<AgentContext>) -> Router {
    let api = Router::new()
        .route("/process", post(process))
        .route("/collaborate", post(collaborate))
        .route("/capabilities", get(capabilities))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/attestation", get(attestation));

    Router::new()
        .nest("/api/v1", api)
        .route("/", get(root))
        .route("/health", get(health))
        .route("/attestation", get(attestation))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Minimal router for the secondary attestation port.
pub fn attestation_app(ctx: Arc<AgentContext>) -> Router {
    Router::new()
        .route("/attestation", get(attestation))
        .with_state(ctx)
}

/// Dispatch hub-routed or peer-forwarded work by its `type` field.
async fn process(
    State(ctx): State<Arc<AgentContext>>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    let request_type = payload
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("general");

    if request_type == "health_check" {
        return (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "agent_id": ctx.runtime.agent_id,
                "agent_type": ctx.runtime.kind,
            })),
        );
    }

    match ctx.runtime.process_routed_work(&payload).await {
        Ok(reply) => (StatusCode::OK, Json(reply)),
        Err(e) => {
            error!(error = %e, "Request processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.code(), "message": e.to_string() })),
            )
        }
    }
}

/// Receive a secure envelope from a peer and answer with one of our own.
async fn collaborate(
    State(ctx): State<Arc<AgentContext>>,
    Json(envelope): Json<WireEnvelope>,
) -> impl IntoResponse {
    match ctx.runtime.handle_collaboration_envelope(&envelope).await {
        Ok(reply) => (StatusCode::OK, Json(json!(reply))),
        Err(e) => {
            error!(error = %e, "Failed to seal collaboration reply");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal" })),
            )
        }
    }
}

async fn capabilities(State(ctx): State<Arc<AgentContext>>) -> impl IntoResponse {
    let analyzer = ctx.runtime.analyzer();
    Json(json!({
        "agent_id": ctx.runtime.agent_id,
        "agent_type": ctx.runtime.kind,
        "capabilities": analyzer.capabilities(),
        "specializations": analyzer.specializations(),
        "collaboration_types": ["collaboration_request", "health_check"],
    }))
}

async fn health(State(ctx): State<Arc<AgentContext>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "agent_id": ctx.runtime.agent_id,
        "agent_type": ctx.runtime.kind,
        "capabilities": ctx.runtime.analyzer().capabilities(),
        "hub_registered": ctx.hub_client.is_registered(),
        "uptime_seconds": ctx.runtime.uptime_seconds(),
        "development_mode": ctx.runtime.development_mode,
    }))
}

async fn metrics(State(ctx): State<Arc<AgentContext>>) -> impl IntoResponse {
    let mut snapshot = ctx.runtime.metrics.snapshot();
    if let Some(map) = snapshot.as_object_mut() {
        map.insert("uptime_seconds".into(), json!(ctx.runtime.uptime_seconds()));
    }
    Json(snapshot)
}

async fn attestation(State(ctx): State<Arc<AgentContext>>) -> impl IntoResponse {
    Json(ctx.runtime.attestation_snapshot())
}

async fn root(State(ctx): State<Arc<AgentContext>>) -> impl IntoResponse {
    Json(json!({
        "service": format!("Conclave {} Agent", ctx.runtime.kind),
        "version": env!("CARGO_PKG_VERSION"),
        "agent_type": ctx.runtime.kind,
        "status": "running",
        "development_mode": ctx.runtime.development_mode,
    }))
}
