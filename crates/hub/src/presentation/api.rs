// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Hub HTTP surface, versioned under `/api/v1`.
//!
//! Handlers stay thin: extract, call into the application layer, map the
//! error kind to a status code via [`HubError`]'s `IntoResponse`.

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::domain::agent::{AgentRegistration, Heartbeat};
use crate::domain::document::{DocumentFilters, DocumentMetadata};
use crate::domain::orchestration::{CollaborationResponseBody, OrchestrationRequest};
use crate::error::HubError;

pub fn app(ctx: Arc<AppContext>) -> Router {
    let api = Router::new()
        .route("/documents/upload", post(upload_document))
        .route("/documents", get(search_documents))
        .route("/documents/{document_id}", get(get_document))
        .route("/agents/register", post(register_agent))
        .route("/agents/directory", get(agent_directory))
        .route("/agents/heartbeat", post(agent_heartbeat))
        .route("/agents/health", get(agents_health))
        .route("/orchestration/route", post(route_request))
        .route("/orchestration/active", get(active_requests))
        .route("/orchestration/response/{routing_id}", post(process_response))
        .route("/health", get(system_health))
        .route("/attestation", get(attestation));

    let router = Router::new()
        .nest("/api/v1", api)
        .route("/", get(root))
        .route("/health", get(system_health))
        .route("/attestation", get(attestation))
        .layer(TraceLayer::new_for_http());

    let router = if ctx.config.development_mode {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.with_state(ctx)
}

/// Minimal router for the secondary attestation port.
pub fn attestation_app(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/attestation", get(attestation))
        .with_state(ctx)
}

fn require_client_id(headers: &HeaderMap) -> Result<String, HubError> {
    headers
        .get("X-Client-ID")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or(HubError::ClientIdMissing)
}

// ============================================================================
// Document endpoints
// ============================================================================

async fn upload_document(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HubError> {
    let client_id = require_client_id(&headers)?;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut department: Option<String> = None;
    let mut tags: Vec<String> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| HubError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .unwrap_or("unnamed")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| HubError::BadRequest(format!("Failed to read file: {}", e)))?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("department") => {
                department = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| HubError::BadRequest(e.to_string()))?,
                );
            }
            Some("tags") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| HubError::BadRequest(e.to_string()))?;
                tags = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect();
            }
            _ => {}
        }
    }

    let (filename, content) =
        file.ok_or_else(|| HubError::BadRequest("Missing file field".into()))?;

    let mut user_metadata = serde_json::Map::new();
    user_metadata.insert("original_filename".into(), json!(filename));
    let metadata = DocumentMetadata {
        department,
        tags,
        user_metadata,
    };

    let outcome = ctx
        .intake
        .process_upload(&content, &filename, metadata, &client_id)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "accepted",
            "upload_id": outcome.upload_id,
            "document_id": outcome.document_id,
            "processing_status": outcome.status,
            "categorization": outcome.categorization,
        })),
    ))
}

async fn get_document(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, HubError> {
    let client_id = require_client_id(&headers)?;

    let document = ctx
        .intake
        .get_document(&document_id)
        .ok_or_else(|| HubError::NotFound("Document".into()))?;
    if document.client_id != client_id {
        return Err(HubError::Forbidden);
    }

    Ok(Json(document))
}

#[derive(Debug, Deserialize)]
struct DocumentSearchParams {
    department: Option<String>,
    document_type: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
}

fn parse_date(raw: &str, name: &str) -> Result<DateTime<Utc>, HubError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| HubError::BadRequest(format!("{} must be an RFC3339 timestamp", name)))
}

async fn search_documents(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Query(params): Query<DocumentSearchParams>,
) -> Result<impl IntoResponse, HubError> {
    let client_id = require_client_id(&headers)?;

    let filters = DocumentFilters {
        department: params.department,
        document_type: params.document_type,
        date_from: params
            .date_from
            .as_deref()
            .map(|d| parse_date(d, "date_from"))
            .transpose()?,
        date_to: params
            .date_to
            .as_deref()
            .map(|d| parse_date(d, "date_to"))
            .transpose()?,
    };

    let documents = ctx.intake.search_documents(&client_id, &filters);
    Ok(Json(json!({ "documents": documents })))
}

// ============================================================================
// Agent endpoints
// ============================================================================

async fn register_agent(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(mut registration): Json<AgentRegistration>,
) -> Result<impl IntoResponse, HubError> {
    let client_id = require_client_id(&headers)?;

    // Header-borne attestation material folds into the body.
    let header_quote = headers
        .get("X-Attestation-Quote")
        .and_then(|v| v.to_str().ok());
    let header_key = headers.get("X-Public-Key").and_then(|v| v.to_str().ok());
    if let (Some(quote), Some(public_key)) = (header_quote, header_key) {
        registration.attestation_data.quote = Some(quote.to_string());
        registration.attestation_data.public_key = Some(public_key.to_string());
    }

    match ctx.registry.register(registration, &client_id).await {
        Ok(ack) => Ok((StatusCode::CREATED, Json(json!(ack)))),
        Err(HubError::AttestationFailed(reason)) => Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "status": "rejected",
                "verification_status": "failed",
                "error": reason,
            })),
        )),
        Err(e) => Err(e),
    }
}

#[derive(Debug, Deserialize)]
struct DirectoryParams {
    capability: Option<String>,
}

async fn agent_directory(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Query(params): Query<DirectoryParams>,
) -> Result<impl IntoResponse, HubError> {
    let client_id = require_client_id(&headers)?;

    let agents = match params.capability {
        Some(capability) => {
            json!(ctx.registry.agents_by_capability(&capability, &client_id))
        }
        None => json!(ctx.registry.directory(&client_id)),
    };

    Ok(Json(json!({ "agents": agents })))
}

async fn agent_heartbeat(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(heartbeat): Json<Heartbeat>,
) -> Result<impl IntoResponse, HubError> {
    let client_id = require_client_id(&headers)?;

    if ctx
        .registry
        .update_heartbeat(&heartbeat.agent_id, &client_id)
    {
        Ok(Json(json!({ "status": "acknowledged" })))
    } else {
        Err(HubError::NotFound("Agent".into()))
    }
}

async fn agents_health(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HubError> {
    let client_id = require_client_id(&headers)?;

    let registry_health = ctx.registry.check_agent_health(&client_id);
    let vm_health = ctx.transport.probe_all().await;

    Ok(Json(json!({
        "agent_registry": registry_health,
        "vm_communication": vm_health,
    })))
}

// ============================================================================
// Orchestration endpoints
// ============================================================================

async fn route_request(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(request): Json<OrchestrationRequest>,
) -> Result<impl IntoResponse, HubError> {
    let client_id = require_client_id(&headers)?;
    let outcome = ctx.engine.route_request(request, &client_id).await?;
    Ok(Json(outcome))
}

async fn active_requests(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HubError> {
    let client_id = require_client_id(&headers)?;
    Ok(Json(json!({
        "active_requests": ctx.engine.active_requests(&client_id),
    })))
}

async fn process_response(
    State(ctx): State<Arc<AppContext>>,
    Path(routing_id): Path<String>,
    Json(body): Json<CollaborationResponseBody>,
) -> Result<impl IntoResponse, HubError> {
    let progress = ctx.engine.process_response(&routing_id, body).await?;
    Ok(Json(progress))
}

// ============================================================================
// System endpoints
// ============================================================================

async fn root(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    Json(json!({
        "service": "Conclave Hub",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "development_mode": ctx.config.development_mode,
    }))
}

async fn system_health(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "hub",
        "registered_agents": ctx.registry.registered_count(),
        "active_requests": ctx.engine.active_count(),
        "uptime_seconds": ctx.uptime_seconds(),
        "development_mode": ctx.config.development_mode,
    }))
}

async fn attestation(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    Json(ctx.attestation_snapshot())
}
