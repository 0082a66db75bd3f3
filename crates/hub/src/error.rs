// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Hub error taxonomy and its HTTP mapping.
//!
//! Every fallible hub operation returns one of these kinds; the HTTP layer
//! maps kinds to status codes in one place. Envelope-layer errors never leak
//! raw to callers — receivers answer with a signed error envelope and the
//! kind string only.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use conclave_protocol::EnvelopeError;

use crate::domain::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("{0}")]
    BadRequest(String),

    #[error("X-Client-ID header required")]
    ClientIdMissing,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Access denied")]
    Forbidden,

    #[error("Attestation verification failed: {0}")]
    AttestationFailed(String),

    #[error("No verified agents available for collaboration")]
    NoAgentsAvailable,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("Unknown routing ID: {0}")]
    UnknownRoutingId(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HubError {
    /// Stable error kind surfaced in response bodies.
    pub fn kind(&self) -> String {
        match self {
            Self::BadRequest(_) => "bad_request".into(),
            Self::ClientIdMissing => "client_id_missing".into(),
            Self::NotFound(_) => "not_found".into(),
            Self::Forbidden => "forbidden".into(),
            Self::AttestationFailed(_) => "attestation_failed".into(),
            Self::NoAgentsAvailable => "no_agents_available".into(),
            Self::Transport(e) => match e {
                TransportError::Timeout(_) => "transport_timeout".into(),
                TransportError::HttpStatus { code, .. } => format!("transport_http_{}", code),
                TransportError::Unreachable { .. } | TransportError::NotConfigured(_) => {
                    "transport_unreachable".into()
                }
            },
            Self::Envelope(e) => e.code().into(),
            Self::UnknownRoutingId(_) => "unknown_routing_id".into(),
            Self::Internal(_) => "internal".into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::ClientIdMissing | Self::AttestationFailed(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) | Self::UnknownRoutingId(_) => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NoAgentsAvailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Transport(TransportError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Envelope(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));
        (self.status_code(), body).into_response()
    }
}
