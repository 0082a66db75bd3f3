// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Data package assembly for routed work.
//!
//! Recognized requirement tags are materialized from the request context,
//! falling back to placeholder defaults when the context lacks a field (the
//! receiving analyzer treats them as sample figures). When the recipient's
//! public key is known the package body is wrapped in an encrypted envelope;
//! the package shape is identical either way.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use conclave_protocol::{MessageKind, SecureChannel};

use crate::domain::agent::AgentRecord;
use crate::domain::orchestration::OrchestrationRequest;
use crate::error::HubError;

/// Read-only view of the catalog used to attach relevant document ids.
pub trait CatalogIndex: Send + Sync {
    fn document_ids_for(&self, client_id: &str, requirements: &[String]) -> Vec<String>;
}

/// Catalog-less assembly (used when intake is not wired, e.g. spoke-local
/// engines).
pub struct EmptyCatalog;

impl CatalogIndex for EmptyCatalog {
    fn document_ids_for(&self, _client_id: &str, _requirements: &[String]) -> Vec<String> {
        Vec::new()
    }
}

pub struct DataPackageAssembler {
    channel: Arc<SecureChannel>,
    catalog: Arc<dyn CatalogIndex>,
}

impl DataPackageAssembler {
    pub fn new(channel: Arc<SecureChannel>, catalog: Arc<dyn CatalogIndex>) -> Self {
        Self { channel, catalog }
    }

    /// Compose the package for `target`. Returns the package object and its
    /// serialized size in bytes.
    pub fn assemble(
        &self,
        request: &OrchestrationRequest,
        client_id: &str,
        target: &AgentRecord,
    ) -> Result<(Value, usize), HubError> {
        let context = &request.context;
        let documents = self
            .catalog
            .document_ids_for(client_id, &request.data_requirements);

        let mut relevant = json!({
            "client_id": client_id,
            "request_context": context,
            "data_types": request.data_requirements,
            "documents": documents,
        });

        if request.data_requirements.iter().any(|r| r == "financial_data") {
            relevant["financial_data"] = json!({
                "revenue": context.get("revenue").cloned().unwrap_or(json!(1_000_000)),
                "expenses": context.get("expenses").cloned().unwrap_or(json!(800_000)),
                "period": context.get("period").cloned().unwrap_or(json!("Q4 2024")),
            });
        }

        if request.data_requirements.iter().any(|r| r == "marketing_data") {
            relevant["marketing_data"] = json!({
                "campaign_name": context
                    .get("campaign_name")
                    .cloned()
                    .unwrap_or(json!("Holiday Campaign")),
                "spend": context
                    .get("marketing_spend")
                    .cloned()
                    .unwrap_or(json!(50_000)),
                "impressions": context
                    .get("impressions")
                    .cloned()
                    .unwrap_or(json!(1_000_000)),
            });
        }

        let package = if target.public_key.is_empty() {
            json!({
                "encrypted": false,
                "data": relevant,
                "prepared_at": Utc::now(),
            })
        } else {
            let wrapped = self.channel.seal(
                &target.agent_id,
                MessageKind::CollaborationRequest,
                relevant,
                Some(&target.public_key),
            )?;
            json!({
                "encrypted": true,
                "data": wrapped,
                "prepared_at": Utc::now(),
            })
        };

        let size = serde_json::to_vec(&package)
            .map_err(|e| HubError::Internal(e.to_string()))?
            .len();
        debug!(target = %target.agent_id, size, "Prepared data package");
        Ok((package, size))
    }
}
