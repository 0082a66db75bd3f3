// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Spoke agent runtime: envelope handling, handler dispatch, routed work.
//!
//! Incoming peer collaborations arrive as secure envelopes on
//! `/collaborate`; the runtime opens them, dispatches by message kind, and
//! answers with an envelope signed by this agent — including the error path,
//! which never leaks raw verification failures to the peer. Hub-routed work
//! arrives as plain JSON on `/process`, optionally carrying an encrypted
//! data package.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{info, warn};

use conclave_protocol::{
    generate_dev_quote, AgentKind, AttestationSnapshot, Envelope, EnvelopeError, HandlerError,
    HandlerRegistry, KeyStore, MessageHandler, MessageKind, SecureChannel, WireEnvelope,
};

use crate::analyzer::DomainAnalyzer;
use crate::config::AgentConfig;

/// Request counters surfaced at `/metrics`.
#[derive(Default)]
pub struct AgentMetrics {
    pub requests_processed: AtomicU64,
    pub collaborations_handled: AtomicU64,
    pub failures: AtomicU64,
}

impl AgentMetrics {
    pub fn snapshot(&self) -> Value {
        json!({
            "requests_processed": self.requests_processed.load(Ordering::Relaxed),
            "collaborations_handled": self.collaborations_handled.load(Ordering::Relaxed),
            "failures": self.failures.load(Ordering::Relaxed),
        })
    }
}

pub struct AgentRuntime {
    pub agent_id: String,
    pub kind: AgentKind,
    pub client_id: String,
    pub development_mode: bool,
    channel: Arc<SecureChannel>,
    keys: Arc<KeyStore>,
    analyzer: Arc<dyn DomainAnalyzer>,
    handlers: HandlerRegistry,
    pub metrics: AgentMetrics,
    started_at: DateTime<Utc>,
    quote: String,
}

impl AgentRuntime {
    pub fn new(
        config: &AgentConfig,
        keys: Arc<KeyStore>,
        analyzer: Arc<dyn DomainAnalyzer>,
    ) -> Arc<Self> {
        let channel = Arc::new(SecureChannel::new(config.agent_id.clone(), keys.clone()));

        let mut handlers = HandlerRegistry::new();
        handlers.register(
            MessageKind::CollaborationRequest,
            Arc::new(CollaborationHandler {
                analyzer: analyzer.clone(),
                agent_id: config.agent_id.clone(),
                kind: config.kind,
            }),
        );
        handlers.register(
            MessageKind::HealthCheck,
            Arc::new(HealthCheckHandler {
                agent_id: config.agent_id.clone(),
                kind: config.kind,
            }),
        );

        let quote = generate_dev_quote(keys.fingerprint());

        Arc::new(Self {
            agent_id: config.agent_id.clone(),
            kind: config.kind,
            client_id: config.client_id.clone(),
            development_mode: config.development_mode,
            channel,
            keys,
            analyzer,
            handlers,
            metrics: AgentMetrics::default(),
            started_at: Utc::now(),
            quote,
        })
    }

    pub fn channel(&self) -> &Arc<SecureChannel> {
        &self.channel
    }

    pub fn keys(&self) -> &Arc<KeyStore> {
        &self.keys
    }

    pub fn analyzer(&self) -> &Arc<dyn DomainAnalyzer> {
        &self.analyzer
    }

    pub fn uptime_seconds(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }

    pub fn attestation_snapshot(&self) -> AttestationSnapshot {
        AttestationSnapshot {
            status: "healthy".into(),
            quote: self.quote.clone(),
            public_key_fingerprint: self.keys.fingerprint().to_string(),
            generated_at: Utc::now(),
        }
    }

    /// Current attestation quote, used at registration time.
    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Handle a peer's secure envelope and answer with one of our own.
    ///
    /// Verification failures are consumed here: the peer receives a signed
    /// `error` envelope carrying only the stable error kind.
    pub async fn handle_collaboration_envelope(
        &self,
        wire: &WireEnvelope,
    ) -> Result<WireEnvelope, EnvelopeError> {
        let envelope = match self.channel.open(wire) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.metrics.failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Rejected incoming envelope");
                return self.error_envelope("unknown", e.code());
            }
        };

        let started = Utc::now();
        let sender = envelope.sender_id.clone();
        match self
            .handlers
            .dispatch(envelope.message_type, envelope.payload.clone())
            .await
        {
            Ok(mut result) => {
                self.metrics
                    .collaborations_handled
                    .fetch_add(1, Ordering::Relaxed);
                let elapsed_ms = Utc::now()
                    .signed_duration_since(started)
                    .num_milliseconds();
                if let Some(map) = result.as_object_mut() {
                    map.insert("processing_time_ms".into(), json!(elapsed_ms));
                    map.insert("requester_id".into(), json!(sender));
                }

                let confidence = result
                    .pointer("/result/confidence_score")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);
                let payload = json!({
                    "request_id": envelope.nonce,
                    "status": "completed",
                    "result": result,
                    "confidence_score": confidence,
                });
                self.channel
                    .seal(&sender, MessageKind::CollaborationResponse, payload, None)
            }
            Err(e) => {
                self.metrics.failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, sender = %sender, "Collaboration handler failed");
                self.error_envelope(&sender, e.code())
            }
        }
    }

    fn error_envelope(
        &self,
        recipient: &str,
        code: &str,
    ) -> Result<WireEnvelope, EnvelopeError> {
        self.channel.seal(
            recipient,
            MessageKind::Error,
            json!({ "error": code }),
            None,
        )
    }

    /// Handle hub-routed work from `/process`.
    ///
    /// The data package is opened here when the hub encrypted it; analyzers
    /// only ever see plaintext package data.
    pub async fn process_routed_work(&self, payload: &Value) -> Result<Value, HandlerError> {
        self.metrics
            .requests_processed
            .fetch_add(1, Ordering::Relaxed);

        let query = payload
            .get("query")
            .or_else(|| payload.get("task_description"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let data = self.unwrap_data_package(payload.get("data_package"))?;
        let report = self
            .analyzer
            .analyze(&data, &query)
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))?;

        info!(agent_id = %self.agent_id, "Processed routed work");

        Ok(json!({
            "routing_id": payload.get("routing_id"),
            "status": "completed",
            "agent_id": self.agent_id,
            "agent_type": self.kind,
            "result": report,
            "processed_at": Utc::now(),
        }))
    }

    fn unwrap_data_package(&self, package: Option<&Value>) -> Result<Value, HandlerError> {
        let Some(package) = package else {
            return Ok(json!({}));
        };

        if package
            .get("encrypted")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            let wire: WireEnvelope =
                serde_json::from_value(package.get("data").cloned().unwrap_or(Value::Null))
                    .map_err(|e| HandlerError::Failed(format!("malformed data package: {}", e)))?;
            let envelope: Envelope = self.channel.open(&wire).map_err(|e| {
                self.metrics.failures.fetch_add(1, Ordering::Relaxed);
                HandlerError::Failed(format!("data package rejected: {}", e.code()))
            })?;
            Ok(envelope.payload)
        } else {
            Ok(package.get("data").cloned().unwrap_or(Value::Null))
        }
    }
}

struct CollaborationHandler {
    analyzer: Arc<dyn DomainAnalyzer>,
    agent_id: String,
    kind: AgentKind,
}

#[async_trait]
impl MessageHandler for CollaborationHandler {
    async fn handle(&self, payload: Value) -> Result<Value, HandlerError> {
        let task = payload
            .get("task_description")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let data = payload
            .get("data_package")
            .and_then(|p| p.get("data").or(Some(p)))
            .cloned()
            .unwrap_or(json!({}));

        let report = self
            .analyzer
            .analyze(&data, task)
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))?;

        Ok(json!({
            "status": "completed",
            "result": report,
            "agent_id": self.agent_id,
            "agent_type": self.kind,
            "processed_at": Utc::now(),
        }))
    }
}

struct HealthCheckHandler {
    agent_id: String,
    kind: AgentKind,
}

#[async_trait]
impl MessageHandler for HealthCheckHandler {
    async fn handle(&self, _payload: Value) -> Result<Value, HandlerError> {
        Ok(json!({
            "status": "healthy",
            "agent_id": self.agent_id,
            "agent_type": self.kind,
        }))
    }
}
