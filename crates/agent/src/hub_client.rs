// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent-side communication with the hub and with peer agents.
//!
//! Registration presents the attestation quote and public key in the
//! request body; heartbeats run on a 60-second loop with a tight
//! 5-second timeout and failures logged at debug. Peer collaborations
//! travel as secure envelopes, and a peer's reply envelope is verified
//! before any of its payload is used.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use conclave_protocol::{
    AgentKind, EnvelopeError, KeyStore, MessageKind, SecureChannel, WireEnvelope,
};

use crate::config::AgentConfig;

const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(30);
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(5);
const HEARTBEAT_PERIOD: Duration = Duration::from_secs(60);
const DEFAULT_COLLABORATION_TIMEOUT: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum HubClientError {
    #[error("Hub request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registration rejected: {0}")]
    Rejected(String),

    #[error("Target agent {0} not found")]
    PeerNotFound(String),

    #[error("Peer response rejected: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Collaboration failed: {0}")]
    Collaboration(String),
}

pub struct HubClient {
    http: reqwest::Client,
    hub_endpoint: String,
    agent_id: String,
    kind: AgentKind,
    client_id: String,
    keys: Arc<KeyStore>,
    channel: Arc<SecureChannel>,
    /// Directory entries learned from the hub, keyed by agent id.
    peers: RwLock<HashMap<String, Value>>,
    registered: AtomicBool,
}

impl HubClient {
    pub fn new(config: &AgentConfig, keys: Arc<KeyStore>, channel: Arc<SecureChannel>) -> Arc<Self> {
        Arc::new(Self {
            http: reqwest::Client::new(),
            hub_endpoint: config.hub_endpoint.trim_end_matches('/').to_string(),
            agent_id: config.agent_id.clone(),
            kind: config.kind,
            client_id: config.client_id.clone(),
            keys,
            channel,
            peers: RwLock::new(HashMap::new()),
            registered: AtomicBool::new(false),
        })
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Relaxed)
    }

    /// Register this agent with the hub, presenting attestation evidence.
    pub async fn register(
        &self,
        kind: &str,
        capabilities: &[String],
        endpoint: &str,
        attestation_endpoint: &str,
        quote: &str,
    ) -> Result<(), HubClientError> {
        let body = json!({
            "agent_id": self.agent_id,
            "agent_type": kind,
            "capabilities": capabilities,
            "endpoint": endpoint,
            "attestation_endpoint": attestation_endpoint,
            "attestation_data": {
                "quote": quote,
                "public_key": self.keys.public_key_pem(),
            },
        });

        let response = self
            .http
            .post(format!("{}/api/v1/agents/register", self.hub_endpoint))
            .json(&body)
            .header("X-Client-ID", &self.client_id)
            .header("X-Agent-ID", &self.agent_id)
            .timeout(REGISTRATION_TIMEOUT)
            .send()
            .await?;

        if response.status().as_u16() != 201 {
            let detail = response.text().await.unwrap_or_default();
            return Err(HubClientError::Rejected(detail));
        }

        let ack: Value = response.json().await?;
        if ack["verification_status"] != json!("verified") {
            return Err(HubClientError::Rejected(ack.to_string()));
        }

        self.registered.store(true, Ordering::Relaxed);
        info!(agent_id = %self.agent_id, hub = %self.hub_endpoint, "Registered with hub");
        Ok(())
    }

    /// Refresh last-seen at the hub. Failures are non-fatal.
    pub async fn heartbeat(&self) -> Result<(), HubClientError> {
        self.http
            .post(format!("{}/api/v1/agents/heartbeat", self.hub_endpoint))
            .json(&json!({
                "agent_id": self.agent_id,
                "status": "healthy",
                "timestamp": Utc::now(),
            }))
            .header("X-Client-ID", &self.client_id)
            .header("X-Agent-ID", &self.agent_id)
            .timeout(HEARTBEAT_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Query the hub directory, refreshing the local peer cache.
    pub async fn discover_agents(
        &self,
        capability: Option<&str>,
    ) -> Result<Vec<Value>, HubClientError> {
        let mut request = self
            .http
            .get(format!("{}/api/v1/agents/directory", self.hub_endpoint))
            .header("X-Client-ID", &self.client_id)
            .header("X-Agent-ID", &self.agent_id)
            .timeout(DISCOVERY_TIMEOUT);
        if let Some(capability) = capability {
            request = request.query(&[("capability", capability)]);
        }

        let body: Value = request.send().await?.error_for_status()?.json().await?;
        let agents: Vec<Value> = body["agents"].as_array().cloned().unwrap_or_default();

        let mut peers = self.peers.write();
        for agent in &agents {
            if let Some(id) = agent["agent_id"].as_str() {
                peers.insert(id.to_string(), agent.clone());
            }
        }

        Ok(agents)
    }

    /// Post a completed analysis back to the hub for a routed collaboration.
    pub async fn post_response(
        &self,
        routing_id: &str,
        result: Value,
    ) -> Result<Value, HubClientError> {
        let response = self
            .http
            .post(format!(
                "{}/api/v1/orchestration/response/{}",
                self.hub_endpoint, routing_id
            ))
            .json(&json!({
                "agent_id": self.agent_id,
                "agent_type": self.kind,
                "result": result,
            }))
            .header("X-Client-ID", &self.client_id)
            .timeout(REGISTRATION_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Originate a collaboration request to a peer agent, end-to-end through
    /// secure envelopes.
    pub async fn collaborate(
        &self,
        target_agent_id: &str,
        task_description: &str,
        context: Value,
        data_requirements: &[String],
    ) -> Result<Value, HubClientError> {
        let peer = match self.peers.read().get(target_agent_id).cloned() {
            Some(peer) => peer,
            None => {
                self.discover_agents(None).await?;
                self.peers
                    .read()
                    .get(target_agent_id)
                    .cloned()
                    .ok_or_else(|| HubClientError::PeerNotFound(target_agent_id.to_string()))?
            }
        };

        let endpoint = peer["endpoint"]
            .as_str()
            .ok_or_else(|| HubClientError::PeerNotFound(target_agent_id.to_string()))?
            .trim_end_matches('/')
            .to_string();

        let timeout_seconds = context
            .get("timeout")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_COLLABORATION_TIMEOUT);
        let payload = json!({
            "task_description": task_description,
            "context": context,
            "data_requirements": data_requirements,
            "priority": context.get("priority").cloned().unwrap_or(json!("normal")),
            "timeout_seconds": timeout_seconds,
        });

        let envelope = self.channel.seal(
            target_agent_id,
            MessageKind::CollaborationRequest,
            payload,
            None,
        )?;

        let response = self
            .http
            .post(format!("{}/api/v1/collaborate", endpoint))
            .json(&envelope)
            .header("X-Agent-ID", &self.agent_id)
            .timeout(Duration::from_secs(timeout_seconds))
            .send()
            .await?;

        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(HubClientError::Collaboration(detail));
        }

        let reply: WireEnvelope = response.json().await?;
        let opened = self.channel.open(&reply)?;
        if opened.message_type == MessageKind::Error {
            return Err(HubClientError::Collaboration(
                opened.payload["error"].as_str().unwrap_or("unknown").to_string(),
            ));
        }
        Ok(opened.payload)
    }
}

/// Heartbeat loop: one post per minute until the process exits.
pub fn spawn_heartbeat_loop(client: Arc<HubClient>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_PERIOD);
        loop {
            interval.tick().await;
            if let Err(e) = client.heartbeat().await {
                debug!(error = %e, "Heartbeat failed");
            }
        }
    })
}

/// Register with the hub, retrying is left to the caller; a refusal is
/// logged and the agent keeps serving locally.
pub async fn register_with_hub(
    client: &HubClient,
    config: &AgentConfig,
    capabilities: &[String],
    quote: &str,
) -> bool {
    let endpoint = format!("http://{}:{}", config.agent_id, config.api_port);
    let attestation_endpoint = format!("http://{}:{}", config.agent_id, config.attestation_port);

    match client
        .register(
            config.kind.as_str(),
            capabilities,
            &endpoint,
            &attestation_endpoint,
            quote,
        )
        .await
    {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Failed to register with hub");
            false
        }
    }
}
