// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP connector to spoke VMs.
//!
//! Peers are keyed by agent kind; base URLs come from the environment, with
//! localhost defaults in development mode. Every call carries an explicit
//! total timeout and maps onto the structured [`TransportError`] kinds.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::HubConfig;
use crate::domain::agent::AgentKind;
use crate::domain::transport::{PeerTransport, ProbeReport, TransportError};

const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const BROADCAST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct HttpPeerTransport {
    endpoints: BTreeMap<AgentKind, String>,
    client: reqwest::Client,
    client_id: String,
}

impl HttpPeerTransport {
    pub fn from_config(config: &HubConfig) -> Self {
        let mut endpoints = BTreeMap::new();
        if let Some(endpoint) = &config.finance_endpoint {
            endpoints.insert(AgentKind::Finance, endpoint.clone());
        }
        if let Some(endpoint) = &config.marketing_endpoint {
            endpoints.insert(AgentKind::Marketing, endpoint.clone());
        }
        if let Some(endpoint) = &config.sales_endpoint {
            endpoints.insert(AgentKind::Sales, endpoint.clone());
        }

        if config.development_mode {
            endpoints
                .entry(AgentKind::Finance)
                .or_insert_with(|| "http://localhost:8081".to_string());
            endpoints
                .entry(AgentKind::Marketing)
                .or_insert_with(|| "http://localhost:8082".to_string());
        }

        info!(
            peers = ?endpoints.keys().map(|k| k.as_str()).collect::<Vec<_>>(),
            "Loaded spoke endpoints"
        );

        Self {
            endpoints,
            client: reqwest::Client::new(),
            client_id: config.client_id.clone(),
        }
    }

    fn endpoint_for(&self, kind: AgentKind) -> Result<&str, TransportError> {
        self.endpoints
            .get(&kind)
            .map(String::as_str)
            .ok_or_else(|| TransportError::NotConfigured(kind.to_string()))
    }

    /// Probe a peer's secondary attestation port.
    pub async fn probe_attestation(&self, kind: AgentKind) -> Result<Value, TransportError> {
        let endpoint = self.endpoint_for(kind)?;
        let url = format!("{}/attestation", swap_port(endpoint, kind.attestation_port()));

        let response = self
            .client
            .get(&url)
            .timeout(HEALTH_PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| classify(kind, e))?;

        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::HttpStatus { code, body });
        }

        response.json().await.map_err(|e| TransportError::Unreachable {
            cause: format!("invalid attestation payload: {}", e),
        })
    }
}

fn classify(kind: AgentKind, error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(kind.to_string())
    } else {
        TransportError::Unreachable {
            cause: error.to_string(),
        }
    }
}

/// Rewrite an endpoint's port; endpoints without an explicit port get one
/// appended.
fn swap_port(endpoint: &str, port: u16) -> String {
    let trimmed = endpoint.trim_end_matches('/');
    match trimmed.rfind(':') {
        Some(idx) if idx > "https".len() => format!("{}:{}", &trimmed[..idx], port),
        _ => format!("{}:{}", trimmed, port),
    }
}

#[async_trait]
impl PeerTransport for HttpPeerTransport {
    async fn send(
        &self,
        kind: AgentKind,
        payload: Value,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        let endpoint = self.endpoint_for(kind)?;
        let url = format!("{}/api/v1/process", endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .header("X-Hub-Request", "true")
            .header("X-Client-ID", &self.client_id)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                error!(kind = %kind, error = %e, "Failed to communicate with agent VM");
                classify(kind, e)
            })?;

        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(kind = %kind, code, "Agent VM returned an error status");
            return Err(TransportError::HttpStatus { code, body });
        }

        response.json().await.map_err(|e| TransportError::Unreachable {
            cause: format!("invalid peer response: {}", e),
        })
    }

    async fn probe_all(&self) -> BTreeMap<String, ProbeReport> {
        let probes = self.endpoints.iter().map(|(kind, endpoint)| async move {
            let url = format!("{}/health", endpoint.trim_end_matches('/'));
            let started = Instant::now();
            let report = match self
                .client
                .get(&url)
                .timeout(HEALTH_PROBE_TIMEOUT)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    let latency_ms = started.elapsed().as_millis() as u64;
                    let detail = response.json().await.ok();
                    ProbeReport {
                        status: "healthy".into(),
                        endpoint: endpoint.clone(),
                        latency_ms: Some(latency_ms),
                        detail,
                        error: None,
                    }
                }
                Ok(response) => ProbeReport {
                    status: "unhealthy".into(),
                    endpoint: endpoint.clone(),
                    latency_ms: Some(started.elapsed().as_millis() as u64),
                    detail: None,
                    error: Some(format!("HTTP {}", response.status().as_u16())),
                },
                Err(e) => {
                    warn!(kind = %kind, error = %e, "Health probe failed");
                    ProbeReport {
                        status: "unreachable".into(),
                        endpoint: endpoint.clone(),
                        latency_ms: None,
                        detail: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            (kind.to_string(), report)
        });

        join_all(probes).await.into_iter().collect()
    }

    async fn broadcast(&self, payload: Value) -> BTreeMap<String, Result<Value, TransportError>> {
        let sends = self.endpoints.keys().map(|kind| {
            let payload = payload.clone();
            async move { (kind.to_string(), self.send(*kind, payload, BROADCAST_TIMEOUT).await) }
        });
        join_all(sends).await.into_iter().collect()
    }

    fn configured_kinds(&self) -> Vec<AgentKind> {
        self.endpoints.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_port() {
        assert_eq!(
            swap_port("http://localhost:8081", 29344),
            "http://localhost:29344"
        );
        assert_eq!(
            swap_port("https://finance-vm:8081/", 29344),
            "https://finance-vm:29344"
        );
        assert_eq!(swap_port("http://finance-vm", 29344), "http://finance-vm:29344");
    }

    #[test]
    fn test_dev_mode_defaults() {
        let config = HubConfig {
            development_mode: true,
            mock_llm: true,
            client_id: "default".into(),
            host: "0.0.0.0".into(),
            api_port: 8080,
            attestation_port: 29343,
            data_root: "./data".into(),
            log_level: "info".into(),
            finance_endpoint: None,
            marketing_endpoint: Some("http://marketing-vm:8082".into()),
            sales_endpoint: None,
        };

        let transport = HttpPeerTransport::from_config(&config);
        let kinds = transport.configured_kinds();
        assert!(kinds.contains(&AgentKind::Finance));
        // Explicit endpoints win over dev defaults
        assert_eq!(
            transport.endpoints[&AgentKind::Marketing],
            "http://marketing-vm:8082"
        );
        assert!(!kinds.contains(&AgentKind::Sales));
    }
}
