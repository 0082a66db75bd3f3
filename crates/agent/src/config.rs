// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Spoke agent configuration, loaded from the environment at startup.

use std::path::PathBuf;
use std::str::FromStr;

use conclave_protocol::AgentKind;

fn env_bool(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub agent_id: String,
    pub kind: AgentKind,
    pub client_id: String,
    pub hub_endpoint: String,
    pub host: String,
    pub api_port: u16,
    pub attestation_port: u16,
    pub data_root: PathBuf,
    pub log_level: String,
    pub development_mode: bool,
    pub mock_llm: bool,
}

impl AgentConfig {
    pub fn from_env() -> Self {
        let kind = std::env::var("AGENT_KIND")
            .ok()
            .and_then(|v| AgentKind::from_str(&v).ok())
            .unwrap_or(AgentKind::Finance);
        let client_id = env_or("CLIENT_ID", "default");
        let agent_id = std::env::var("AGENT_ID")
            .unwrap_or_else(|_| format!("{}-agent-{}", kind, client_id));
        let api_port = env_or("AGENT_API_PORT", &kind.default_api_port().to_string())
            .parse()
            .unwrap_or_else(|_| kind.default_api_port());

        Self {
            agent_id,
            kind,
            client_id,
            hub_endpoint: env_or("HUB_ENDPOINT", "http://localhost:8080"),
            host: env_or("AGENT_HOST", "0.0.0.0"),
            api_port,
            attestation_port: kind.attestation_port(),
            data_root: PathBuf::from(env_or("DATA_ROOT", "./data")),
            log_level: env_or("LOG_LEVEL", "info"),
            development_mode: env_bool("DEVELOPMENT_MODE"),
            mock_llm: env_bool("MOCK_LLM_PROCESSING"),
        }
    }

    pub fn key_dir(&self) -> PathBuf {
        self.data_root.join("keys")
    }
}
