// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Hub configuration, loaded from the environment at startup.

use std::path::PathBuf;

fn env_bool(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Bypass real attestation policy and enable localhost spoke defaults.
    pub development_mode: bool,
    /// Use the deterministic keyword cortex instead of a loaded model.
    pub mock_llm: bool,
    pub client_id: String,
    pub host: String,
    pub api_port: u16,
    pub attestation_port: u16,
    pub data_root: PathBuf,
    pub log_level: String,
    pub finance_endpoint: Option<String>,
    pub marketing_endpoint: Option<String>,
    pub sales_endpoint: Option<String>,
}

impl HubConfig {
    pub fn from_env() -> Self {
        Self {
            development_mode: env_bool("DEVELOPMENT_MODE"),
            mock_llm: env_bool("MOCK_LLM_PROCESSING"),
            client_id: env_or("CLIENT_ID", "default"),
            host: env_or("HUB_HOST", "0.0.0.0"),
            api_port: env_or("HUB_API_PORT", "8080").parse().unwrap_or(8080),
            attestation_port: 29343,
            data_root: PathBuf::from(env_or("DATA_ROOT", "./data")),
            log_level: env_or("LOG_LEVEL", "info"),
            finance_endpoint: std::env::var("FINANCE_ENDPOINT").ok(),
            marketing_endpoint: std::env::var("MARKETING_ENDPOINT").ok(),
            sales_endpoint: std::env::var("SALES_ENDPOINT").ok(),
        }
    }

    pub fn key_dir(&self) -> PathBuf {
        self.data_root.join("keys")
    }
}
