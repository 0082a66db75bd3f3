// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Conclave spoke agent entry point.
//!
//! Registers with the hub, runs the heartbeat loop, serves the agent API on
//! `AGENT_API_PORT` and attestation evidence on the kind's secondary port.

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use conclave_agent::analyzer::{DomainAnalyzer, FinanceAnalyzer, MarketingAnalyzer};
use conclave_agent::api::{app, attestation_app, AgentContext};
use conclave_agent::hub_client::{register_with_hub, spawn_heartbeat_loop, HubClient};
use conclave_agent::{AgentConfig, AgentRuntime};
use conclave_protocol::{AgentKind, KeyStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AgentConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!(
        agent_id = %config.agent_id,
        kind = %config.kind,
        hub = %config.hub_endpoint,
        development_mode = config.development_mode,
        "Starting Conclave agent"
    );

    let keys = Arc::new(
        KeyStore::load_or_generate(&config.key_dir())
            .context("key store unavailable at startup")?,
    );

    let analyzer: Arc<dyn DomainAnalyzer> = match config.kind {
        AgentKind::Finance => Arc::new(FinanceAnalyzer),
        AgentKind::Marketing => Arc::new(MarketingAnalyzer),
        other => bail!("no analyzer available for agent kind {}", other),
    };

    let runtime = AgentRuntime::new(&config, keys.clone(), analyzer);
    let hub_client = HubClient::new(&config, keys, runtime.channel().clone());

    if register_with_hub(
        &hub_client,
        &config,
        &runtime.analyzer().capabilities(),
        runtime.quote(),
    )
    .await
    {
        info!("Hub registration verified");
    } else {
        warn!("Continuing without hub registration");
    }
    let _heartbeat = spawn_heartbeat_loop(hub_client.clone());

    let ctx = Arc::new(AgentContext {
        runtime,
        hub_client,
    });

    let attestation_addr = format!("{}:{}", config.host, config.attestation_port);
    let attestation_listener = tokio::net::TcpListener::bind(&attestation_addr)
        .await
        .with_context(|| format!("binding attestation listener on {}", attestation_addr))?;
    let attestation_router = attestation_app(ctx.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(attestation_listener, attestation_router).await {
            tracing::error!(error = %e, "Attestation listener failed");
        }
    });
    info!(addr = %attestation_addr, "Attestation endpoint listening");

    let api_addr = format!("{}:{}", config.host, config.api_port);
    let listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("binding API listener on {}", api_addr))?;
    info!(addr = %api_addr, "Agent API listening");

    axum::serve(listener, app(ctx)).await?;
    Ok(())
}
