// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Conclave hub entry point.
//!
//! Serves the main API on `HUB_API_PORT`, the attestation evidence on the
//! secondary port, and runs the background reaper for abandoned
//! collaborations.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use conclave_hub::application::engine::spawn_reaper;
use conclave_hub::presentation::api::{app, attestation_app};
use conclave_hub::{AppContext, HubConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = HubConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!(
        development_mode = config.development_mode,
        client_id = %config.client_id,
        "Starting Conclave Hub"
    );

    let ctx = AppContext::initialize(config.clone())?;
    let _reaper = spawn_reaper(ctx.engine.clone());

    // Secondary listener: attestation evidence only.
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
    info!(addr = %api_addr, "Hub API listening");

    axum::serve(listener, app(ctx)).await?;
    Ok(())
}
