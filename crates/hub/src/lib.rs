// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # conclave-hub
//!
//! The hub of the Conclave federation: admits attested specialist agents,
//! catalogs client documents, and orchestrates cross-agent collaborations.
//!
//! ## Layer Structure
//!
//! ```text
//! presentation/   ← HTTP API (axum), attestation endpoint
//!     ↓
//! application/    ← registry, orchestration engine, intake, data packaging
//!     ↓
//! domain/         ← agent/document/collaboration models, service seams
//!     ↓
//! infrastructure/ ← HTTP peer transport, keyword cortex
//! ```
//!
//! ## Shared state
//!
//! Three tables back the hub, all in-memory and client-scoped: the agent
//! registry `(client, agent_id)`, the active-collaborations table keyed by
//! routing id, and the document catalog keyed by document id. Read-modify-
//! write sequences are serialized per key; there is no ordering across
//! routing ids.

pub mod application;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod presentation;

pub use config::HubConfig;
pub use context::AppContext;
pub use error::HubError;
