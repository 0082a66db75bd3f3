// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! External collaborator seams: text extraction, categorization, synthesis.
//!
//! These are the replaceable "brains" around the coordination substrate. Any
//! implementation satisfying the shapes below is substitutable; the shipped
//! defaults are deterministic keyword models in `infrastructure::cortex`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::document::Categorization;
use crate::domain::orchestration::AgentResponse;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CortexError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Analysis failed: {0}")]
    Failed(String),
}

/// Combined view over collected agent responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Synthesis {
    pub executive_summary: String,
    pub recommendations: Vec<String>,
    pub confidence_score: f64,
    pub areas_of_agreement: Vec<String>,
    pub areas_of_disagreement: Vec<String>,
}

/// Extracts text from an uploaded blob. Must never fail into intake: an
/// unreadable document yields empty text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8], filename: &str) -> String;
}

/// Derives a categorization from extracted text.
#[async_trait]
pub trait Categorizer: Send + Sync {
    async fn categorize(&self, text: &str, filename: &str)
        -> Result<Categorization, CortexError>;
}

/// Folds collected responses into a final result.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, responses: &[AgentResponse]) -> Result<Synthesis, CortexError>;
}
