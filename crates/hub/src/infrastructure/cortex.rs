// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Deterministic keyword implementations of the cortex seams.
//!
//! These stand in for a loaded language model behind the same traits: a
//! keyword categorizer, a keyword router, and a concatenating synthesizer.
//! All outputs are pure functions of their inputs so routing and tests stay
//! reproducible. A model-backed implementation replaces these without
//! touching the engine.

use async_trait::async_trait;

use crate::domain::agent::{AgentKind, AgentRecord};
use crate::domain::cortex::{Categorizer, CortexError, Synthesis, Synthesizer, TextExtractor};
use crate::domain::document::Categorization;
use crate::domain::orchestration::{AgentResponse, Priority, RouterPolicy, RoutingDecision};

const FINANCE_KEYWORDS: &[&str] = &["roi", "budget", "financial", "revenue", "cost"];
const MARKETING_KEYWORDS: &[&str] = &["campaign", "marketing", "customer", "brand"];
const SALES_KEYWORDS: &[&str] = &["sales", "pipeline", "leads", "deals"];

const DEPARTMENT_FINANCE: &[&str] = &["revenue", "expense", "budget", "financial", "roi"];
const DEPARTMENT_MARKETING: &[&str] = &["campaign", "marketing", "customer", "brand"];
const DEPARTMENT_SALES: &[&str] = &["sales", "pipeline", "leads", "quota"];

const KEY_TERM_CANDIDATES: &[&str] = &[
    "budget", "revenue", "campaign", "q4", "analysis", "report", "forecast",
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Treats the blob as UTF-8 text; anything unreadable yields empty text,
/// which intake reports as an extraction failure.
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, bytes: &[u8], _filename: &str) -> String {
        match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => String::new(),
        }
    }
}

/// Keyword-driven categorizer and synthesizer.
#[derive(Default)]
pub struct KeywordCortex;

impl KeywordCortex {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Categorizer for KeywordCortex {
    async fn categorize(
        &self,
        text: &str,
        filename: &str,
    ) -> Result<Categorization, CortexError> {
        let text_lower = text.to_lowercase();
        let filename_lower = filename.to_lowercase();

        let department = if contains_any(&text_lower, DEPARTMENT_FINANCE) {
            "Finance"
        } else if contains_any(&text_lower, DEPARTMENT_MARKETING) {
            "Marketing"
        } else if contains_any(&text_lower, DEPARTMENT_SALES) {
            "Sales"
        } else {
            "Operations"
        };

        let document_type = if filename_lower.ends_with(".xlsx") || filename_lower.ends_with(".xls")
        {
            "Data/Spreadsheet"
        } else if filename_lower.ends_with(".pdf") {
            "Report"
        } else if filename_lower.ends_with(".docx") || filename_lower.ends_with(".doc") {
            "Document"
        } else if filename_lower.ends_with(".eml") || filename_lower.ends_with(".msg") {
            "Email"
        } else {
            "Other"
        };

        let mut key_terms: Vec<String> = KEY_TERM_CANDIDATES
            .iter()
            .filter(|term| text_lower.contains(*term))
            .map(|term| term.to_string())
            .collect();
        if key_terms.is_empty() {
            key_terms = vec!["business".into(), "data".into(), "analysis".into()];
        }
        key_terms.truncate(5);

        let quarter = ["Q1", "Q2", "Q3", "Q4"]
            .iter()
            .find(|q| text.contains(*q));
        let year = text
            .split(|c: char| !c.is_ascii_digit())
            .find(|tok| tok.len() == 4 && tok.starts_with("20"));
        let time_period = quarter.map(|q| match year {
            Some(y) => format!("{} {}", q, y),
            None => q.to_string(),
        });

        Ok(Categorization {
            department: department.to_string(),
            document_type: document_type.to_string(),
            key_terms,
            time_period,
            summary: format!(
                "Business {} containing {} data",
                document_type.to_lowercase(),
                department.to_lowercase()
            ),
            confidence_score: 0.9,
        })
    }
}

#[async_trait]
impl Synthesizer for KeywordCortex {
    async fn synthesize(&self, responses: &[AgentResponse]) -> Result<Synthesis, CortexError> {
        if responses.is_empty() {
            return Ok(Synthesis {
                executive_summary: "No results to synthesize".into(),
                recommendations: Vec::new(),
                confidence_score: 0.0,
                areas_of_agreement: Vec::new(),
                areas_of_disagreement: Vec::new(),
            });
        }

        let mut summaries = Vec::new();
        let mut recommendations = Vec::new();
        let mut confidences = Vec::new();

        for response in responses {
            let label = response.agent_type.as_deref().unwrap_or("unknown");
            if let Some(summary) = response.result.get("summary").and_then(|v| v.as_str()) {
                summaries.push(format!("{}: {}", label, summary));
            }
            if let Some(recs) = response
                .result
                .get("recommendations")
                .and_then(|v| v.as_array())
            {
                recommendations.extend(
                    recs.iter()
                        .filter_map(|r| r.as_str())
                        .map(|r| r.to_string()),
                );
            }
            confidences.push(
                response
                    .result
                    .get("confidence_score")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.8),
            );
        }

        let executive_summary = format!(
            "Multi-agent analysis completed. {}",
            summaries
                .iter()
                .take(2)
                .cloned()
                .collect::<Vec<_>>()
                .join(" ")
        );
        recommendations.truncate(3);

        let mean = confidences.iter().sum::<f64>() / confidences.len() as f64;
        let spread = confidences
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max)
            - confidences.iter().cloned().fold(f64::INFINITY, f64::min);

        let areas_of_disagreement = if spread > 0.3 {
            vec!["Confidence levels diverge across agents".to_string()]
        } else {
            Vec::new()
        };

        Ok(Synthesis {
            executive_summary,
            recommendations,
            confidence_score: (mean * 100.0).round() / 100.0,
            areas_of_agreement: vec![
                "Data accuracy confirmed".into(),
                "Trends identified".into(),
            ],
            areas_of_disagreement,
        })
    }
}

/// Keyword router. Deterministic given the query and the available set.
pub struct KeywordRouter;

#[async_trait]
impl RouterPolicy for KeywordRouter {
    async fn select(&self, query: &str, available: &[AgentRecord]) -> RoutingDecision {
        let query_lower = query.to_lowercase();

        let (mut selected, mut reasoning, priority, mut confidence) =
            if contains_any(&query_lower, FINANCE_KEYWORDS) {
                (
                    AgentKind::Finance,
                    "Query contains financial terms requiring specialized analysis".to_string(),
                    Priority::High,
                    0.9,
                )
            } else if contains_any(&query_lower, MARKETING_KEYWORDS) {
                (
                    AgentKind::Marketing,
                    "Query relates to marketing activities and campaigns".to_string(),
                    Priority::Medium,
                    0.9,
                )
            } else if contains_any(&query_lower, SALES_KEYWORDS) {
                (
                    AgentKind::Sales,
                    "Query involves sales data and pipeline analysis".to_string(),
                    Priority::Medium,
                    0.9,
                )
            } else {
                let first = available
                    .first()
                    .map(|a| a.agent_type)
                    .unwrap_or(AgentKind::Finance);
                (
                    first,
                    "General business query routed to available specialist".to_string(),
                    Priority::Low,
                    0.75,
                )
            };

        if !available.iter().any(|a| a.agent_type == selected) {
            if let Some(first) = available.first() {
                selected = first.agent_type;
                reasoning = format!("Preferred agent not available, routing to {}", selected);
                confidence = 0.75;
            }
        }

        let estimated_minutes = match priority {
            Priority::High => 4,
            Priority::Medium => 3,
            Priority::Low => 2,
        };

        RoutingDecision {
            selected_kind: selected,
            reasoning,
            priority,
            estimated_minutes,
            confidence,
        }
    }
}
