// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pluggable domain analyzers.
//!
//! An analyzer is the replaceable brain of a spoke: it receives a data
//! package and a query and produces a report with insights and a confidence
//! score. The shipped finance and marketing analyzers compute their metrics
//! arithmetically from the package; a model-backed analyzer slots in behind
//! the same trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use conclave_protocol::AgentKind;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AnalyzerError {
    #[error("Data package is missing {0}")]
    MissingData(String),

    #[error("Analysis failed: {0}")]
    Failed(String),
}

/// The uniform shape every analyzer produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerReport {
    pub analysis_type: String,
    pub summary: String,
    pub detailed_results: Value,
    pub key_insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub confidence_score: f64,
}

#[async_trait]
pub trait DomainAnalyzer: Send + Sync {
    fn kind(&self) -> AgentKind;
    fn capabilities(&self) -> Vec<String>;
    fn specializations(&self) -> Vec<String>;
    async fn analyze(&self, data: &Value, query: &str) -> Result<AnalyzerReport, AnalyzerError>;
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn number(data: &Value, pointer: &str, default: f64) -> f64 {
    data.pointer(pointer).and_then(Value::as_f64).unwrap_or(default)
}

/// Financial health and ROI analysis over the `financial_data` slice.
pub struct FinanceAnalyzer;

#[async_trait]
impl DomainAnalyzer for FinanceAnalyzer {
    fn kind(&self) -> AgentKind {
        AgentKind::Finance
    }

    fn capabilities(&self) -> Vec<String> {
        [
            "financial_analysis",
            "roi_calculation",
            "budget_planning",
            "variance_analysis",
            "cash_flow_analysis",
            "risk_assessment",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn specializations(&self) -> Vec<String> {
        [
            "Campaign ROI Analysis",
            "Budget Variance Analysis",
            "Financial Health Assessment",
            "Cost-Benefit Analysis",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    async fn analyze(&self, data: &Value, query: &str) -> Result<AnalyzerReport, AnalyzerError> {
        let has_financials = data.pointer("/financial_data").is_some();
        let revenue = number(data, "/financial_data/revenue", 1_000_000.0);
        let expenses = number(data, "/financial_data/expenses", 800_000.0);
        let spend = number(data, "/marketing_data/spend", 0.0)
            .max(number(data, "/request_context/marketing_spend", 0.0));

        if revenue <= 0.0 {
            return Err(AnalyzerError::MissingData("a positive revenue figure".into()));
        }

        let net_profit = revenue - expenses;
        let profit_margin_percent = round2(net_profit / revenue * 100.0);

        let mut detailed = json!({
            "revenue": revenue,
            "expenses": expenses,
            "net_profit": net_profit,
            "profit_margin_percent": profit_margin_percent,
        });

        let mut insights = vec![margin_interpretation(profit_margin_percent).to_string()];

        if spend > 0.0 {
            // Attribution falls back to a flat 1.25x return multiple when the
            // package carries no attributed revenue.
            let attributed = number(data, "/request_context/attributed_revenue", spend * 1.25);
            let roi_percentage = round2((attributed - spend) / spend * 100.0);
            detailed["roi_percentage"] = json!(roi_percentage);
            detailed["attributed_revenue"] = json!(attributed);
            detailed["return_on_spend"] = json!(round2(attributed / spend));
            insights.push(format!(
                "Campaign spend of {:.0} returned {:.2}% ROI",
                spend, roi_percentage
            ));
        }

        let recommendations = if profit_margin_percent < 5.0 {
            vec![
                "Review cost structure for reduction opportunities".to_string(),
                "Prioritize high-margin revenue streams".to_string(),
            ]
        } else {
            vec!["Maintain current allocation and monitor variance monthly".to_string()]
        };

        Ok(AnalyzerReport {
            analysis_type: "financial_analysis".into(),
            summary: format!(
                "Net profit {:.0} at {:.1}% margin for the analyzed period",
                net_profit, profit_margin_percent
            ),
            detailed_results: detailed,
            key_insights: insights,
            recommendations,
            confidence_score: if has_financials { 0.9 } else { 0.75 },
        })
        .map(|report| annotate_query(report, query))
    }
}

fn margin_interpretation(margin: f64) -> &'static str {
    if margin > 15.0 {
        "Strong profitability with healthy margins"
    } else if margin > 5.0 {
        "Moderate profitability, watch expense growth"
    } else {
        "Weak margins, cost review advised"
    }
}

/// Campaign performance analysis over the `marketing_data` slice.
pub struct MarketingAnalyzer;

/// Deterministic per-conversion revenue assumption used when attribution is
/// absent from the package.
const REVENUE_PER_CONVERSION: f64 = 150.0;

#[async_trait]
impl DomainAnalyzer for MarketingAnalyzer {
    fn kind(&self) -> AgentKind {
        AgentKind::Marketing
    }

    fn capabilities(&self) -> Vec<String> {
        [
            "marketing_analysis",
            "campaign_performance",
            "customer_segmentation",
            "market_research",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn specializations(&self) -> Vec<String> {
        [
            "Campaign Performance Analysis",
            "Conversion Funnel Analysis",
            "Spend Efficiency Review",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    async fn analyze(&self, data: &Value, query: &str) -> Result<AnalyzerReport, AnalyzerError> {
        let has_marketing = data.pointer("/marketing_data").is_some();
        let spend = number(data, "/marketing_data/spend", 50_000.0);
        let impressions = number(data, "/marketing_data/impressions", 1_000_000.0);
        let clicks = number(data, "/request_context/clicks", 25_000.0);
        let conversions = number(data, "/request_context/conversions", 500.0);

        if impressions <= 0.0 {
            return Err(AnalyzerError::MissingData("impression counts".into()));
        }

        let ctr = round2(clicks / impressions * 100.0);
        let cost_per_mille = round2(spend / impressions * 1000.0);
        let conversion_rate = if clicks > 0.0 {
            round2(conversions / clicks * 100.0)
        } else {
            0.0
        };
        let cost_per_acquisition = if conversions > 0.0 {
            round2(spend / conversions)
        } else {
            0.0
        };
        let attributed = conversions * REVENUE_PER_CONVERSION;
        let roi_percentage = if spend > 0.0 {
            round2((attributed - spend) / spend * 100.0)
        } else {
            0.0
        };

        let detailed = json!({
            "total_spend": spend,
            "total_impressions": impressions,
            "click_through_rate": ctr,
            "cost_per_mille": cost_per_mille,
            "conversion_rate": conversion_rate,
            "cost_per_acquisition": cost_per_acquisition,
            "attributed_revenue": attributed,
            "roi_percentage": roi_percentage,
            "return_on_ad_spend": if spend > 0.0 { round2(attributed / spend) } else { 0.0 },
        });

        let mut insights = vec![format!(
            "Click-through rate of {:.2}% across {:.0} impressions",
            ctr, impressions
        )];
        if roi_percentage < 0.0 {
            insights.push("Campaign is currently below break-even".to_string());
        }

        let recommendations = if roi_percentage < 25.0 {
            vec![
                "Shift budget towards highest-converting channels".to_string(),
                "Share conversion attribution data with finance".to_string(),
            ]
        } else {
            vec!["Scale spend while efficiency holds".to_string()]
        };

        Ok(AnalyzerReport {
            analysis_type: "campaign_performance".into(),
            summary: format!(
                "Campaign ROI {:.1}% at {:.2} cost per acquisition",
                roi_percentage, cost_per_acquisition
            ),
            detailed_results: detailed,
            key_insights: insights,
            recommendations,
            confidence_score: if has_marketing { 0.88 } else { 0.72 },
        })
        .map(|report| annotate_query(report, query))
    }
}

fn annotate_query(mut report: AnalyzerReport, query: &str) -> AnalyzerReport {
    if !query.is_empty() {
        report.detailed_results["query"] = json!(query);
    }
    report
}
