// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Document catalog model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Caller-supplied metadata attached at upload time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Map<String, Value>,
}

/// Categorization produced by the external categorizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Categorization {
    pub department: String,
    pub document_type: String,
    pub key_terms: Vec<String>,
    #[serde(default)]
    pub time_period: Option<String>,
    pub summary: String,
    pub confidence_score: f64,
}

/// A cataloged document. `Completed` records always carry a categorization;
/// `Failed` records never do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: String,
    pub upload_id: String,
    pub filename: String,
    pub file_type: String,
    pub file_size: u64,
    pub status: DocumentStatus,
    pub upload_date: DateTime<Utc>,
    #[serde(default)]
    pub processing_date: Option<DateTime<Utc>>,
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub categorization: Option<Categorization>,
    pub content_hash: String,
    pub storage_path: String,
    pub client_id: String,
}

/// Search filters for catalog queries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentFilters {
    pub department: Option<String>,
    pub document_type: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

/// Map a filename extension onto the coarse file-kind used for
/// categorization defaults.
pub fn detect_file_type(filename: &str) -> &'static str {
    let ext = filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => "pdf",
        "docx" | "doc" => "word",
        "xlsx" | "xls" => "excel",
        "csv" => "csv",
        "txt" => "text",
        "eml" | "msg" => "email",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_file_type() {
        assert_eq!(detect_file_type("q4_budget.xlsx"), "excel");
        assert_eq!(detect_file_type("report.PDF"), "pdf");
        assert_eq!(detect_file_type("notes"), "other");
        assert_eq!(detect_file_type("mail.eml"), "email");
    }
}
