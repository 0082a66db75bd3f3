// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Document intake: blob storage, hashing, categorization, catalog upsert.
//!
//! The one invariant owned here is atomicity at the catalog: a document
//! becomes queryable only once categorization has succeeded. Extraction or
//! categorization failures leave a `Failed` record — never a `Completed`
//! record missing its categorization.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{error, info};
use uuid::Uuid;

use crate::application::package::CatalogIndex;
use crate::domain::cortex::{Categorizer, TextExtractor};
use crate::domain::document::{
    detect_file_type, Categorization, DocumentFilters, DocumentMetadata, DocumentRecord,
    DocumentStatus,
};
use crate::error::HubError;

/// Cap on text persisted alongside the categorization.
const STORED_TEXT_LIMIT: usize = 50_000;

#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub status: String,
    pub upload_id: String,
    pub document_id: String,
    pub categorization: Categorization,
}

pub struct DocumentIntake {
    uploads_dir: PathBuf,
    processed_dir: PathBuf,
    extractor: Arc<dyn TextExtractor>,
    categorizer: Arc<dyn Categorizer>,
    catalog: DashMap<String, DocumentRecord>,
}

impl DocumentIntake {
    pub fn new(
        data_root: &Path,
        extractor: Arc<dyn TextExtractor>,
        categorizer: Arc<dyn Categorizer>,
    ) -> Result<Self, HubError> {
        let uploads_dir = data_root.join("uploads");
        let processed_dir = data_root.join("processed");
        std::fs::create_dir_all(&uploads_dir)
            .and_then(|_| std::fs::create_dir_all(&processed_dir))
            .map_err(|e| HubError::Internal(format!("Failed to create storage dirs: {}", e)))?;

        Ok(Self {
            uploads_dir,
            processed_dir,
            extractor,
            categorizer,
            catalog: DashMap::new(),
        })
    }

    pub async fn process_upload(
        &self,
        content: &[u8],
        filename: &str,
        metadata: DocumentMetadata,
        client_id: &str,
    ) -> Result<UploadOutcome, HubError> {
        let upload_id = format!("upload_{}", short_id());
        let document_id = format!("doc_{}", short_id());

        // Only the final path component; uploads must not escape the store.
        let safe_name = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unnamed".to_string());

        let upload_path = self.uploads_dir.join(format!("{}_{}", upload_id, safe_name));
        tokio::fs::write(&upload_path, content)
            .await
            .map_err(|e| HubError::Internal(format!("Failed to store upload: {}", e)))?;

        let content_hash = hex::encode(Sha256::digest(content));

        let mut record = DocumentRecord {
            document_id: document_id.clone(),
            upload_id: upload_id.clone(),
            filename: safe_name.clone(),
            file_type: detect_file_type(&safe_name).to_string(),
            file_size: content.len() as u64,
            status: DocumentStatus::Processing,
            upload_date: Utc::now(),
            processing_date: None,
            metadata: metadata.clone(),
            categorization: None,
            content_hash,
            storage_path: upload_path.to_string_lossy().to_string(),
            client_id: client_id.to_string(),
        };

        let text = self.extractor.extract(content, &safe_name).await;
        if text.trim().is_empty() {
            error!(document_id, filename = %safe_name, "Text extraction produced nothing");
            self.store_failed(record);
            return Err(HubError::BadRequest(
                "Failed to extract text content from document".into(),
            ));
        }

        let categorization = match self.categorizer.categorize(&text, &safe_name).await {
            Ok(c) => c,
            Err(e) => {
                error!(document_id, error = %e, "Categorization failed");
                self.store_failed(record);
                return Err(HubError::Internal(e.to_string()));
            }
        };

        let processed_path = self.processed_dir.join(format!("{}.json", document_id));
        let stored_text: String = text.chars().take(STORED_TEXT_LIMIT).collect();
        let processed = json!({
            "document_id": document_id,
            "text_content": stored_text,
            "categorization": categorization,
            "metadata": metadata,
        });
        tokio::fs::write(&processed_path, processed.to_string())
            .await
            .map_err(|e| HubError::Internal(format!("Failed to persist categorization: {}", e)))?;

        record.status = DocumentStatus::Completed;
        record.processing_date = Some(Utc::now());
        record.categorization = Some(categorization.clone());
        record.storage_path = processed_path.to_string_lossy().to_string();
        self.catalog.insert(document_id.clone(), record);

        info!(document_id, client_id, "Document processed");

        Ok(UploadOutcome {
            status: "completed".into(),
            upload_id,
            document_id,
            categorization,
        })
    }

    fn store_failed(&self, mut record: DocumentRecord) {
        record.status = DocumentStatus::Failed;
        record.processing_date = Some(Utc::now());
        self.catalog.insert(record.document_id.clone(), record);
    }

    pub fn get_document(&self, document_id: &str) -> Option<DocumentRecord> {
        self.catalog.get(document_id).map(|r| r.clone())
    }

    pub fn search_documents(
        &self,
        client_id: &str,
        filters: &DocumentFilters,
    ) -> Vec<DocumentRecord> {
        let mut results: Vec<DocumentRecord> = self
            .catalog
            .iter()
            .filter(|doc| doc.client_id == client_id)
            .filter(|doc| {
                let categorization = match &doc.categorization {
                    Some(c) => c,
                    None => return false,
                };
                if let Some(department) = &filters.department {
                    if &categorization.department != department {
                        return false;
                    }
                }
                if let Some(document_type) = &filters.document_type {
                    if &categorization.document_type != document_type {
                        return false;
                    }
                }
                if let Some(from) = filters.date_from {
                    if doc.upload_date < from {
                        return false;
                    }
                }
                if let Some(to) = filters.date_to {
                    if doc.upload_date > to {
                        return false;
                    }
                }
                true
            })
            .map(|doc| doc.clone())
            .collect();
        results.sort_by(|a, b| a.upload_date.cmp(&b.upload_date));
        results
    }
}

impl CatalogIndex for DocumentIntake {
    fn document_ids_for(&self, client_id: &str, requirements: &[String]) -> Vec<String> {
        let departments: Vec<&str> = requirements
            .iter()
            .filter_map(|r| match r.as_str() {
                "financial_data" => Some("Finance"),
                "marketing_data" => Some("Marketing"),
                _ => None,
            })
            .collect();

        let mut ids: Vec<String> = self
            .catalog
            .iter()
            .filter(|doc| doc.client_id == client_id && doc.status == DocumentStatus::Completed)
            .filter(|doc| {
                doc.categorization
                    .as_ref()
                    .map(|c| departments.contains(&c.department.as_str()))
                    .unwrap_or(false)
            })
            .map(|doc| doc.document_id.clone())
            .collect();
        ids.sort();
        ids
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::domain::cortex::CortexError;
    use crate::infrastructure::cortex::{KeywordCortex, PlainTextExtractor};

    fn intake(dir: &tempfile::TempDir) -> DocumentIntake {
        DocumentIntake::new(
            dir.path(),
            Arc::new(PlainTextExtractor),
            Arc::new(KeywordCortex::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_upload_completes_with_categorization() {
        let dir = tempfile::tempdir().unwrap();
        let intake = intake(&dir);

        let outcome = intake
            .process_upload(
                b"Q4 budget review: revenue up, expenses flat.",
                "q4_budget.txt",
                DocumentMetadata::default(),
                "acme",
            )
            .await
            .unwrap();

        assert_eq!(outcome.status, "completed");
        assert!(outcome.document_id.starts_with("doc_"));

        let record = intake.get_document(&outcome.document_id).unwrap();
        assert_eq!(record.status, DocumentStatus::Completed);
        assert_eq!(record.categorization.unwrap().department, "Finance");
        assert_eq!(record.content_hash.len(), 64);

        // Both the raw blob and the categorization JSON were persisted
        assert!(dir.path().join("processed").join(format!("{}.json", outcome.document_id)).exists());
    }

    #[tokio::test]
    async fn test_extraction_failure_leaves_failed_record() {
        let dir = tempfile::tempdir().unwrap();
        let intake = intake(&dir);

        let err = intake
            .process_upload(&[0xff, 0xfe, 0x00, 0x01], "scan.pdf", DocumentMetadata::default(), "acme")
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::BadRequest(_)));

        // Never a completed record without categorization
        let failed: Vec<_> = intake
            .catalog
            .iter()
            .map(|d| (d.status, d.categorization.is_some()))
            .collect();
        assert_eq!(failed, vec![(DocumentStatus::Failed, false)]);
    }

    struct FailingCategorizer;

    #[async_trait]
    impl Categorizer for FailingCategorizer {
        async fn categorize(
            &self,
            _text: &str,
            _filename: &str,
        ) -> Result<Categorization, CortexError> {
            Err(CortexError::ModelUnavailable("no model loaded".into()))
        }
    }

    #[tokio::test]
    async fn test_categorization_failure_leaves_failed_record() {
        let dir = tempfile::tempdir().unwrap();
        let intake = DocumentIntake::new(
            dir.path(),
            Arc::new(PlainTextExtractor),
            Arc::new(FailingCategorizer),
        )
        .unwrap();

        let err = intake
            .process_upload(b"some text", "notes.txt", DocumentMetadata::default(), "acme")
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Internal(_)));

        let record = intake.catalog.iter().next().unwrap();
        assert_eq!(record.status, DocumentStatus::Failed);
        assert!(record.categorization.is_none());
    }

    #[tokio::test]
    async fn test_search_is_client_scoped_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let intake = intake(&dir);

        intake
            .process_upload(
                b"revenue and budget for the finance team",
                "fin.txt",
                DocumentMetadata::default(),
                "client-a",
            )
            .await
            .unwrap();
        intake
            .process_upload(
                b"campaign brand outreach to customers",
                "mkt.txt",
                DocumentMetadata::default(),
                "client-b",
            )
            .await
            .unwrap();

        let all_a = intake.search_documents("client-a", &DocumentFilters::default());
        assert_eq!(all_a.len(), 1);
        assert_eq!(all_a[0].client_id, "client-a");

        let finance_b = intake.search_documents(
            "client-b",
            &DocumentFilters {
                department: Some("Finance".into()),
                ..Default::default()
            },
        );
        assert!(finance_b.is_empty());
    }

    #[tokio::test]
    async fn test_catalog_index_maps_requirements_to_departments() {
        let dir = tempfile::tempdir().unwrap();
        let intake = intake(&dir);

        let outcome = intake
            .process_upload(
                b"revenue and budget for the finance team",
                "fin.txt",
                DocumentMetadata::default(),
                "acme",
            )
            .await
            .unwrap();

        let ids = intake.document_ids_for("acme", &["financial_data".to_string()]);
        assert_eq!(ids, vec![outcome.document_id]);
        assert!(intake
            .document_ids_for("acme", &["marketing_data".to_string()])
            .is_empty());
    }
}
