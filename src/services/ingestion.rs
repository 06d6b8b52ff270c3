//! Bill ingestion pipeline.
//!
//! Orchestrates validation, deduplication, provisional persistence, the
//! extraction call, metric computation, the final status transition, and
//! audit logging. The state machine per submitted document:
//!
//! validate -> fingerprint -> create processing record -> extract ->
//! derive metrics -> completed, with any post-creation failure transitioning
//! the record to failed before the original error is returned.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{BillStore, NewBill, NewLogEntry};
use crate::entity::bill;
use crate::error::{AppError, AppResult};
use crate::models::{BillStatus, LogOutcome};
use crate::services::extraction::BillExtractor;
use crate::services::{fingerprint, metrics};

/// One uploaded document, as handed over by the upload layer after the
/// bytes have been written to `file_path`.
#[derive(Debug, Clone)]
pub struct UploadedBillFile {
    pub bytes: Vec<u8>,
    pub file_name: String,
    /// Declared MIME type from the multipart field.
    pub mime_type: String,
    pub file_size: i64,
    pub file_path: String,
}

/// Result of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub bill_id: Uuid,
    pub message: String,
    pub processing_time_ms: u64,
}

/// The ingestion pipeline. Constructed once at startup with its
/// collaborators injected; holds no per-call state.
pub struct IngestionPipeline {
    store: Arc<dyn BillStore>,
    extractor: Arc<dyn BillExtractor>,
    max_file_size: usize,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn BillStore>,
        extractor: Arc<dyn BillExtractor>,
        max_file_size: usize,
    ) -> Self {
        Self {
            store,
            extractor,
            max_file_size,
        }
    }

    /// Run the full pipeline for a freshly uploaded document.
    pub async fn ingest(&self, file: UploadedBillFile) -> AppResult<IngestOutcome> {
        self.run(file, None).await
    }

    /// Re-run the pipeline for a previously failed bill, using its saved
    /// file. The failed record is left untouched; the new record carries a
    /// supersedes link back to it.
    pub async fn reprocess(&self, bill_id: Uuid) -> AppResult<IngestOutcome> {
        let bill = self
            .store
            .find_bill_by_id(bill_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Bill {}", bill_id)))?;

        if BillStatus::parse(&bill.status) != Some(BillStatus::Failed) {
            return Err(AppError::InvalidInput(format!(
                "only failed bills can be reprocessed (current status: {})",
                bill.status
            )));
        }

        let bytes = tokio::fs::read(&bill.file_path).await.map_err(|e| {
            AppError::FileSystem(format!(
                "could not read saved file for reprocessing: {}",
                e
            ))
        })?;

        self.log(
            bill.id,
            "reprocess_started",
            LogOutcome::Success,
            format!("Reprocessing from saved file {}", bill.file_path),
            None,
        )
        .await;

        let file = UploadedBillFile {
            bytes,
            file_name: bill.file_name.clone(),
            mime_type: "application/pdf".to_string(),
            file_size: bill.file_size,
            file_path: bill.file_path.clone(),
        };

        self.run(file, Some(bill.id)).await
    }

    /// Delete a bill, its audit log, and its stored file.
    ///
    /// A record created by reprocessing shares its predecessor's file, so
    /// the file is only removed from disk once no surviving bill points at
    /// its path.
    pub async fn delete(&self, bill_id: Uuid) -> AppResult<()> {
        let bill = self
            .store
            .find_bill_by_id(bill_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Bill {}", bill_id)))?;

        let removed_logs = self.store.delete_bill_logs(bill_id).await?;
        self.store.delete_bill_record(bill_id).await?;

        if self.store.count_bills_sharing_file(&bill.file_path).await? == 0 {
            if let Err(e) = tokio::fs::remove_file(&bill.file_path).await {
                warn!("Failed to remove stored file {}: {}", bill.file_path, e);
            }
        } else {
            info!(
                "Keeping stored file {} (still referenced by another bill)",
                bill.file_path
            );
        }

        info!("Bill {} deleted ({} log entries)", bill_id, removed_logs);

        Ok(())
    }

    async fn run(
        &self,
        file: UploadedBillFile,
        supersedes: Option<Uuid>,
    ) -> AppResult<IngestOutcome> {
        let started = Instant::now();

        self.validate(&file)?;

        let fingerprint = fingerprint::fingerprint(&file.bytes);

        // Advisory pre-check; the store's unique constraint is the authority
        // for two submissions racing past this point. A reprocess run skips
        // it because the superseded bill legitimately holds the fingerprint.
        if supersedes.is_none()
            && self
                .store
                .find_bill_by_fingerprint(&fingerprint)
                .await?
                .is_some()
        {
            return Err(AppError::Duplicate(
                "this bill has already been processed".to_string(),
            ));
        }

        let new = NewBill {
            file_name: file.file_name.clone(),
            file_path: file.file_path.clone(),
            file_size: file.file_size,
            file_hash: fingerprint.clone(),
            supersedes,
        };

        // A uniqueness violation here surfaces from the store as Duplicate;
        // any other creation failure propagates unchanged.
        let record = self.store.create_bill(new).await?;

        self.log(
            record.id,
            "upload_started",
            LogOutcome::Success,
            format!("Upload accepted: {}", file.file_name),
            Some(json!({
                "file_size": file.file_size,
                "fingerprint": fingerprint,
            })),
        )
        .await;

        match self.process(&record, &file).await {
            Ok(()) => {
                let processing_time_ms = started.elapsed().as_millis() as u64;

                self.log(
                    record.id,
                    "processing_completed",
                    LogOutcome::Success,
                    format!("Bill processed in {}ms", processing_time_ms),
                    Some(json!({"processing_time_ms": processing_time_ms})),
                )
                .await;

                info!(
                    "Bill {} completed in {}ms ({})",
                    record.id, processing_time_ms, file.file_name
                );

                Ok(IngestOutcome {
                    bill_id: record.id,
                    message: "Bill processed successfully".to_string(),
                    processing_time_ms,
                })
            }
            Err(original) => {
                // The failed transition and its log entry are best-effort:
                // a secondary failure must never mask the original error.
                if let Err(secondary) = self
                    .store
                    .mark_bill_failed(record.id, &original.to_string())
                    .await
                {
                    warn!(
                        "Failed to record failed status for bill {}: {}",
                        record.id, secondary
                    );
                }

                self.log(
                    record.id,
                    "processing_failed",
                    LogOutcome::Error,
                    original.to_string(),
                    None,
                )
                .await;

                Err(original)
            }
        }
    }

    /// Fail-fast upload validation, in order: presence, type, size.
    fn validate(&self, file: &UploadedBillFile) -> AppResult<()> {
        if file.bytes.is_empty() {
            return Err(AppError::InvalidInput("No file provided".to_string()));
        }

        if !file.mime_type.to_lowercase().contains("pdf") {
            return Err(AppError::InvalidInput(format!(
                "Only PDF files are accepted (got {})",
                file.mime_type
            )));
        }

        if file.bytes.len() > self.max_file_size {
            return Err(AppError::PayloadTooLarge(format!(
                "File exceeds the {} byte limit",
                self.max_file_size
            )));
        }

        Ok(())
    }

    /// Post-creation steps: extraction, metric computation, final update.
    async fn process(&self, record: &bill::Model, file: &UploadedBillFile) -> AppResult<()> {
        let extracted = self
            .extractor
            .extract(&file.bytes, &file.file_name)
            .await?;

        let derived = metrics::derive_metrics(&extracted);

        self.store
            .mark_bill_completed(record.id, &extracted, &derived)
            .await?;

        Ok(())
    }

    /// Best-effort audit logging. A logging failure is reported through
    /// tracing and never alters the pipeline's outcome.
    async fn log(
        &self,
        bill_id: Uuid,
        operation: &str,
        outcome: LogOutcome,
        message: String,
        metadata: Option<serde_json::Value>,
    ) {
        let entry = NewLogEntry {
            bill_id,
            operation: operation.to_string(),
            outcome,
            message,
            metadata,
        };

        if let Err(e) = self.store.append_log(entry).await {
            warn!("Failed to append {} log for bill {}: {}", operation, bill_id, e);
        }
    }
}
