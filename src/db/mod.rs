//! Database module providing connection management and queries.

pub mod bills;
pub mod processing_logs;

use async_trait::async_trait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::entity::bill;
use crate::error::{AppError, AppResult};
use crate::models::{DerivedMetrics, ExtractedBill, LogOutcome};

/// Database connection pool wrapper around SeaORM's DatabaseConnection.
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Connect to PostgreSQL.
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let mut options = ConnectOptions::new(database_url.to_string());
        options.max_connections(20).sqlx_logging(false);

        let conn = Database::connect(options)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to database: {}", e)))?;

        Ok(DbPool { conn })
    }

    /// Get access to the underlying connection for executing queries.
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }
}

/// Initial fields for a provisional bill record.
#[derive(Debug, Clone)]
pub struct NewBill {
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub file_hash: String,
    /// Failed bill this record supersedes (reprocess runs only).
    pub supersedes: Option<Uuid>,
}

/// One append-only audit log entry.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub bill_id: Uuid,
    pub operation: String,
    pub outcome: LogOutcome,
    pub message: String,
    pub metadata: Option<JsonValue>,
}

/// Narrow storage contract consumed by the ingestion pipeline.
///
/// `DbPool` is the production implementation; tests substitute an in-memory
/// store. The unique constraint on `file_hash` is enforced by `create_bill`,
/// which reports violations as [`AppError::Duplicate`].
#[async_trait]
pub trait BillStore: Send + Sync {
    async fn create_bill(&self, new: NewBill) -> AppResult<bill::Model>;
    async fn mark_bill_completed(
        &self,
        id: Uuid,
        extracted: &ExtractedBill,
        metrics: &DerivedMetrics,
    ) -> AppResult<bill::Model>;
    async fn mark_bill_failed(&self, id: Uuid, error_message: &str) -> AppResult<bill::Model>;
    async fn find_bill_by_id(&self, id: Uuid) -> AppResult<Option<bill::Model>>;
    async fn find_bill_by_fingerprint(&self, fingerprint: &str)
    -> AppResult<Option<bill::Model>>;
    async fn append_log(&self, entry: NewLogEntry) -> AppResult<()>;
    async fn delete_bill_record(&self, id: Uuid) -> AppResult<()>;
    async fn delete_bill_logs(&self, bill_id: Uuid) -> AppResult<u64>;
    async fn count_bills_sharing_file(&self, file_path: &str) -> AppResult<u64>;
}

#[async_trait]
impl BillStore for DbPool {
    async fn create_bill(&self, new: NewBill) -> AppResult<bill::Model> {
        self.insert_bill(new).await
    }

    async fn mark_bill_completed(
        &self,
        id: Uuid,
        extracted: &ExtractedBill,
        metrics: &DerivedMetrics,
    ) -> AppResult<bill::Model> {
        self.update_bill_completed(id, extracted, metrics).await
    }

    async fn mark_bill_failed(&self, id: Uuid, error_message: &str) -> AppResult<bill::Model> {
        self.update_bill_failed(id, error_message).await
    }

    async fn find_bill_by_id(&self, id: Uuid) -> AppResult<Option<bill::Model>> {
        self.get_bill_by_id(id).await
    }

    async fn find_bill_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> AppResult<Option<bill::Model>> {
        self.get_bill_by_fingerprint(fingerprint).await
    }

    async fn append_log(&self, entry: NewLogEntry) -> AppResult<()> {
        self.insert_log(entry).await
    }

    async fn delete_bill_record(&self, id: Uuid) -> AppResult<()> {
        self.delete_bill(id).await
    }

    async fn delete_bill_logs(&self, bill_id: Uuid) -> AppResult<u64> {
        self.delete_logs_for_bill(bill_id).await
    }

    async fn count_bills_sharing_file(&self, file_path: &str) -> AppResult<u64> {
        self.count_bills_with_file_path(file_path).await
    }
}
