//! Database queries for processing logs.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::entity::processing_log::{self, ActiveModel, Entity as ProcessingLog};
use crate::error::{AppError, AppResult};

use super::{DbPool, NewLogEntry};

impl DbPool {
    /// Append one audit log entry. Entries are never updated.
    pub async fn insert_log(&self, entry: NewLogEntry) -> AppResult<()> {
        let model = ActiveModel {
            id: Set(Uuid::now_v7()),
            bill_id: Set(entry.bill_id),
            operation: Set(entry.operation),
            outcome: Set(entry.outcome.as_str().to_string()),
            message: Set(entry.message),
            metadata: Set(entry.metadata),
            created_at: Set(Utc::now()),
        };

        model
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert log entry: {}", e)))?;

        Ok(())
    }

    /// Fetch a bill's log entries in chronological order.
    pub async fn logs_for_bill(&self, bill_id: Uuid) -> AppResult<Vec<processing_log::Model>> {
        let logs = ProcessingLog::find()
            .filter(processing_log::Column::BillId.eq(bill_id))
            .order_by_asc(processing_log::Column::CreatedAt)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to fetch logs: {}", e)))?;

        Ok(logs)
    }

    /// Delete all log entries for a bill. Administrative path only.
    pub async fn delete_logs_for_bill(&self, bill_id: Uuid) -> AppResult<u64> {
        let result = ProcessingLog::delete_many()
            .filter(processing_log::Column::BillId.eq(bill_id))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete logs: {}", e)))?;

        Ok(result.rows_affected)
    }
}
