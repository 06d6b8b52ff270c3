//! Database queries for bills.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::entity::bill::{self, ActiveModel, Entity as Bill};
use crate::error::{AppError, AppResult};
use crate::models::{BillStatus, DashboardQuery, DerivedMetrics, ExtractedBill, ListBillsQuery};

use super::{DbPool, NewBill};

impl DbPool {
    /// Insert a provisional bill in processing state.
    ///
    /// The unique index on file_hash is the deduplication authority; a
    /// violation surfaces as [`AppError::Duplicate`] so a concurrent upload
    /// racing past the pre-check is rejected the same way.
    pub async fn insert_bill(&self, new: NewBill) -> AppResult<bill::Model> {
        let now = Utc::now();

        let model = ActiveModel {
            id: Set(Uuid::now_v7()),
            customer_number: Set(None),
            reference_month: Set(None),
            electric_energy_kwh: Set(None),
            electric_energy_value: Set(None),
            sceee_energy_kwh: Set(None),
            sceee_energy_value: Set(None),
            compensated_energy_kwh: Set(None),
            compensated_energy_value: Set(None),
            public_lighting_value: Set(None),
            total_energy_consumption: Set(None),
            compensated_energy_total: Set(None),
            total_value_without_gd: Set(None),
            gd_economy: Set(None),
            file_name: Set(new.file_name),
            file_path: Set(new.file_path),
            file_size: Set(new.file_size),
            file_hash: Set(new.file_hash),
            status: Set(BillStatus::Processing.as_str().to_string()),
            error_message: Set(None),
            supersedes: Set(new.supersedes),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = model.insert(self.connection()).await.map_err(|e| {
            if matches!(e.sql_err(), Some(sea_orm::SqlErr::UniqueConstraintViolation(_))) {
                AppError::Duplicate("this bill has already been processed".to_string())
            } else {
                AppError::Database(format!("Failed to insert bill: {}", e))
            }
        })?;

        Ok(result)
    }

    /// Get a bill by ID.
    pub async fn get_bill_by_id(&self, id: Uuid) -> AppResult<Option<bill::Model>> {
        let result = Bill::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get bill: {}", e)))?;

        Ok(result)
    }

    /// Find a bill by its content fingerprint, any status.
    pub async fn get_bill_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> AppResult<Option<bill::Model>> {
        let result = Bill::find()
            .filter(bill::Column::FileHash.eq(fingerprint))
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to look up fingerprint: {}", e)))?;

        Ok(result)
    }

    /// Transition a bill to completed, writing extracted and derived fields.
    pub async fn update_bill_completed(
        &self,
        id: Uuid,
        extracted: &ExtractedBill,
        metrics: &DerivedMetrics,
    ) -> AppResult<bill::Model> {
        let current = self
            .get_bill_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Bill {}", id)))?;

        let mut active: ActiveModel = current.into();
        active.customer_number = Set(Some(extracted.customer_number.clone()));
        active.reference_month = Set(Some(extracted.reference_month.clone()));
        active.electric_energy_kwh = Set(Some(extracted.electric_energy.quantity));
        active.electric_energy_value = Set(Some(extracted.electric_energy.value));
        active.sceee_energy_kwh = Set(extracted.sceee_energy.map(|l| l.quantity));
        active.sceee_energy_value = Set(extracted.sceee_energy.map(|l| l.value));
        active.compensated_energy_kwh = Set(extracted.compensated_energy.map(|l| l.quantity));
        active.compensated_energy_value = Set(extracted.compensated_energy.map(|l| l.value));
        active.public_lighting_value = Set(extracted.public_lighting_value);
        active.total_energy_consumption = Set(Some(metrics.total_energy_consumption));
        active.compensated_energy_total = Set(Some(metrics.compensated_energy_quantity));
        active.total_value_without_gd = Set(Some(metrics.total_value_without_gd));
        active.gd_economy = Set(Some(metrics.gd_economy));
        active.status = Set(BillStatus::Completed.as_str().to_string());
        active.error_message = Set(None);
        active.updated_at = Set(Utc::now());

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to complete bill: {}", e)))?;

        Ok(result)
    }

    /// Transition a bill to failed, storing the error message.
    pub async fn update_bill_failed(
        &self,
        id: Uuid,
        error_message: &str,
    ) -> AppResult<bill::Model> {
        let current = self
            .get_bill_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Bill {}", id)))?;

        let mut active: ActiveModel = current.into();
        active.status = Set(BillStatus::Failed.as_str().to_string());
        active.error_message = Set(Some(error_message.to_string()));
        active.updated_at = Set(Utc::now());

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to mark bill failed: {}", e)))?;

        Ok(result)
    }

    /// List bills with optional filtering and pagination.
    pub async fn list_bills(&self, query: &ListBillsQuery) -> AppResult<(Vec<bill::Model>, u64)> {
        use sea_orm::sea_query::Expr;

        let mut select = Bill::find();

        // Case-insensitive substring filters
        if let Some(ref customer_number) = query.customer_number {
            select = select.filter(Expr::cust_with_values(
                "customer_number ILIKE $1",
                [format!("%{}%", customer_number)],
            ));
        }

        if let Some(ref reference_month) = query.reference_month {
            select = select.filter(Expr::cust_with_values(
                "reference_month ILIKE $1",
                [format!("%{}%", reference_month)],
            ));
        }

        if let Some(ref status) = query.status {
            select = select.filter(bill::Column::Status.eq(status.as_str()));
        }

        if let Some(created_after) = query.created_after {
            select = select.filter(bill::Column::CreatedAt.gte(created_after));
        }

        if let Some(created_before) = query.created_before {
            select = select.filter(bill::Column::CreatedAt.lte(created_before));
        }

        // Count total before pagination
        let total = select
            .clone()
            .count(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to count bills: {}", e)))?;

        let params = query.pagination();
        let bills = select
            .order_by_desc(bill::Column::CreatedAt)
            .offset(params.offset())
            .limit(params.clamped_limit() as u64)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list bills: {}", e)))?;

        Ok((bills, total))
    }

    /// Fetch all completed bills matching the dashboard filters.
    ///
    /// Dashboard endpoints aggregate over already-computed derived fields;
    /// the row counts involved are small enough to fold in process.
    pub async fn completed_bills(&self, query: &DashboardQuery) -> AppResult<Vec<bill::Model>> {
        use sea_orm::sea_query::Expr;

        let mut select = Bill::find().filter(bill::Column::Status.eq(BillStatus::Completed.as_str()));

        if let Some(ref customer_number) = query.customer_number {
            select = select.filter(Expr::cust_with_values(
                "customer_number ILIKE $1",
                [format!("%{}%", customer_number)],
            ));
        }

        if let Some(ref reference_month) = query.reference_month {
            select = select.filter(Expr::cust_with_values(
                "reference_month ILIKE $1",
                [format!("%{}%", reference_month)],
            ));
        }

        let bills = select
            .order_by_asc(bill::Column::ReferenceMonth)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to fetch completed bills: {}", e)))?;

        Ok(bills)
    }

    /// Count bills whose stored file is at the given path.
    ///
    /// Reprocessed bills share their predecessor's file, so deletion must
    /// check for surviving references before removing anything from disk.
    pub async fn count_bills_with_file_path(&self, file_path: &str) -> AppResult<u64> {
        let count = Bill::find()
            .filter(bill::Column::FilePath.eq(file_path))
            .count(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to count file references: {}", e)))?;

        Ok(count)
    }

    /// Delete a bill row. Administrative path; the pipeline never deletes
    /// records on its own.
    pub async fn delete_bill(&self, id: Uuid) -> AppResult<()> {
        let result = Bill::delete_by_id(id)
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete bill: {}", e)))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Bill {}", id)));
        }

        Ok(())
    }
}
