//! Migration: Create processing_logs table.
//!
//! Append-only audit trail for pipeline operations.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE processing_logs (
                    id UUID PRIMARY KEY,
                    bill_id UUID NOT NULL REFERENCES bills(id) ON DELETE CASCADE,
                    operation VARCHAR(50) NOT NULL,
                    outcome VARCHAR(10) NOT NULL
                        CHECK (outcome IN ('success', 'error')),
                    message TEXT NOT NULL,
                    metadata JSONB,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                -- Index for fetching a bill's audit trail in order
                CREATE INDEX idx_processing_logs_bill_id
                    ON processing_logs(bill_id, created_at);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS processing_logs CASCADE;")
            .await?;

        Ok(())
    }
}
