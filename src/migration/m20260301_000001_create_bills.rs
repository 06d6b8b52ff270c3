//! Migration: Create bills table and shared trigger function.
//!
//! One row per uploaded bill PDF. The unique constraint on file_hash is
//! the authority for deduplication; the pipeline's pre-check is advisory.

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
                -- Shared trigger function for updated_at
                CREATE OR REPLACE FUNCTION update_updated_at_column()
                RETURNS TRIGGER AS $$
                BEGIN
                    NEW.updated_at = NOW();
                    RETURN NEW;
                END;
                $$ LANGUAGE plpgsql;

                -- Bills table
                CREATE TABLE bills (
                    id UUID PRIMARY KEY,

                    -- Extracted fields (NULL until completed)
                    customer_number VARCHAR(50),
                    reference_month VARCHAR(10),
                    electric_energy_kwh DOUBLE PRECISION,
                    electric_energy_value DOUBLE PRECISION,
                    sceee_energy_kwh DOUBLE PRECISION,
                    sceee_energy_value DOUBLE PRECISION,
                    compensated_energy_kwh DOUBLE PRECISION,
                    compensated_energy_value DOUBLE PRECISION,
                    public_lighting_value DOUBLE PRECISION,

                    -- Derived fields (NULL until completed)
                    total_energy_consumption DOUBLE PRECISION,
                    compensated_energy_total DOUBLE PRECISION,
                    total_value_without_gd DOUBLE PRECISION,
                    gd_economy DOUBLE PRECISION,

                    -- File metadata
                    file_name VARCHAR(255) NOT NULL,
                    file_path VARCHAR(500) NOT NULL,
                    file_size BIGINT NOT NULL,
                    file_hash CHAR(64) NOT NULL,

                    status VARCHAR(20) NOT NULL DEFAULT 'processing'
                        CHECK (status IN ('pending', 'processing', 'completed', 'failed')),
                    error_message TEXT,
                    supersedes UUID REFERENCES bills(id) ON DELETE SET NULL,

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                -- Dedup key: one bill per distinct content fingerprint.
                -- Reprocess runs create a second row for the same document
                -- on purpose, linked via supersedes, so the constraint only
                -- binds original submissions.
                CREATE UNIQUE INDEX idx_bills_file_hash ON bills(file_hash)
                    WHERE supersedes IS NULL;

                -- Index for customer filter (case-insensitive substring)
                CREATE INDEX idx_bills_customer_number ON bills(customer_number);

                -- Index for listing by status
                CREATE INDEX idx_bills_status ON bills(status);

                -- Index for listing by creation date
                CREATE INDEX idx_bills_created_at ON bills(created_at DESC);

                -- Trigger to update updated_at
                CREATE TRIGGER update_bills_updated_at
                    BEFORE UPDATE ON bills
                    FOR EACH ROW
                    EXECUTE FUNCTION update_updated_at_column();
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DROP TRIGGER IF EXISTS update_bills_updated_at ON bills;
                DROP TABLE IF EXISTS bills CASCADE;
                DROP FUNCTION IF EXISTS update_updated_at_column();
                "#,
            )
            .await?;

        Ok(())
    }
}
