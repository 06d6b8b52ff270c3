//! Bill entity for SeaORM.
//!
//! Extracted and derived columns are NULL until the bill reaches the
//! completed status; file metadata and status are set at creation.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bills")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    // Extracted fields
    pub customer_number: Option<String>,
    /// Reference period in canonical "MMM/YYYY" form, uppercased.
    pub reference_month: Option<String>,
    pub electric_energy_kwh: Option<f64>,
    pub electric_energy_value: Option<f64>,
    pub sceee_energy_kwh: Option<f64>,
    pub sceee_energy_value: Option<f64>,
    pub compensated_energy_kwh: Option<f64>,
    pub compensated_energy_value: Option<f64>,
    pub public_lighting_value: Option<f64>,

    // Derived fields
    pub total_energy_consumption: Option<f64>,
    pub compensated_energy_total: Option<f64>,
    pub total_value_without_gd: Option<f64>,
    pub gd_economy: Option<f64>,

    // File metadata
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    /// sha256 of the raw bytes, lowercase hex. Unique among original
    /// submissions (rows without a supersedes link).
    pub file_hash: String,

    pub status: String,
    pub error_message: Option<String>,
    /// Set on bills created by a reprocess run, pointing at the failed
    /// bill they supersede.
    pub supersedes: Option<Uuid>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::processing_log::Entity")]
    ProcessingLogs,
}

impl Related<super::processing_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProcessingLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
