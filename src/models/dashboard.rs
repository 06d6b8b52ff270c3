//! Dashboard aggregation DTOs.
//!
//! These endpoints only read already-computed derived fields from completed
//! bills; all invariant-bearing logic lives in the ingestion pipeline.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Query parameters for dashboard endpoints.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct DashboardQuery {
    /// Customer number substring, case-insensitive.
    #[serde(default)]
    pub customer_number: Option<String>,
    /// Reference month substring, case-insensitive.
    #[serde(default)]
    pub reference_month: Option<String>,
}

/// Totals of the four derived metrics over completed bills.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct DashboardSummaryResponse {
    /// Number of completed bills in the aggregation.
    pub bill_count: u64,
    /// Sum of total energy consumption, kWh.
    pub total_energy_consumption: f64,
    /// Sum of compensated energy, kWh.
    pub compensated_energy: f64,
    /// Sum of total value without compensation, BRL.
    pub total_value_without_gd: f64,
    /// Sum of compensation-derived economy, BRL.
    pub gd_economy: f64,
}

/// Per-month totals of the derived metrics.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MonthlyTotals {
    /// Reference month in "MMM/YYYY" form.
    pub reference_month: String,
    pub bill_count: u64,
    pub total_energy_consumption: f64,
    pub compensated_energy: f64,
    pub total_value_without_gd: f64,
    pub gd_economy: f64,
}

/// Monthly breakdown response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MonthlyTotalsResponse {
    pub months: Vec<MonthlyTotals>,
}
