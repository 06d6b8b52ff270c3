//! Bill domain models and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Pagination;
use crate::entity::bill;

/// Bill processing status.
///
/// `Pending` is reserved for queued submissions and is never emitted by the
/// upload pipeline, which persists bills directly in `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for BillStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One quantity/value line item from an extracted bill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EnergyLine {
    /// Quantity in kWh.
    pub quantity: f64,
    /// Monetary value in BRL.
    pub value: f64,
}

/// Structured fields produced by the extraction gateway, post-validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExtractedBill {
    /// Customer identifier, non-empty.
    pub customer_number: String,
    /// Reference period, canonical "MMM/YYYY", uppercased.
    pub reference_month: String,
    /// Electric energy line; quantity is non-zero on success.
    pub electric_energy: EnergyLine,
    pub sceee_energy: Option<EnergyLine>,
    pub compensated_energy: Option<EnergyLine>,
    pub public_lighting_value: Option<f64>,
}

/// Metrics derived from an extracted bill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct DerivedMetrics {
    /// Electric + SCEEE quantity, in kWh.
    pub total_energy_consumption: f64,
    /// Compensated energy quantity, in kWh.
    pub compensated_energy_quantity: f64,
    /// Electric + SCEEE + public lighting value, in BRL.
    pub total_value_without_gd: f64,
    /// Compensated energy value, in BRL. May be negative when the
    /// distributor reports compensation as a credit; not clamped here.
    pub gd_economy: f64,
}

/// Response after a successful upload or reprocess.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UploadBillResponse {
    pub success: bool,
    pub message: String,
    /// Bill UUID.
    pub bill_id: Uuid,
    /// Wall-clock time from pipeline start to the completed transition.
    pub processing_time_ms: u64,
}

/// Bill summary for list responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BillSummary {
    pub id: Uuid,
    pub status: BillStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_month: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_energy_consumption: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_value_without_gd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gd_economy: Option<f64>,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<bill::Model> for BillSummary {
    fn from(m: bill::Model) -> Self {
        BillSummary {
            id: m.id,
            status: BillStatus::parse(&m.status).unwrap_or(BillStatus::Processing),
            customer_number: m.customer_number,
            reference_month: m.reference_month,
            total_energy_consumption: m.total_energy_consumption,
            total_value_without_gd: m.total_value_without_gd,
            gd_economy: m.gd_economy,
            file_name: m.file_name,
            error_message: m.error_message,
            created_at: m.created_at,
        }
    }
}

/// Full bill detail response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BillDetailResponse {
    pub id: Uuid,
    pub status: BillStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted: Option<ExtractedBill>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<DerivedMetrics>,
    pub file_name: String,
    pub file_size: i64,
    pub file_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Failed bill this record supersedes, when created by a reprocess.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<bill::Model> for BillDetailResponse {
    fn from(m: bill::Model) -> Self {
        // Extracted/derived fields are all-present or all-absent; electric
        // energy is the marker for the whole group.
        let extracted = match (
            m.customer_number.clone(),
            m.reference_month.clone(),
            m.electric_energy_kwh,
            m.electric_energy_value,
        ) {
            (Some(customer_number), Some(reference_month), Some(quantity), Some(value)) => {
                Some(ExtractedBill {
                    customer_number,
                    reference_month,
                    electric_energy: EnergyLine { quantity, value },
                    sceee_energy: zip_line(m.sceee_energy_kwh, m.sceee_energy_value),
                    compensated_energy: zip_line(
                        m.compensated_energy_kwh,
                        m.compensated_energy_value,
                    ),
                    public_lighting_value: m.public_lighting_value,
                })
            }
            _ => None,
        };

        let metrics = match (
            m.total_energy_consumption,
            m.compensated_energy_total,
            m.total_value_without_gd,
            m.gd_economy,
        ) {
            (
                Some(total_energy_consumption),
                Some(compensated_energy_quantity),
                Some(total_value_without_gd),
                Some(gd_economy),
            ) => Some(DerivedMetrics {
                total_energy_consumption,
                compensated_energy_quantity,
                total_value_without_gd,
                gd_economy,
            }),
            _ => None,
        };

        BillDetailResponse {
            id: m.id,
            status: BillStatus::parse(&m.status).unwrap_or(BillStatus::Processing),
            extracted,
            metrics,
            file_name: m.file_name,
            file_size: m.file_size,
            file_hash: m.file_hash,
            error_message: m.error_message,
            supersedes: m.supersedes,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

fn zip_line(quantity: Option<f64>, value: Option<f64>) -> Option<EnergyLine> {
    match (quantity, value) {
        (Some(quantity), Some(value)) => Some(EnergyLine { quantity, value }),
        _ => None,
    }
}

/// Bill list response with pagination.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BillListResponse {
    pub bills: Vec<BillSummary>,
    pub pagination: Pagination,
}

/// Query parameters for listing bills.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ListBillsQuery {
    /// Customer number substring, case-insensitive.
    #[serde(default)]
    pub customer_number: Option<String>,
    /// Reference month substring, case-insensitive (e.g. "JAN/2024").
    #[serde(default)]
    pub reference_month: Option<String>,
    /// Filter by status.
    #[serde(default)]
    pub status: Option<BillStatus>,
    /// Only bills created at or after this instant.
    #[serde(default)]
    pub created_after: Option<DateTime<Utc>>,
    /// Only bills created at or before this instant.
    #[serde(default)]
    pub created_before: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListBillsQuery {
    pub fn pagination(&self) -> super::PaginationParams {
        super::PaginationParams {
            page: self.page,
            limit: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn completed_model() -> bill::Model {
        bill::Model {
            id: Uuid::now_v7(),
            customer_number: Some("7204076116".to_string()),
            reference_month: Some("JAN/2024".to_string()),
            electric_energy_kwh: Some(50.0),
            electric_energy_value: Some(45.67),
            sceee_energy_kwh: Some(476.0),
            sceee_energy_value: Some(392.5),
            compensated_energy_kwh: Some(526.0),
            compensated_energy_value: Some(438.17),
            public_lighting_value: Some(23.45),
            total_energy_consumption: Some(526.0),
            compensated_energy_total: Some(526.0),
            total_value_without_gd: Some(461.62),
            gd_economy: Some(438.17),
            file_name: "bill.pdf".to_string(),
            file_path: "/tmp/bill.pdf".to_string(),
            file_size: 1024,
            file_hash: "a".repeat(64),
            status: "completed".to_string(),
            error_message: None,
            supersedes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            BillStatus::Pending,
            BillStatus::Processing,
            BillStatus::Completed,
            BillStatus::Failed,
        ] {
            assert_eq!(BillStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BillStatus::parse("unknown"), None);
    }

    #[test]
    fn test_detail_from_completed_model() {
        let detail = BillDetailResponse::from(completed_model());
        let extracted = detail.extracted.expect("extracted fields present");
        assert_eq!(extracted.customer_number, "7204076116");
        assert_eq!(extracted.electric_energy.quantity, 50.0);
        assert_eq!(
            extracted.sceee_energy,
            Some(EnergyLine {
                quantity: 476.0,
                value: 392.5
            })
        );
        let metrics = detail.metrics.expect("derived fields present");
        assert_eq!(metrics.total_energy_consumption, 526.0);
        assert_eq!(metrics.gd_economy, 438.17);
    }

    #[test]
    fn test_detail_from_processing_model_has_no_fields() {
        let mut model = completed_model();
        model.status = "processing".to_string();
        model.customer_number = None;
        model.reference_month = None;
        model.electric_energy_kwh = None;
        model.electric_energy_value = None;
        model.total_energy_consumption = None;

        let detail = BillDetailResponse::from(model);
        assert!(detail.extracted.is_none());
        assert!(detail.metrics.is_none());
        assert_eq!(detail.status, BillStatus::Processing);
    }
}
