//! Domain models and DTOs for the energy bill server.

use utoipa::ToSchema;

pub mod bill;
pub mod dashboard;
pub mod processing_log;

// Re-export commonly used types
pub use bill::{
    BillDetailResponse, BillListResponse, BillStatus, BillSummary, DerivedMetrics, EnergyLine,
    ExtractedBill, ListBillsQuery, UploadBillResponse,
};
pub use dashboard::{DashboardQuery, DashboardSummaryResponse, MonthlyTotals, MonthlyTotalsResponse};
pub use processing_log::{BillLogsResponse, LogOutcome, ProcessingLogResponse};

/// Pagination parameters.
#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

impl PaginationParams {
    /// Calculate the offset for database queries.
    ///
    /// Widened to u64 before multiplying: the page number comes straight
    /// from the query string and u32::MAX * limit does not fit in u32.
    pub fn offset(&self) -> u64 {
        let page = self.page.unwrap_or(default_page()).max(1) as u64;
        let limit = self.clamped_limit() as u64;
        (page - 1) * limit
    }

    /// Current page, 1-based.
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(default_page()).max(1)
    }

    /// Clamp limit to maximum allowed value.
    pub fn clamped_limit(&self) -> u32 {
        self.limit.unwrap_or(default_limit()).clamp(1, 100)
    }
}

/// Pagination metadata for responses.
#[derive(Debug, Clone, serde::Serialize, ToSchema)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Pagination {
    /// Create pagination metadata.
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            ((total as f64) / (limit as f64)).ceil() as u32
        };

        Pagination {
            page,
            limit,
            total,
            total_pages,
        }
    }
}
