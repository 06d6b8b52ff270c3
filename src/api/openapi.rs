//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::{api, error, models};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Energy Bill Server",
        version = "0.1.0",
        description = "API server for ingesting electricity bill PDFs, extracting their fields, and serving consumption and compensation metrics"
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        // Health endpoints
        api::health::health,
        api::health::ready,
        // Bill endpoints
        api::bills::upload_bill,
        api::bills::list_bills,
        api::bills::get_bill,
        api::bills::delete_bill,
        api::bills::reprocess_bill,
        api::bills::get_bill_logs,
        // Dashboard endpoints
        api::dashboard::summary,
        api::dashboard::monthly,
    ),
    components(
        schemas(
            // Common
            error::ErrorResponse,
            models::Pagination,
            models::PaginationParams,
            // Health
            api::health::HealthResponse,
            api::health::ReadyResponse,
            // Bills
            models::BillStatus,
            models::EnergyLine,
            models::ExtractedBill,
            models::DerivedMetrics,
            models::UploadBillResponse,
            models::BillSummary,
            models::BillDetailResponse,
            models::BillListResponse,
            models::ListBillsQuery,
            models::ProcessingLogResponse,
            models::BillLogsResponse,
            // Dashboard
            models::DashboardQuery,
            models::DashboardSummaryResponse,
            models::MonthlyTotals,
            models::MonthlyTotalsResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Bills", description = "Bill upload, queries, and reprocessing"),
        (name = "Dashboard", description = "Aggregated metrics over completed bills")
    )
)]
pub struct ApiDoc;
