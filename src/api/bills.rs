//! Bill API handlers.

use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use futures_util::StreamExt;
use tracing::warn;
use uuid::Uuid;

use crate::config::Config;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{
    BillDetailResponse, BillListResponse, BillLogsResponse, BillSummary, ListBillsQuery,
    Pagination, ProcessingLogResponse, UploadBillResponse,
};
use crate::services::{IngestionPipeline, UploadedBillFile};

/// Multipart field name carrying the PDF.
const UPLOAD_FIELD: &str = "file";

/// Strip directory components and anything exotic from a client filename.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches(['.', ' ']).is_empty() {
        "bill.pdf".to_string()
    } else {
        cleaned
    }
}

/// Read the upload out of the multipart payload.
///
/// The size limit is enforced while streaming so an oversized upload is
/// rejected without buffering the whole body.
async fn read_upload(
    mut payload: Multipart,
    max_upload_size: usize,
) -> AppResult<(Vec<u8>, String, String)> {
    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::InvalidInput(format!("Multipart error: {}", e)))?;

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(sanitize_filename)
            .unwrap_or_else(|| "bill.pdf".to_string());

        let mime_type = field
            .content_type()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::InvalidInput(format!("Read error: {}", e)))?;
            if data.len() + chunk.len() > max_upload_size {
                return Err(AppError::PayloadTooLarge(format!(
                    "File exceeds the {} byte limit",
                    max_upload_size
                )));
            }
            data.extend_from_slice(&chunk);
        }

        return Ok((data, file_name, mime_type));
    }

    Err(AppError::InvalidInput(
        "No file provided (expected multipart field 'file')".to_string(),
    ))
}

/// Upload a bill PDF for processing.
///
/// Runs the full pipeline synchronously: the response reports the final
/// state of the bill, not an acknowledgement of a queued job.
#[utoipa::path(
    post,
    path = "/bills/upload",
    tag = "Bills",
    request_body(content_type = "multipart/form-data", description = "PDF in multipart field 'file'"),
    responses(
        (status = 201, description = "Bill processed successfully", body = UploadBillResponse),
        (status = 400, description = "Missing file or not a PDF", body = crate::error::ErrorResponse),
        (status = 409, description = "Duplicate bill", body = crate::error::ErrorResponse),
        (status = 413, description = "File too large", body = crate::error::ErrorResponse),
        (status = 422, description = "Extraction failed", body = crate::error::ErrorResponse),
    )
)]
pub async fn upload_bill(
    pipeline: web::Data<IngestionPipeline>,
    config: web::Data<Config>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let (bytes, file_name, mime_type) = read_upload(payload, config.max_upload_size).await?;

    // Persist the original PDF before touching the database so a completed
    // or failed record always points at a readable file.
    let stored_name = format!("{}_{}", Uuid::now_v7(), file_name);
    let file_path = config.data_dir.join(&stored_name);
    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| AppError::FileSystem(format!("Failed to store upload: {}", e)))?;

    let file = UploadedBillFile {
        file_size: bytes.len() as i64,
        bytes,
        file_name,
        mime_type,
        file_path: file_path.to_string_lossy().to_string(),
    };

    match pipeline.ingest(file).await {
        Ok(outcome) => {
            let response = UploadBillResponse {
                success: true,
                message: outcome.message,
                bill_id: outcome.bill_id,
                processing_time_ms: outcome.processing_time_ms,
            };
            Ok(HttpResponse::Created().json(response))
        }
        Err(e) => {
            // Rejected uploads leave no record, so the stored file is orphaned
            if e.is_client_error()
                && let Err(io_err) = tokio::fs::remove_file(&file_path).await
            {
                warn!(
                    "Failed to remove rejected upload {}: {}",
                    file_path.display(),
                    io_err
                );
            }
            Err(e)
        }
    }
}

/// List bills with filtering and pagination.
#[utoipa::path(
    get,
    path = "/bills",
    tag = "Bills",
    params(
        ("customer_number" = Option<String>, Query, description = "Customer number substring, case-insensitive"),
        ("reference_month" = Option<String>, Query, description = "Reference month substring, case-insensitive"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("created_after" = Option<String>, Query, description = "RFC 3339 lower bound on creation time"),
        ("created_before" = Option<String>, Query, description = "RFC 3339 upper bound on creation time"),
        ("page" = Option<u32>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u32>, Query, description = "Results per page (default 20, max 100)")
    ),
    responses(
        (status = 200, description = "Paginated list of bills", body = BillListResponse),
    )
)]
pub async fn list_bills(
    pool: web::Data<DbPool>,
    query: web::Query<ListBillsQuery>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();
    let (bills, total) = pool.list_bills(&query).await?;

    let params = query.pagination();
    let response = BillListResponse {
        bills: bills.into_iter().map(BillSummary::from).collect(),
        pagination: Pagination::new(params.page(), params.clamped_limit(), total),
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Get full details for one bill.
#[utoipa::path(
    get,
    path = "/bills/{bill_id}",
    tag = "Bills",
    params(
        ("bill_id" = Uuid, Path, description = "Bill UUID")
    ),
    responses(
        (status = 200, description = "Bill details", body = BillDetailResponse),
        (status = 404, description = "Bill not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_bill(pool: web::Data<DbPool>, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    let bill_id = path.into_inner();

    let bill = pool
        .get_bill_by_id(bill_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Bill {}", bill_id)))?;

    Ok(HttpResponse::Ok().json(BillDetailResponse::from(bill)))
}

/// Delete a bill, its audit log, and its stored file.
///
/// The stored PDF may be shared with a record created by reprocessing; the
/// pipeline only removes it once no surviving bill references its path.
#[utoipa::path(
    delete,
    path = "/bills/{bill_id}",
    tag = "Bills",
    params(
        ("bill_id" = Uuid, Path, description = "Bill UUID")
    ),
    responses(
        (status = 204, description = "Bill deleted"),
        (status = 404, description = "Bill not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn delete_bill(
    pipeline: web::Data<IngestionPipeline>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    pipeline.delete(path.into_inner()).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// Reprocess a failed bill from its stored file.
///
/// Creates a new bill record superseding the failed one; the failed record
/// is left in place for audit purposes.
#[utoipa::path(
    post,
    path = "/bills/{bill_id}/reprocess",
    tag = "Bills",
    params(
        ("bill_id" = Uuid, Path, description = "Bill UUID")
    ),
    responses(
        (status = 201, description = "Bill reprocessed successfully", body = UploadBillResponse),
        (status = 400, description = "Bill is not in failed state", body = crate::error::ErrorResponse),
        (status = 404, description = "Bill not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Extraction failed again", body = crate::error::ErrorResponse),
    )
)]
pub async fn reprocess_bill(
    pipeline: web::Data<IngestionPipeline>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let bill_id = path.into_inner();
    let outcome = pipeline.reprocess(bill_id).await?;

    let response = UploadBillResponse {
        success: true,
        message: outcome.message,
        bill_id: outcome.bill_id,
        processing_time_ms: outcome.processing_time_ms,
    };

    Ok(HttpResponse::Created().json(response))
}

/// Get the audit log for a bill, oldest first.
#[utoipa::path(
    get,
    path = "/bills/{bill_id}/logs",
    tag = "Bills",
    params(
        ("bill_id" = Uuid, Path, description = "Bill UUID")
    ),
    responses(
        (status = 200, description = "Audit log entries", body = BillLogsResponse),
        (status = 404, description = "Bill not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_bill_logs(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let bill_id = path.into_inner();

    let _bill = pool
        .get_bill_by_id(bill_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Bill {}", bill_id)))?;

    let logs = pool.logs_for_bill(bill_id).await?;

    let response = BillLogsResponse {
        bill_id,
        logs: logs.into_iter().map(ProcessingLogResponse::from).collect(),
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Configure bill routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/bills/upload").route(web::post().to(upload_bill)))
        .service(web::resource("/bills").route(web::get().to(list_bills)))
        .service(
            web::resource("/bills/{bill_id}")
                .route(web::get().to(get_bill))
                .route(web::delete().to(delete_bill)),
        )
        .service(web::resource("/bills/{bill_id}/reprocess").route(web::post().to(reprocess_bill)))
        .service(web::resource("/bills/{bill_id}/logs").route(web::get().to(get_bill_logs)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\x\\conta.pdf"), "conta.pdf");
        assert_eq!(sanitize_filename("conta jan.pdf"), "conta jan.pdf");
    }

    #[test]
    fn test_sanitize_replaces_odd_characters() {
        assert_eq!(sanitize_filename("conta*jan?.pdf"), "conta_jan_.pdf");
    }

    #[test]
    fn test_sanitize_falls_back_on_empty() {
        assert_eq!(sanitize_filename(""), "bill.pdf");
        assert_eq!(sanitize_filename("..."), "bill.pdf");
    }
}
