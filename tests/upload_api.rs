//! HTTP-level tests for the bill upload endpoint.
//!
//! Runs the real handlers and multipart parsing against an in-memory store
//! and a canned extractor, so no database or extraction service is needed.

use std::sync::{Arc, Mutex};

use actix_web::{App, test, web};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use energy_bill_lib::api;
use energy_bill_lib::config::{Config, Environment, GeminiConfig};
use energy_bill_lib::db::{BillStore, NewBill, NewLogEntry};
use energy_bill_lib::entity::bill;
use energy_bill_lib::error::{AppError, AppResult};
use energy_bill_lib::models::{DerivedMetrics, EnergyLine, ExtractedBill};
use energy_bill_lib::services::{BillExtractor, IngestionPipeline};

const BOUNDARY: &str = "----upload-api-test-boundary";

/// In-memory store mirroring the dedup semantics of the bills table.
#[derive(Default)]
struct MemoryStore {
    bills: Mutex<Vec<bill::Model>>,
    logs: Mutex<Vec<NewLogEntry>>,
}

#[async_trait]
impl BillStore for MemoryStore {
    async fn create_bill(&self, new: NewBill) -> AppResult<bill::Model> {
        let mut bills = self.bills.lock().unwrap();
        if new.supersedes.is_none()
            && bills
                .iter()
                .any(|b| b.file_hash == new.file_hash && b.supersedes.is_none())
        {
            return Err(AppError::Duplicate(
                "this bill has already been processed".to_string(),
            ));
        }

        let now = Utc::now();
        let model = bill::Model {
            id: Uuid::now_v7(),
            customer_number: None,
            reference_month: None,
            electric_energy_kwh: None,
            electric_energy_value: None,
            sceee_energy_kwh: None,
            sceee_energy_value: None,
            compensated_energy_kwh: None,
            compensated_energy_value: None,
            public_lighting_value: None,
            total_energy_consumption: None,
            compensated_energy_total: None,
            total_value_without_gd: None,
            gd_economy: None,
            file_name: new.file_name,
            file_path: new.file_path,
            file_size: new.file_size,
            file_hash: new.file_hash,
            status: "processing".to_string(),
            error_message: None,
            supersedes: new.supersedes,
            created_at: now,
            updated_at: now,
        };
        bills.push(model.clone());
        Ok(model)
    }

    async fn mark_bill_completed(
        &self,
        id: Uuid,
        extracted: &ExtractedBill,
        metrics: &DerivedMetrics,
    ) -> AppResult<bill::Model> {
        let mut bills = self.bills.lock().unwrap();
        let model = bills
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Bill {}", id)))?;
        model.customer_number = Some(extracted.customer_number.clone());
        model.reference_month = Some(extracted.reference_month.clone());
        model.electric_energy_kwh = Some(extracted.electric_energy.quantity);
        model.electric_energy_value = Some(extracted.electric_energy.value);
        model.total_energy_consumption = Some(metrics.total_energy_consumption);
        model.compensated_energy_total = Some(metrics.compensated_energy_quantity);
        model.total_value_without_gd = Some(metrics.total_value_without_gd);
        model.gd_economy = Some(metrics.gd_economy);
        model.status = "completed".to_string();
        Ok(model.clone())
    }

    async fn mark_bill_failed(&self, id: Uuid, error_message: &str) -> AppResult<bill::Model> {
        let mut bills = self.bills.lock().unwrap();
        let model = bills
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Bill {}", id)))?;
        model.status = "failed".to_string();
        model.error_message = Some(error_message.to_string());
        Ok(model.clone())
    }

    async fn find_bill_by_id(&self, id: Uuid) -> AppResult<Option<bill::Model>> {
        Ok(self
            .bills
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.id == id)
            .cloned())
    }

    async fn find_bill_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> AppResult<Option<bill::Model>> {
        Ok(self
            .bills
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.file_hash == fingerprint)
            .cloned())
    }

    async fn append_log(&self, entry: NewLogEntry) -> AppResult<()> {
        self.logs.lock().unwrap().push(entry);
        Ok(())
    }

    async fn delete_bill_record(&self, id: Uuid) -> AppResult<()> {
        let mut bills = self.bills.lock().unwrap();
        let before = bills.len();
        bills.retain(|b| b.id != id);
        if bills.len() == before {
            return Err(AppError::NotFound(format!("Bill {}", id)));
        }
        Ok(())
    }

    async fn delete_bill_logs(&self, bill_id: Uuid) -> AppResult<u64> {
        let mut logs = self.logs.lock().unwrap();
        let before = logs.len();
        logs.retain(|l| l.bill_id != bill_id);
        Ok((before - logs.len()) as u64)
    }

    async fn count_bills_sharing_file(&self, file_path: &str) -> AppResult<u64> {
        Ok(self
            .bills
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.file_path == file_path)
            .count() as u64)
    }
}

struct CannedExtractor {
    fail: bool,
}

#[async_trait]
impl BillExtractor for CannedExtractor {
    async fn extract(&self, _bytes: &[u8], _filename: &str) -> AppResult<ExtractedBill> {
        if self.fail {
            return Err(AppError::Extraction("unreadable document".to_string()));
        }
        Ok(ExtractedBill {
            customer_number: "7204076116".to_string(),
            reference_month: "JAN/2024".to_string(),
            electric_energy: EnergyLine {
                quantity: 50.0,
                value: 45.67,
            },
            sceee_energy: None,
            compensated_energy: None,
            public_lighting_value: None,
        })
    }
}

fn test_config(data_dir: &std::path::Path) -> Config {
    Config {
        environment: Environment::Development,
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: "postgres://unused".to_string(),
        data_dir: data_dir.to_path_buf(),
        max_upload_size: 1024 * 1024,
        gemini: GeminiConfig {
            api_key: "test-key".to_string(),
            model: "gemini-2.0-flash".to_string(),
        },
    }
}

/// Build a multipart/form-data body with one "file" field.
fn multipart_body(file_name: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(file_name: &str, content_type: &str, bytes: &[u8]) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/api/v1/bills/upload")
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(multipart_body(file_name, content_type, bytes))
}

async fn spawn_app(
    store: Arc<MemoryStore>,
    fail_extraction: bool,
    data_dir: &std::path::Path,
) -> impl actix_web::dev::Service<
    actix_http::Request,
    Response = actix_web::dev::ServiceResponse,
    Error = actix_web::Error,
> {
    let pipeline = IngestionPipeline::new(
        store,
        Arc::new(CannedExtractor {
            fail: fail_extraction,
        }),
        1024 * 1024,
    );

    test::init_service(
        App::new()
            .app_data(web::Data::new(pipeline))
            .app_data(web::Data::new(test_config(data_dir)))
            .service(web::scope("/api/v1").configure(api::configure_bill_routes)),
    )
    .await
}

#[actix_rt::test]
async fn upload_accepts_a_pdf_and_reports_the_completed_bill() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::default());
    let app = spawn_app(store.clone(), false, dir.path()).await;

    let req = upload_request("conta-jan.pdf", "application/pdf", b"%PDF-1.4 january");
    let resp = test::call_service(&app, req.to_request()).await;

    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);

    let bill_id: Uuid = body["bill_id"].as_str().unwrap().parse().unwrap();
    let bills = store.bills.lock().unwrap();
    let bill = bills.iter().find(|b| b.id == bill_id).unwrap();
    assert_eq!(bill.status, "completed");
    assert_eq!(bill.customer_number.as_deref(), Some("7204076116"));

    // The original PDF was persisted under the data directory
    assert!(std::path::Path::new(&bill.file_path).exists());
    assert!(bill.file_path.starts_with(dir.path().to_str().unwrap()));
    drop(bills);

    let operations: Vec<String> = store
        .logs
        .lock()
        .unwrap()
        .iter()
        .map(|l| l.operation.clone())
        .collect();
    assert_eq!(operations, vec!["upload_started", "processing_completed"]);
}

#[actix_rt::test]
async fn upload_rejects_non_pdf_content() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::default());
    let app = spawn_app(store.clone(), false, dir.path()).await;

    let req = upload_request("photo.png", "image/png", b"\x89PNG\r\n");
    let resp = test::call_service(&app, req.to_request()).await;

    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "INVALID_INPUT");
    assert!(store.bills.lock().unwrap().is_empty());

    // The rejected upload left nothing behind on disk
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[actix_rt::test]
async fn upload_rejects_a_duplicate_with_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::default());
    let app = spawn_app(store.clone(), false, dir.path()).await;

    let first = upload_request("conta.pdf", "application/pdf", b"%PDF-1.4 same bytes");
    assert_eq!(
        test::call_service(&app, first.to_request()).await.status(),
        201
    );

    let second = upload_request("renamed.pdf", "application/pdf", b"%PDF-1.4 same bytes");
    let resp = test::call_service(&app, second.to_request()).await;

    assert_eq!(resp.status(), 409);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "DUPLICATE_BILL");
    assert_eq!(store.bills.lock().unwrap().len(), 1);
}

#[actix_rt::test]
async fn upload_surfaces_extraction_failure_as_unprocessable() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::default());
    let app = spawn_app(store.clone(), true, dir.path()).await;

    let req = upload_request("conta.pdf", "application/pdf", b"%PDF-1.4 garbled");
    let resp = test::call_service(&app, req.to_request()).await;

    assert_eq!(resp.status(), 422);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "EXTRACTION_FAILED");

    // The record exists in failed state and the file is kept for reprocessing
    let bills = store.bills.lock().unwrap();
    assert_eq!(bills.len(), 1);
    assert_eq!(bills[0].status, "failed");
    assert!(std::path::Path::new(&bills[0].file_path).exists());
}

#[actix_rt::test]
async fn upload_without_a_file_field_is_a_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::default());
    let app = spawn_app(store.clone(), false, dir.path()).await;

    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"comment\"\r\n\r\nhello\r\n");
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    let req = test::TestRequest::post()
        .uri("/api/v1/bills/upload")
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(body);

    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), 400);
}

#[actix_rt::test]
async fn reprocess_of_a_failed_bill_supersedes_it() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::default());

    // First pass fails extraction, leaving a failed record behind
    let failing = spawn_app(store.clone(), true, dir.path()).await;
    let req = upload_request("conta.pdf", "application/pdf", b"%PDF-1.4 retry me");
    assert_eq!(
        test::call_service(&failing, req.to_request()).await.status(),
        422
    );
    let failed_id = store.bills.lock().unwrap()[0].id;

    // Second pass succeeds through the reprocess endpoint
    let app = spawn_app(store.clone(), false, dir.path()).await;
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/bills/{}/reprocess", failed_id))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = test::read_body_json(resp).await;
    let new_id: Uuid = body["bill_id"].as_str().unwrap().parse().unwrap();
    assert_ne!(new_id, failed_id);

    let bills = store.bills.lock().unwrap();
    let new_bill = bills.iter().find(|b| b.id == new_id).unwrap();
    assert_eq!(new_bill.status, "completed");
    assert_eq!(new_bill.supersedes, Some(failed_id));
    let old_bill = bills.iter().find(|b| b.id == failed_id).unwrap();
    assert_eq!(old_bill.status, "failed");
}

#[actix_rt::test]
async fn delete_of_superseded_bill_keeps_the_shared_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::default());

    // Failed upload, then a successful reprocess sharing its stored file
    let failing = spawn_app(store.clone(), true, dir.path()).await;
    let req = upload_request("conta.pdf", "application/pdf", b"%PDF-1.4 shared file");
    assert_eq!(
        test::call_service(&failing, req.to_request()).await.status(),
        422
    );
    let (failed_id, file_path) = {
        let bills = store.bills.lock().unwrap();
        (bills[0].id, bills[0].file_path.clone())
    };

    let app = spawn_app(store.clone(), false, dir.path()).await;
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/bills/{}/reprocess", failed_id))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    // Deleting the failed original must leave the superseding record's file
    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/bills/{}", failed_id))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 204);
    assert!(std::path::Path::new(&file_path).exists());

    let bills = store.bills.lock().unwrap();
    assert_eq!(bills.len(), 1);
    assert_eq!(bills[0].file_path, file_path);
}

#[actix_rt::test]
async fn delete_of_unknown_bill_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::default());
    let app = spawn_app(store.clone(), false, dir.path()).await;

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/bills/{}", Uuid::now_v7()))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "NOT_FOUND");
}
