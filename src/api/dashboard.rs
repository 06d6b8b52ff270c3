//! Dashboard API handlers.
//!
//! Aggregates the derived metrics already stored on completed bills. Bills
//! in other states never contribute to the totals.

use actix_web::{HttpResponse, web};
use std::collections::HashMap;

use crate::db::DbPool;
use crate::entity::bill;
use crate::error::AppResult;
use crate::models::{
    DashboardQuery, DashboardSummaryResponse, MonthlyTotals, MonthlyTotalsResponse,
};

/// Sort key for "MMM/YYYY" reference months (Portuguese abbreviations).
///
/// Unknown formats sort after well-formed months, in input order.
fn month_sort_key(reference_month: &str) -> (i32, u8) {
    const MONTHS: [&str; 12] = [
        "JAN", "FEV", "MAR", "ABR", "MAI", "JUN", "JUL", "AGO", "SET", "OUT", "NOV", "DEZ",
    ];

    let mut parts = reference_month.splitn(2, '/');
    let month = parts.next().unwrap_or("");
    let year = parts.next().and_then(|y| y.parse::<i32>().ok());

    match (
        MONTHS.iter().position(|m| m.eq_ignore_ascii_case(month)),
        year,
    ) {
        (Some(index), Some(year)) => (year, index as u8),
        _ => (i32::MAX, u8::MAX),
    }
}

/// Summary totals across completed bills.
#[utoipa::path(
    get,
    path = "/dashboard/summary",
    tag = "Dashboard",
    params(
        ("customer_number" = Option<String>, Query, description = "Customer number substring, case-insensitive"),
        ("reference_month" = Option<String>, Query, description = "Reference month substring, case-insensitive")
    ),
    responses(
        (status = 200, description = "Totals of the derived metrics", body = DashboardSummaryResponse),
    )
)]
pub async fn summary(
    pool: web::Data<DbPool>,
    query: web::Query<DashboardQuery>,
) -> AppResult<HttpResponse> {
    let bills = pool.completed_bills(&query.into_inner()).await?;

    let mut totals = DashboardSummaryResponse::default();
    for bill in &bills {
        totals.bill_count += 1;
        totals.total_energy_consumption += bill.total_energy_consumption.unwrap_or(0.0);
        totals.compensated_energy += bill.compensated_energy_total.unwrap_or(0.0);
        totals.total_value_without_gd += bill.total_value_without_gd.unwrap_or(0.0);
        totals.gd_economy += bill.gd_economy.unwrap_or(0.0);
    }

    Ok(HttpResponse::Ok().json(totals))
}

/// Per-month totals across completed bills, chronological.
#[utoipa::path(
    get,
    path = "/dashboard/monthly",
    tag = "Dashboard",
    params(
        ("customer_number" = Option<String>, Query, description = "Customer number substring, case-insensitive"),
        ("reference_month" = Option<String>, Query, description = "Reference month substring, case-insensitive")
    ),
    responses(
        (status = 200, description = "Monthly breakdown of the derived metrics", body = MonthlyTotalsResponse),
    )
)]
pub async fn monthly(
    pool: web::Data<DbPool>,
    query: web::Query<DashboardQuery>,
) -> AppResult<HttpResponse> {
    let bills = pool.completed_bills(&query.into_inner()).await?;

    let months = fold_monthly(&bills);

    Ok(HttpResponse::Ok().json(MonthlyTotalsResponse { months }))
}

fn fold_monthly(bills: &[bill::Model]) -> Vec<MonthlyTotals> {
    let mut by_month: HashMap<String, MonthlyTotals> = HashMap::new();

    for bill in bills {
        // Completed bills always carry a reference month, but the schema
        // cannot express that; skip rather than invent a bucket.
        let Some(ref reference_month) = bill.reference_month else {
            continue;
        };

        let entry = by_month
            .entry(reference_month.clone())
            .or_insert_with(|| MonthlyTotals {
                reference_month: reference_month.clone(),
                bill_count: 0,
                total_energy_consumption: 0.0,
                compensated_energy: 0.0,
                total_value_without_gd: 0.0,
                gd_economy: 0.0,
            });

        entry.bill_count += 1;
        entry.total_energy_consumption += bill.total_energy_consumption.unwrap_or(0.0);
        entry.compensated_energy += bill.compensated_energy_total.unwrap_or(0.0);
        entry.total_value_without_gd += bill.total_value_without_gd.unwrap_or(0.0);
        entry.gd_economy += bill.gd_economy.unwrap_or(0.0);
    }

    let mut months: Vec<MonthlyTotals> = by_month.into_values().collect();
    months.sort_by_key(|m| month_sort_key(&m.reference_month));
    months
}

/// Configure dashboard routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/dashboard/summary").route(web::get().to(summary)))
        .service(web::resource("/dashboard/monthly").route(web::get().to(monthly)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn completed(reference_month: &str, consumption: f64, economy: f64) -> bill::Model {
        bill::Model {
            id: Uuid::now_v7(),
            customer_number: Some("7204076116".to_string()),
            reference_month: Some(reference_month.to_string()),
            electric_energy_kwh: Some(50.0),
            electric_energy_value: Some(45.67),
            sceee_energy_kwh: None,
            sceee_energy_value: None,
            compensated_energy_kwh: None,
            compensated_energy_value: None,
            public_lighting_value: None,
            total_energy_consumption: Some(consumption),
            compensated_energy_total: Some(0.0),
            total_value_without_gd: Some(45.67),
            gd_economy: Some(economy),
            file_name: "bill.pdf".to_string(),
            file_path: "/tmp/bill.pdf".to_string(),
            file_size: 1024,
            file_hash: Uuid::now_v7().to_string(),
            status: "completed".to_string(),
            error_message: None,
            supersedes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_month_sort_key_orders_within_a_year() {
        assert!(month_sort_key("JAN/2024") < month_sort_key("FEV/2024"));
        assert!(month_sort_key("DEZ/2023") < month_sort_key("JAN/2024"));
    }

    #[test]
    fn test_month_sort_key_is_case_insensitive() {
        assert_eq!(month_sort_key("jan/2024"), month_sort_key("JAN/2024"));
    }

    #[test]
    fn test_month_sort_key_puts_garbage_last() {
        assert!(month_sort_key("DEZ/2099") < month_sort_key("whatever"));
    }

    #[test]
    fn test_fold_monthly_groups_and_sorts() {
        let bills = vec![
            completed("FEV/2024", 400.0, 10.0),
            completed("JAN/2024", 500.0, 20.0),
            completed("JAN/2024", 100.0, 5.0),
        ];

        let months = fold_monthly(&bills);
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].reference_month, "JAN/2024");
        assert_eq!(months[0].bill_count, 2);
        assert_eq!(months[0].total_energy_consumption, 600.0);
        assert_eq!(months[0].gd_economy, 25.0);
        assert_eq!(months[1].reference_month, "FEV/2024");
        assert_eq!(months[1].bill_count, 1);
    }
}
