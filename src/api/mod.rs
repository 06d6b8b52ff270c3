//! API endpoint modules.

pub mod bills;
pub mod dashboard;
pub mod health;
pub mod openapi;

pub use bills::configure_routes as configure_bill_routes;
pub use dashboard::configure_routes as configure_dashboard_routes;
pub use health::configure_health_routes;
pub use openapi::ApiDoc;
