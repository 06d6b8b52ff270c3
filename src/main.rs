//! Energy Bill Server - Main entry point.
//!
//! Starts the Actix-web server with configured routes and middleware.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, http::header, web};
use sea_orm_migration::MigratorTrait;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use energy_bill_lib::api;
use energy_bill_lib::config::Config;
use energy_bill_lib::db::{BillStore, DbPool};
use energy_bill_lib::middleware::RequestLogger;
use energy_bill_lib::migration::Migrator;
use energy_bill_lib::services::{BillExtractor, GeminiExtractor, IngestionPipeline};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - GEMINI_API_KEY must be set");
            error!("  - In production, DATABASE_URL must be set");
            error!("  - In production, values must not match development defaults");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  Energy Bill Server");
    info!("  Environment: {}", config.environment);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
    }

    // Create the upload directory
    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .expect("Failed to create data directory");

    // Connect to PostgreSQL
    let pool = DbPool::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");
    info!("Database connection established");

    // Run migrations
    Migrator::up(pool.connection(), None)
        .await
        .expect("Failed to run migrations");
    info!("Database migrations complete");

    // Assemble the ingestion pipeline once; handlers share it via app data
    let extractor: Arc<dyn BillExtractor> = Arc::new(GeminiExtractor::new(&config.gemini));
    let store: Arc<dyn BillStore> = Arc::new(pool.clone());
    let pipeline = web::Data::new(IngestionPipeline::new(
        store,
        extractor,
        config.max_upload_size,
    ));

    let bind_address = config.bind_address();
    let max_upload_size = config.max_upload_size;
    let is_development = config.is_development();
    let config_data = web::Data::new(config);

    let worker_count = if is_development {
        info!(
            "Starting server at http://{} (4 workers - development mode)",
            bind_address
        );
        4
    } else {
        let cpus = num_cpus::get();
        info!(
            "Starting server at http://{} ({} workers)",
            bind_address, cpus
        );
        cpus
    };

    info!("Swagger UI available at http://{}/docs/", bind_address);

    // Start HTTP server
    HttpServer::new(move || {
        // Configure CORS
        let cors = if is_development {
            // Permissive CORS for development
            Cors::default()
                .allow_any_origin()
                .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
                .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
                .max_age(3600)
        } else {
            // Same-origin only in production
            Cors::default()
                .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
                .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
                .max_age(3600)
        };

        App::new()
            // CORS must wrap before other middleware
            .wrap(cors)
            .wrap(RequestLogger)
            .app_data(web::Data::new(pool.clone()))
            .app_data(config_data.clone())
            .app_data(pipeline.clone())
            // Slack at the HTTP layer; the real limit is enforced while
            // streaming the multipart field
            .app_data(web::PayloadConfig::new(max_upload_size * 2))
            .service(
                web::scope("/api/v1")
                    .configure(api::configure_health_routes)
                    .configure(api::configure_bill_routes)
                    .configure(api::configure_dashboard_routes),
            )
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", api::ApiDoc::openapi()),
            )
    })
    .workers(worker_count)
    .bind(&bind_address)?
    .run()
    .await
}
