mod app_state;
mod config;
mod db;
mod error;
mod models;
mod routes;
mod services;

use axum::extract::DefaultBodyLimit;
use axum::response::Html;
use axum::{middleware, routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use app_state::AppState;
use config::AppConfig;
use services::{queue::JobQueue, storage::StorageClient};

const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing AR render pipeline server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_histogram!(
        "render_job_duration_seconds",
        "Time to process a render job to a terminal state"
    );
    metrics::describe_counter!("render_jobs_total", "Total render jobs submitted");
    metrics::describe_counter!("render_jobs_completed", "Total render jobs completed");
    metrics::describe_counter!("render_jobs_failed", "Total render jobs that failed");
    metrics::describe_gauge!(
        "render_queue_depth",
        "Current number of pending jobs in the queue"
    );

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Initialize object storage client
    tracing::info!("Initializing object storage client");
    let storage = StorageClient::new(
        &config.storage_bucket,
        &config.storage_endpoint,
        &config.storage_access_key,
        &config.storage_secret_key,
        &config.storage_public_base_url,
    )
    .expect("Failed to initialize storage client");

    // Initialize Redis job queue
    tracing::info!("Connecting to Redis job queue");
    let queue = JobQueue::new(&config.redis_url).expect("Failed to initialize job queue");

    // Create shared application state
    let state = AppState::new(db_pool, storage, queue, config);

    // Refresh the queue-depth gauge in the background
    let depth_queue = state.queue.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(10));
        loop {
            tick.tick().await;
            if let Ok(depth) = depth_queue.queue_depth().await {
                metrics::gauge!("render_queue_depth").set(depth as f64);
            }
        }
    });

    // Admin-gated routes: everything that mutates the catalog or spends
    // compute. AR config and job polling stay public for storefront viewers.
    let admin_routes = Router::new()
        .route("/render/upload-model", post(routes::render::upload_model))
        .route("/render/process", post(routes::render::process_model))
        .route("/render/jobs/{product_id}", get(routes::render::get_product_jobs))
        .route(
            "/render/products/{product_id}/enable-ar",
            post(routes::render::enable_ar),
        )
        .route(
            "/render/products/{product_id}/disable-ar",
            post(routes::render::disable_ar),
        )
        .route("/api/products", post(routes::products::create_product))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            routes::admin::require_admin,
        ));

    // Build API routes
    let app = Router::new()
        // Static test console (embedded at compile time)
        .route("/", get(|| async { Html(include_str!("../static/index.html")) }))
        // API endpoints
        .route("/health", get(routes::health::health_check))
        .route("/render/job/{job_id}", get(routes::render::get_job_status))
        .route(
            "/render/ar-config/{product_id}",
            get(routes::render::get_ar_config),
        )
        .route("/api/products/{product_id}", get(routes::products::get_product))
        .merge(admin_routes)
        .with_state(state.clone())
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        // .blend uploads run large; axum's own 2 MB extractor cap has to be
        // raised alongside the body limit layer.
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES));

    let bind_addr = state.config.bind_addr.clone();
    tracing::info!("Starting ar-render-pipeline on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
