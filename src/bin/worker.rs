use ar_render_pipeline::{
    config::AppConfig,
    db,
    services::{
        queue::{JobQueue, QueuedRenderJob},
        renderer,
        runner::JobRunner,
        storage::StorageClient,
    },
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL_MS: u64 = 1000; // 1 second

/// Safety margin added to the product-lock TTL beyond the worst-case
/// processing time, so a crashed worker's lock expires on its own.
const LOCK_TTL_MARGIN_SECS: u64 = 60;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting render worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Export job metrics when a scrape address is configured
    if let Some(addr) = &config.worker_metrics_addr {
        let addr: std::net::SocketAddr = addr.parse().expect("Invalid WORKER_METRICS_ADDR");
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .expect("Failed to install Prometheus exporter");
        tracing::info!(%addr, "Worker metrics exporter listening");
    }

    // Initialize database
    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Initialize services
    tracing::info!("Initializing services");
    let storage = Arc::new(
        StorageClient::new(
            &config.storage_bucket,
            &config.storage_endpoint,
            &config.storage_access_key,
            &config.storage_secret_key,
            &config.storage_public_base_url,
        )
        .expect("Failed to initialize storage client"),
    );

    let queue = Arc::new(JobQueue::new(&config.redis_url).expect("Failed to initialize job queue"));

    let backend = renderer::from_config(&config);
    tracing::info!(backend = backend.name(), "Renderer backend selected");

    let operation_timeout = Duration::from_secs(config.render_timeout_secs);
    let runner = JobRunner::new(db_pool, storage, backend, operation_timeout);

    tracing::info!("Worker ready, starting job processing loop");

    // Main processing loop
    loop {
        match process_next_job(&queue, &runner, config.render_timeout_secs).await {
            Ok(true) => {
                // Job processed, check for the next one immediately
                tracing::debug!("Job processed, checking for next job");
            }
            Ok(false) => {
                // No job available, sleep before next poll
                tracing::trace!("No jobs available, sleeping");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Error processing job, will retry");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
        }
    }
}

/// Process the next job from the queue.
/// Returns Ok(true) if a job was handled, Ok(false) if no job was available.
async fn process_next_job(
    queue: &JobQueue,
    runner: &JobRunner,
    operation_timeout_secs: u64,
) -> Result<bool, Box<dyn std::error::Error>> {
    // Dequeue next job
    let job: QueuedRenderJob = match queue.dequeue().await? {
        Some(j) => j,
        None => return Ok(false),
    };

    if let Ok(depth) = queue.queue_depth().await {
        metrics::gauge!("render_queue_depth").set(depth as f64);
    }

    // Serialize jobs per product: the final product-record update must not
    // race between workers. Losers re-queue the entry and move on.
    let lock_ttl =
        operation_timeout_secs * job.operations.len().max(1) as u64 + LOCK_TTL_MARGIN_SECS;
    if !queue.try_lock_product(job.product_id, lock_ttl).await? {
        tracing::debug!(
            job_id = %job.job_id,
            product_id = %job.product_id,
            "product locked by another worker, re-queueing"
        );
        queue.requeue(&job).await?;
        sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        return Ok(true);
    }

    tracing::info!(
        job_id = %job.job_id,
        product_id = %job.product_id,
        operations = ?job.operations,
        "Processing render job"
    );

    // Run the job; always release the lock and the queue entry afterwards.
    let result = runner.process(&job).await;

    if let Err(e) = queue.unlock_product(job.product_id).await {
        tracing::error!(product_id = %job.product_id, error = %e, "Failed to release product lock");
    }
    queue.complete(&job).await?;

    result?;
    Ok(true)
}
