use std::sync::Arc;
use std::time::Duration;

use ar_render_pipeline::{
    config::AppConfig,
    db::{self, product_queries, queries},
    models::job::{JobStatus, Operation},
    models::render::CreateProductRequest,
    services::{
        queue::{JobQueue, QueuedRenderJob},
        renderer::EmbeddedRenderer,
        runner::JobRunner,
        storage::StorageClient,
    },
};
use uuid::Uuid;

fn test_config() -> AppConfig {
    AppConfig::from_env().expect("Failed to load config")
}

async fn test_pool(config: &AppConfig) -> sqlx::PgPool {
    let pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    db::run_migrations(&pool).await.expect("Failed to run migrations");
    pool
}

fn test_storage(config: &AppConfig) -> StorageClient {
    StorageClient::new(
        &config.storage_bucket,
        &config.storage_endpoint,
        &config.storage_access_key,
        &config.storage_secret_key,
        &config.storage_public_base_url,
    )
    .expect("Failed to initialize storage client")
}

async fn insert_product(pool: &sqlx::PgPool) -> Uuid {
    let product = product_queries::create_product(
        pool,
        &CreateProductRequest {
            name: "Integration Bangle".to_string(),
            price: 99.0,
            category: "bangles".to_string(),
            material: "gold".to_string(),
            stock: 1,
        },
    )
    .await
    .expect("Failed to create product");
    product.id
}

/// Integration test: queue, storage and job bookkeeping working together.
///
/// Note: this requires running PostgreSQL, Redis and S3-compatible storage
/// instances configured via environment variables.
#[tokio::test]
#[ignore] // Run with: cargo test --test integration_test -- --ignored
async fn job_bookkeeping_and_queue_flow() {
    let config = test_config();
    let pool = test_pool(&config).await;
    let storage = test_storage(&config);
    let queue = JobQueue::new(&config.redis_url).expect("Failed to initialize queue");

    let product_id = insert_product(&pool).await;

    // 1. Upload a source model
    let key = format!("models/{product_id}/source/{}.obj", Uuid::new_v4());
    let model_url = storage
        .upload(&key, b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n", "application/octet-stream")
        .await
        .expect("Storage upload failed");
    product_queries::set_model_urls(&pool, product_id, &model_url, &model_url)
        .await
        .expect("Failed to record model URLs");

    // 2. Create a job row
    let operations = vec!["optimize".to_string(), "render_360".to_string()];
    let job = queries::create_job(&pool, product_id, &operations)
        .await
        .expect("Failed to create job");
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.progress, 0);
    assert_eq!(job.results, serde_json::json!({}));

    // 3. Queue round trip
    let queued = QueuedRenderJob {
        job_id: job.id,
        product_id,
        model_url: model_url.clone(),
        operations: vec![Operation::Optimize, Operation::Render360],
    };
    queue.enqueue(&queued).await.expect("Failed to enqueue");
    let dequeued = queue
        .dequeue()
        .await
        .expect("Failed to dequeue")
        .expect("No job in queue");
    assert_eq!(dequeued.job_id, job.id);

    // 4. Product lock serializes same-product work
    assert!(queue.try_lock_product(product_id, 60).await.unwrap());
    assert!(!queue.try_lock_product(product_id, 60).await.unwrap());
    queue.unlock_product(product_id).await.unwrap();
    assert!(queue.try_lock_product(product_id, 60).await.unwrap());
    queue.unlock_product(product_id).await.unwrap();

    // 5. Status transitions and partial results
    queries::mark_processing(&pool, job.id, 5).await.unwrap();
    let processing = queries::get_job(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(processing.status, JobStatus::Processing);
    assert!(processing.started_at.is_some());
    assert!(processing.progress > 0);

    queries::merge_job_result(
        &pool,
        job.id,
        "optimize",
        serde_json::json!("https://assets.example.com/jobs/x/optimize/optimized.glb"),
        50,
    )
    .await
    .unwrap();

    let partial = queries::get_job(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(partial.status, JobStatus::Processing);
    assert!(partial.results.get("optimize").is_some());
    assert!(partial.results.get("render_360").is_none());
    assert_eq!(partial.progress, 50);

    // 6. Completion
    queries::complete_job(&pool, job.id).await.unwrap();
    let done = queries::get_job(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress, 100);
    assert!(done.completed_at.is_some());

    // Cleanup
    queue.complete(&dequeued).await.expect("Failed to complete queue entry");
    storage.delete(&key).await.expect("Failed to delete test object");
}

/// Full runner pass with the embedded backend against real infrastructure:
/// download, all four operations, uploads, product update.
#[tokio::test]
#[ignore]
async fn runner_processes_a_job_end_to_end() {
    let config = test_config();
    let pool = test_pool(&config).await;
    let storage = Arc::new(test_storage(&config));

    let product_id = insert_product(&pool).await;

    let key = format!("models/{product_id}/source/{}.obj", Uuid::new_v4());
    let obj = b"v 0 0 0\nv 1 0 0\nv 1 0 1\nv 0 0 1\nv 0.5 1 0.5\n\
                f 1 4 3 2\nf 1 2 5\nf 2 3 5\nf 3 4 5\nf 4 1 5\n";
    let model_url = storage
        .upload(&key, obj, "application/octet-stream")
        .await
        .expect("Storage upload failed");
    product_queries::set_model_urls(&pool, product_id, &model_url, &model_url)
        .await
        .unwrap();

    let operations = vec![
        Operation::Optimize,
        Operation::Render360,
        Operation::GenerateThumbnail,
        Operation::ExtractDimensions,
    ];
    let names: Vec<String> = operations.iter().map(|o| o.to_string()).collect();
    let job = queries::create_job(&pool, product_id, &names).await.unwrap();

    let runner = JobRunner::new(
        pool.clone(),
        storage,
        Arc::new(EmbeddedRenderer::default()),
        Duration::from_secs(120),
    );
    runner
        .process(&QueuedRenderJob {
            job_id: job.id,
            product_id,
            model_url: model_url.clone(),
            operations,
        })
        .await
        .expect("Runner hit an infrastructure error");

    let done = queries::get_job(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed, "error: {:?}", done.error);
    assert_eq!(done.progress, 100);

    // One entry per operation, with contracted shapes.
    assert!(done.results["optimize"].as_str().unwrap().ends_with(".glb"));
    assert_eq!(done.results["render_360"].as_array().unwrap().len(), 8);
    assert!(done.results["generate_thumbnail"].as_str().unwrap().ends_with(".png"));
    assert!(done.results["extract_dimensions"].as_str().unwrap().ends_with(".json"));

    // The optimized model replaced the source on the product; the original
    // upload URL is preserved for re-processing.
    let product = product_queries::get_product(&pool, product_id).await.unwrap().unwrap();
    assert_eq!(product.model_3d_url.as_deref(), done.results["optimize"].as_str());
    assert_eq!(product.original_model_url.as_deref(), Some(model_url.as_str()));
}
