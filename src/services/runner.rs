use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{product_queries, queries};
use crate::models::job::Operation;
use crate::services::queue::QueuedRenderJob;
use crate::services::renderer::{ArtifactKind, ModelRenderer, RenderContext};
use crate::services::storage::StorageClient;

/// Progress stamped when a job enters `processing`, before any operation ran.
pub const PROGRESS_STARTED: i32 = 5;

/// Progress ceiling for operation updates; the jump to 100 is reserved for
/// the terminal `completed` transition.
const PROGRESS_OPS_SPAN: i32 = 90;

/// Executes one render job end to end: workspace setup, source download,
/// per-operation dispatch to the configured backend, artifact upload, job
/// bookkeeping, and the final product update.
pub struct JobRunner {
    db: PgPool,
    storage: Arc<StorageClient>,
    renderer: Arc<dyn ModelRenderer>,
    http: reqwest::Client,
    operation_timeout: Duration,
}

/// Infrastructure failures of the runner itself. Failures of the job being
/// processed are recorded on the job row and are not errors of the runner.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("workspace error: {0}")]
    Workspace(#[from] std::io::Error),
}

impl JobRunner {
    pub fn new(
        db: PgPool,
        storage: Arc<StorageClient>,
        renderer: Arc<dyn ModelRenderer>,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            db,
            storage,
            renderer,
            http: reqwest::Client::new(),
            operation_timeout,
        }
    }

    /// Run a dequeued job to a terminal state.
    ///
    /// The workspace temp dir is dropped on every exit path, including the
    /// timeout path (which also reaps a Blender child via kill-on-drop).
    pub async fn process(&self, job: &QueuedRenderJob) -> Result<(), RunnerError> {
        queries::mark_processing(&self.db, job.job_id, PROGRESS_STARTED).await?;

        let started = std::time::Instant::now();
        let workspace = tempfile::tempdir()?;

        let outcome = self.run_operations(job, workspace.path()).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(optimized_url) => {
                product_queries::apply_render_outputs(
                    &self.db,
                    job.product_id,
                    optimized_url.as_deref(),
                    1.0,
                    &[0.0, 0.0, 0.0],
                )
                .await?;
                queries::complete_job(&self.db, job.job_id).await?;

                metrics::counter!("render_jobs_completed").increment(1);
                metrics::histogram!("render_job_duration_seconds").record(elapsed.as_secs_f64());
                tracing::info!(
                    job_id = %job.job_id,
                    product_id = %job.product_id,
                    duration_ms = elapsed.as_millis() as u64,
                    "job completed"
                );
            }
            Err(reason) => {
                queries::fail_job(&self.db, job.job_id, &reason).await?;

                metrics::counter!("render_jobs_failed").increment(1);
                tracing::warn!(
                    job_id = %job.job_id,
                    product_id = %job.product_id,
                    error = %reason,
                    "job failed"
                );
            }
        }

        Ok(())
    }

    /// Execute all operations in order. Returns the optimized model URL (if
    /// `optimize` ran) on success, or the failure message for the job row.
    /// The first failing operation stops the loop; later operations never
    /// get a `results` entry.
    async fn run_operations(
        &self,
        job: &QueuedRenderJob,
        workspace: &std::path::Path,
    ) -> Result<Option<String>, String> {
        let input_path = self
            .fetch_source_model(&job.model_url, workspace)
            .await
            .map_err(|e| format!("failed to fetch source model: {e}"))?;

        let total = job.operations.len();
        let mut optimized_url: Option<String> = None;

        for (index, &operation) in job.operations.iter().enumerate() {
            let output_dir = workspace.join(operation.to_string());
            std::fs::create_dir_all(&output_dir)
                .map_err(|e| format!("failed to create workspace for {operation}: {e}"))?;

            let ctx = RenderContext {
                job_id: job.job_id,
                input_path: input_path.clone(),
                output_dir,
            };

            tracing::info!(
                job_id = %job.job_id,
                operation = %operation,
                backend = self.renderer.name(),
                "running operation"
            );

            let artifacts =
                match tokio::time::timeout(self.operation_timeout, self.renderer.run(operation, &ctx))
                    .await
                {
                    Err(_) => {
                        return Err(format!(
                            "operation {operation} timed out after {}s",
                            self.operation_timeout.as_secs()
                        ))
                    }
                    Ok(Err(e)) => return Err(format!("operation {operation} failed: {e}")),
                    Ok(Ok(artifacts)) => artifacts,
                };

            if artifacts.is_empty() {
                return Err(format!("operation {operation} produced no artifacts"));
            }

            let mut urls = Vec::with_capacity(artifacts.len());
            for artifact in &artifacts {
                let data = tokio::fs::read(&artifact.path)
                    .await
                    .map_err(|e| format!("failed to read artifact for {operation}: {e}"))?;
                let key = storage_key(job.job_id, operation, &artifact.file_name());
                let url = self
                    .storage
                    .upload(&key, &data, artifact.content_type)
                    .await
                    .map_err(|e| format!("failed to store artifact for {operation}: {e}"))?;

                if operation == Operation::Optimize
                    && artifact.kind == ArtifactKind::Model
                    && optimized_url.is_none()
                {
                    optimized_url = Some(url.clone());
                }
                urls.push(url);
            }

            queries::merge_job_result(
                &self.db,
                job.job_id,
                &operation.to_string(),
                result_value(operation, urls),
                progress_after(index, total),
            )
            .await
            .map_err(|e| format!("failed to record result for {operation}: {e}"))?;
        }

        Ok(optimized_url)
    }

    /// Download the source model into the workspace, preserving its
    /// extension so the backends can dispatch on it.
    async fn fetch_source_model(
        &self,
        model_url: &str,
        workspace: &std::path::Path,
    ) -> Result<std::path::PathBuf, String> {
        let response = self
            .http
            .get(model_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;
        let bytes = response.bytes().await.map_err(|e| e.to_string())?;

        let path = workspace.join(format!("source.{}", extension_of(model_url)));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| e.to_string())?;
        Ok(path)
    }
}

/// Storage key for one artifact of one operation.
fn storage_key(job_id: Uuid, operation: Operation, file_name: &str) -> String {
    format!("jobs/{job_id}/{operation}/{file_name}")
}

/// Results shape per operation: `render_360` is always a list of URLs,
/// everything else a single URL.
fn result_value(operation: Operation, urls: Vec<String>) -> serde_json::Value {
    match operation {
        Operation::Render360 => serde_json::json!(urls),
        _ => serde_json::json!(urls[0]),
    }
}

/// Progress after finishing operation `index` of `total`. Strictly
/// increasing per operation, always below 100 (reserved for completion).
fn progress_after(index: usize, total: usize) -> i32 {
    PROGRESS_STARTED + ((index as i32 + 1) * PROGRESS_OPS_SPAN) / total.max(1) as i32
}

/// Extension of the final path segment of a URL, query string stripped.
fn extension_of(url: &str) -> String {
    let name = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .rsplit('/')
        .next()
        .unwrap_or_default();
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => "bin".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_monotonic_and_bounded() {
        for total in 1..=8 {
            let mut last = PROGRESS_STARTED;
            for index in 0..total {
                let p = progress_after(index, total);
                assert!(p > last, "progress must strictly increase");
                assert!(p < 100, "100 is reserved for completion");
                last = p;
            }
            assert_eq!(last, PROGRESS_STARTED + PROGRESS_OPS_SPAN);
        }
    }

    #[test]
    fn render_360_results_are_a_list() {
        let urls = vec!["a".to_string(), "b".to_string()];
        assert!(result_value(Operation::Render360, urls).is_array());

        let single = vec!["a".to_string()];
        assert!(result_value(Operation::Optimize, single).is_string());
    }

    #[test]
    fn storage_keys_are_scoped_per_job_and_operation() {
        let job_id = Uuid::new_v4();
        let key = storage_key(job_id, Operation::Render360, "turntable_000.png");
        assert_eq!(key, format!("jobs/{job_id}/render_360/turntable_000.png"));
    }

    #[test]
    fn url_extension_extraction() {
        assert_eq!(extension_of("https://cdn.example.com/m/ring.OBJ"), "obj");
        assert_eq!(extension_of("https://cdn.example.com/m/ring.glb?v=2"), "glb");
        assert_eq!(extension_of("https://cdn.example.com/m/ring"), "bin");
    }
}
