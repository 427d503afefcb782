use std::str::FromStr;

use axum::extract::{Multipart, Path, State};
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::{product_queries, queries};
use crate::error::ApiError;
use crate::models::job::{ModelFormat, Operation, RenderJob};
use crate::models::product::Product;
use crate::models::render::{
    ArConfigResponse, JobListResponse, JobStatusResponse, ModelUploadResponse, ProcessRequest,
    ProcessResponse,
};
use crate::services::queue::QueuedRenderJob;

/// POST /render/upload-model — upload a 3D model file for a product.
///
/// Multipart form: `product_id`, `file`. The extension is validated before
/// anything is stored, so a bad upload leaves no asset behind.
pub async fn upload_model(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ModelUploadResponse>, ApiError> {
    let mut product_id: Option<Uuid> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("product_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(format!("invalid product_id field: {e}")))?;
                product_id = Some(
                    Uuid::parse_str(text.trim())
                        .map_err(|_| ApiError::Validation("product_id must be a UUID".into()))?,
                );
            }
            Some("file") => {
                let name = field
                    .file_name()
                    .ok_or_else(|| ApiError::Validation("file field needs a filename".into()))?
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("failed to read upload: {e}")))?;
                file = Some((name, data.to_vec()));
            }
            _ => {}
        }
    }

    let product_id =
        product_id.ok_or_else(|| ApiError::Validation("missing product_id field".into()))?;
    let (file_name, data) =
        file.ok_or_else(|| ApiError::Validation("missing file field".into()))?;
    if data.is_empty() {
        return Err(ApiError::Validation("uploaded file is empty".into()));
    }

    let ext = file_name
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    let format =
        ModelFormat::from_str(&ext).map_err(|_| ApiError::UnsupportedFormat(ext.clone()))?;

    let product = fetch_product(&state, product_id).await?;

    let key = format!("models/{}/source/{}.{}", product.id, Uuid::new_v4(), format);
    let url = state
        .storage
        .upload(&key, &data, "application/octet-stream")
        .await?;

    product_queries::set_model_urls(&state.db, product.id, &url, &url).await?;

    tracing::info!(
        product_id = %product.id,
        file_name = %file_name,
        size = data.len(),
        "3D model uploaded"
    );

    Ok(Json(ModelUploadResponse {
        model_url: url.clone(),
        original_url: url,
        file_name,
        file_size: data.len(),
        format: format.to_string(),
    }))
}

/// POST /render/process — create a render job and enqueue it.
///
/// Validation happens synchronously; a job row only exists once every
/// operation name parsed. The call never blocks on processing.
pub async fn process_model(
    State(state): State<AppState>,
    Json(request): Json<ProcessRequest>,
) -> Result<Json<ProcessResponse>, ApiError> {
    request.validate()?;

    let operations = request
        .operations
        .iter()
        .map(|name| {
            Operation::from_str(name)
                .map_err(|_| ApiError::Validation(format!("unknown operation: {name}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let product = fetch_product(&state, request.product_id).await?;
    let model_url = product.model_3d_url.clone().ok_or_else(|| {
        ApiError::Validation("product has no 3D model uploaded; upload a model first".into())
    })?;

    let job = queries::create_job(&state.db, product.id, &request.operations).await?;

    let queued = QueuedRenderJob {
        job_id: job.id,
        product_id: product.id,
        model_url,
        operations,
    };
    if let Err(e) = state.queue.enqueue(&queued).await {
        // The row exists but no worker will ever see it; close it out.
        queries::fail_job(&state.db, job.id, "failed to enqueue job").await?;
        return Err(e.into());
    }

    metrics::counter!("render_jobs_total").increment(1);
    tracing::info!(job_id = %job.id, product_id = %product.id, "render job queued");

    Ok(Json(ProcessResponse {
        job_id: job.id,
        status: job.status.to_string(),
        operations: job.operations,
    }))
}

/// GET /render/job/{job_id} — job status, progress and partial results.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = queries::get_job(&state.db, job_id)
        .await?
        .ok_or(ApiError::NotFound { entity: "job" })?;

    Ok(Json(job_response(job)))
}

/// GET /render/jobs/{product_id} — job history for a product, newest first.
pub async fn get_product_jobs(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<JobListResponse>, ApiError> {
    let jobs = queries::get_jobs_by_product(&state.db, product_id).await?;

    Ok(Json(JobListResponse {
        total: jobs.len(),
        jobs: jobs.into_iter().map(job_response).collect(),
    }))
}

/// GET /render/ar-config/{product_id} — AR viewer configuration.
///
/// A pure read of the product record: the stored model URL is returned even
/// while `ar_enabled` is false, so viewers can preload before launch.
pub async fn get_ar_config(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ArConfigResponse>, ApiError> {
    let product = fetch_product(&state, product_id).await?;

    Ok(Json(ArConfigResponse {
        model_url: product.model_3d_url,
        ar_enabled: product.ar_enabled,
        scale: product.ar_scale,
        rotation: product.ar_rotation,
    }))
}

/// POST /render/products/{product_id}/enable-ar
pub async fn enable_ar(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let product = fetch_product(&state, product_id).await?;
    if product.model_3d_url.is_none() {
        return Err(ApiError::Validation("product has no 3D model".into()));
    }

    product_queries::set_ar_enabled(&state.db, product_id, true).await?;
    Ok(Json(serde_json::json!({
        "message": "AR enabled for product",
        "product_id": product_id,
    })))
}

/// POST /render/products/{product_id}/disable-ar
pub async fn disable_ar(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let updated = product_queries::set_ar_enabled(&state.db, product_id, false).await?;
    if !updated {
        return Err(ApiError::NotFound { entity: "product" });
    }

    Ok(Json(serde_json::json!({
        "message": "AR disabled for product",
        "product_id": product_id,
    })))
}

async fn fetch_product(state: &AppState, product_id: Uuid) -> Result<Product, ApiError> {
    product_queries::get_product(&state.db, product_id)
        .await?
        .ok_or(ApiError::NotFound { entity: "product" })
}

fn job_response(job: RenderJob) -> JobStatusResponse {
    JobStatusResponse {
        job_id: job.id,
        product_id: job.product_id,
        status: job.status.to_string(),
        progress: job.progress,
        results: job.results,
        error: job.error,
        created_at: job.created_at,
        started_at: job.started_at,
        completed_at: job.completed_at,
    }
}
