use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for `POST /render/process`.
#[derive(Debug, Deserialize, Validate)]
pub struct ProcessRequest {
    #[garde(skip)]
    pub product_id: Uuid,

    /// Ordered operation names; each must be a known operation.
    #[garde(length(min = 1, max = 16))]
    pub operations: Vec<String>,
}

/// Response after submitting a render job.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub job_id: Uuid,
    pub status: String,
    pub operations: Vec<String>,
}

/// Response after uploading a 3D model file.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelUploadResponse {
    pub model_url: String,
    pub original_url: String,
    pub file_name: String,
    pub file_size: usize,
    pub format: String,
}

/// Response for querying job status and (partial) results.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub product_id: Uuid,
    pub status: String,
    pub progress: i32,
    pub results: serde_json::Value,
    pub error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Job history for a product.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobStatusResponse>,
    pub total: usize,
}

/// AR viewer configuration, read straight off the product record.
#[derive(Debug, Serialize, Deserialize)]
pub struct ArConfigResponse {
    pub model_url: Option<String>,
    pub ar_enabled: bool,
    pub scale: f64,
    pub rotation: Vec<f64>,
}

/// Request body for `POST /api/products`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[garde(length(min = 1, max = 200))]
    pub name: String,

    #[garde(range(min = 0.0))]
    pub price: f64,

    #[garde(length(min = 1, max = 100))]
    pub category: String,

    #[garde(length(min = 1, max = 100))]
    pub material: String,

    #[garde(range(min = 0))]
    pub stock: i32,
}
