//! Test helper utilities for driving the HTTP API end to end.

use reqwest::multipart;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

/// Response from POST /render/upload-model
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub model_url: String,
    pub original_url: String,
    pub format: String,
}

/// Response from POST /render/process
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub job_id: Uuid,
    pub status: String,
    pub operations: Vec<String>,
}

/// Response from GET /render/job/{job_id}
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: String,
    pub progress: i32,
    pub results: serde_json::Value,
    pub error: Option<String>,
}

/// Response from GET /render/ar-config/{product_id}
#[derive(Debug, Serialize, Deserialize)]
pub struct ArConfigResponse {
    pub model_url: Option<String>,
    pub ar_enabled: bool,
    pub scale: f64,
    pub rotation: Vec<f64>,
}

pub fn base_url() -> String {
    std::env::var("E2E_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string())
}

pub fn admin_headers(builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match std::env::var("ADMIN_TOKEN") {
        Ok(token) => builder.header("x-admin-token", token),
        Err(_) => builder,
    }
}

/// Create a product to hang uploads off.
pub async fn create_product(
    client: &reqwest::Client,
    base_url: &str,
) -> Result<Uuid, Box<dyn std::error::Error>> {
    let response = admin_headers(client.post(format!("{base_url}/api/products")))
        .json(&serde_json::json!({
            "name": "Test Gold Bangle",
            "price": 129.0,
            "category": "bangles",
            "material": "gold",
            "stock": 3,
        }))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("product create failed with status {status}").into());
    }

    let body: serde_json::Value = response.json().await?;
    Ok(Uuid::parse_str(body["id"].as_str().ok_or("missing product id")?)?)
}

/// Upload model bytes for a product.
pub async fn upload_model(
    client: &reqwest::Client,
    base_url: &str,
    product_id: Uuid,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<reqwest::Response, Box<dyn std::error::Error>> {
    let form = multipart::Form::new()
        .text("product_id", product_id.to_string())
        .part(
            "file",
            multipart::Part::bytes(bytes).file_name(file_name.to_string()),
        );

    Ok(
        admin_headers(client.post(format!("{base_url}/render/upload-model")))
            .multipart(form)
            .send()
            .await?,
    )
}

/// Submit a processing job.
pub async fn submit_job(
    client: &reqwest::Client,
    base_url: &str,
    product_id: Uuid,
    operations: &[&str],
) -> Result<reqwest::Response, Box<dyn std::error::Error>> {
    Ok(admin_headers(client.post(format!("{base_url}/render/process")))
        .json(&serde_json::json!({
            "product_id": product_id,
            "operations": operations,
        }))
        .send()
        .await?)
}

/// Poll job status until terminal (with timeout). Also asserts the progress
/// monotonicity invariant along the way.
pub async fn poll_until_terminal(
    client: &reqwest::Client,
    base_url: &str,
    job_id: Uuid,
    timeout_secs: u64,
) -> Result<JobStatusResponse, Box<dyn std::error::Error>> {
    let max_attempts = timeout_secs * 2; // poll every 500ms
    let mut last_progress = -1;

    for _ in 0..max_attempts {
        let response = client
            .get(format!("{base_url}/render/job/{job_id}"))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(format!("status check failed: {}", response.status()).into());
        }

        let status: JobStatusResponse = response.json().await?;
        assert!(
            status.progress >= last_progress,
            "progress went backwards: {} -> {}",
            last_progress,
            status.progress
        );
        last_progress = status.progress;

        match status.status.as_str() {
            "completed" | "failed" => return Ok(status),
            "queued" | "processing" => sleep(Duration::from_millis(500)).await,
            other => return Err(format!("unknown job status: {other}").into()),
        }
    }

    Err(format!("job did not reach a terminal state within {timeout_secs}s").into())
}

/// A small OBJ pyramid, enough geometry for every operation.
pub fn sample_obj() -> Vec<u8> {
    b"v 0 0 0\nv 1 0 0\nv 1 0 1\nv 0 0 1\nv 0.5 1 0.5\n\
      f 1 4 3 2\nf 1 2 5\nf 2 3 5\nf 3 4 5\nf 4 1 5\n"
        .to_vec()
}
