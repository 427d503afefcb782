use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string for job queue
    pub redis_url: String,

    /// Object storage bucket name (S3-compatible)
    pub storage_bucket: String,

    /// Object storage endpoint URL
    pub storage_endpoint: String,

    /// Object storage access key ID
    pub storage_access_key: String,

    /// Object storage secret access key
    pub storage_secret_key: String,

    /// Public base URL under which uploaded objects are served,
    /// e.g. "https://assets.example.com"
    pub storage_public_base_url: String,

    /// Use the external Blender backend instead of the embedded renderer
    #[serde(default)]
    pub blender_enabled: bool,

    /// Path to the Blender executable (used when blender_enabled = true)
    #[serde(default = "default_blender_path")]
    pub blender_path: String,

    /// Blender-side driver script
    #[serde(default = "default_blender_script")]
    pub blender_script: String,

    /// Per-operation timeout in seconds
    #[serde(default = "default_render_timeout_secs")]
    pub render_timeout_secs: u64,

    /// Shared admin token for mutating endpoints. Unset = no gate (dev only).
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Prometheus scrape address for worker processes (e.g. "0.0.0.0:9001").
    /// Unset = worker exports no metrics.
    #[serde(default)]
    pub worker_metrics_addr: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_blender_path() -> String {
    "blender".to_string()
}

fn default_blender_script() -> String {
    "scripts/render_pipeline.py".to_string()
}

fn default_render_timeout_secs() -> u64 {
    300
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
