//! Rendering backends for 3D model processing jobs.
//!
//! Two interchangeable implementations of [`ModelRenderer`]: an external
//! headless Blender invocation and an embedded pure-Rust fallback. Which one
//! runs is fixed at process start from configuration; the runner only ever
//! sees the trait.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::job::Operation;

pub mod blender;
pub mod embedded;
pub mod glb;
pub mod mesh;
pub mod raster;

pub use blender::BlenderRenderer;
pub use embedded::EmbeddedRenderer;

/// What a produced file is, independent of which backend made it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// An AR-ready model (GLB).
    Model,
    /// A rendered frame.
    Image,
    /// Structured data about the model (dimensions, stats).
    Metadata,
}

/// One output file of an operation, on local disk until the runner uploads it.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub content_type: &'static str,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, path: PathBuf) -> Self {
        let content_type = content_type_for(&path);
        Self {
            kind,
            path,
            content_type,
        }
    }

    /// File name portion, used to build the storage key.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string())
    }
}

/// Everything an operation invocation needs to know.
#[derive(Debug)]
pub struct RenderContext {
    pub job_id: Uuid,
    /// Downloaded source model inside the job workspace.
    pub input_path: PathBuf,
    /// Scratch directory for this operation's outputs; lives inside the job
    /// workspace and is removed with it.
    pub output_dir: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{0}")]
    Mesh(#[from] mesh::MeshError),

    #[error("failed to spawn renderer process: {0}")]
    Spawn(std::io::Error),

    #[error("renderer exited with code {code}: {detail}")]
    ToolFailed { code: i32, detail: String },

    #[error("renderer finished without a result manifest")]
    MissingManifest,

    #[error("invalid result manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image encode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("render task aborted")]
    TaskAborted,
}

/// A rendering backend: executes one named operation against a source model
/// and returns the artifacts it produced.
///
/// Both implementations must produce compatible output shapes for the same
/// operation: `optimize` yields exactly one Model artifact, `render_360` a
/// list of Image artifacts, `generate_thumbnail` one Image,
/// `extract_dimensions` one Metadata JSON.
#[async_trait]
pub trait ModelRenderer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(
        &self,
        operation: Operation,
        ctx: &RenderContext,
    ) -> Result<Vec<Artifact>, RenderError>;
}

/// Select the backend once, at process start.
pub fn from_config(config: &AppConfig) -> Arc<dyn ModelRenderer> {
    if config.blender_enabled {
        Arc::new(BlenderRenderer::new(
            &config.blender_path,
            &config.blender_script,
        ))
    } else {
        Arc::new(EmbeddedRenderer::default())
    }
}

pub(crate) fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
        .as_str()
    {
        "glb" => "model/gltf-binary",
        "gltf" => "model/gltf+json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}
