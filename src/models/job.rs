use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Status of a render job in the async queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// A processing operation requested on an uploaded 3D model.
///
/// Names are the wire format used in `POST /render/process` and as keys in
/// the job `results` map.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Polygon reduction + compression into a single AR-ready GLB.
    Optimize,
    /// Camera orbit renders at evenly spaced angles.
    #[strum(serialize = "render_360")]
    #[serde(rename = "render_360")]
    Render360,
    /// Single hero image.
    GenerateThumbnail,
    /// Bounding-box metadata written as a JSON artifact.
    ExtractDimensions,
}

/// A 3D model render job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderJob {
    pub id: Uuid,
    pub product_id: Uuid,
    pub status: JobStatus,
    /// Requested operations, in execution order.
    pub operations: Vec<String>,
    /// 0-100. Monotonically non-decreasing while processing.
    pub progress: i32,
    /// Operation name -> output URL (or list of URLs). Only operations that
    /// completed successfully have an entry.
    pub results: serde_json::Value,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// File formats accepted by the upload endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ModelFormat {
    Obj,
    Fbx,
    Gltf,
    Glb,
    Blend,
    Stl,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn operation_names_round_trip() {
        for (name, op) in [
            ("optimize", Operation::Optimize),
            ("render_360", Operation::Render360),
            ("generate_thumbnail", Operation::GenerateThumbnail),
            ("extract_dimensions", Operation::ExtractDimensions),
        ] {
            assert_eq!(Operation::from_str(name).unwrap(), op);
            assert_eq!(op.to_string(), name);
        }
    }

    #[test]
    fn unknown_operation_rejected() {
        assert!(Operation::from_str("nonexistent_op").is_err());
    }

    #[test]
    fn model_format_parses_case_insensitive_extension() {
        assert_eq!(ModelFormat::from_str("glb").unwrap(), ModelFormat::Glb);
        assert_eq!(ModelFormat::from_str("GLB").unwrap(), ModelFormat::Glb);
        assert!(ModelFormat::from_str("docx").is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }
}
