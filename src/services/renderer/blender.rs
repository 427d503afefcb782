use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use super::{Artifact, ArtifactKind, ModelRenderer, RenderContext, RenderError};
use crate::models::job::Operation;

/// Marker line the driver script prints as its last stdout line, followed by
/// a JSON manifest of produced files.
const RESULT_MARKER: &str = "RESULT_JSON ";

/// How much captured stderr to keep in error messages.
const MAX_ERROR_DETAIL: usize = 2048;

/// External rendering backend: drives headless Blender through the bundled
/// Python script, one invocation per operation.
///
/// Invocation shape:
/// `blender -b --factory-startup -noaudio -P <script> -- --input <model>
///  --output-dir <dir> --operation <name>`
pub struct BlenderRenderer {
    executable: PathBuf,
    script: PathBuf,
}

/// Manifest printed by the driver script.
#[derive(Debug, Deserialize)]
struct ResultManifest {
    artifacts: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    /// File path relative to the operation output dir.
    file: String,
    kind: ManifestKind,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum ManifestKind {
    Model,
    Image,
    Metadata,
}

impl From<ManifestKind> for ArtifactKind {
    fn from(kind: ManifestKind) -> Self {
        match kind {
            ManifestKind::Model => ArtifactKind::Model,
            ManifestKind::Image => ArtifactKind::Image,
            ManifestKind::Metadata => ArtifactKind::Metadata,
        }
    }
}

impl BlenderRenderer {
    pub fn new(executable: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            script: script.into(),
        }
    }

    fn parse_manifest(stdout: &str, ctx: &RenderContext) -> Result<Vec<Artifact>, RenderError> {
        let line = stdout
            .lines()
            .rev()
            .find(|l| l.starts_with(RESULT_MARKER))
            .ok_or(RenderError::MissingManifest)?;

        let manifest: ResultManifest = serde_json::from_str(&line[RESULT_MARKER.len()..])?;
        Ok(manifest
            .artifacts
            .into_iter()
            .map(|entry| Artifact::new(entry.kind.into(), ctx.output_dir.join(entry.file)))
            .collect())
    }
}

#[async_trait]
impl ModelRenderer for BlenderRenderer {
    fn name(&self) -> &'static str {
        "blender"
    }

    async fn run(
        &self,
        operation: Operation,
        ctx: &RenderContext,
    ) -> Result<Vec<Artifact>, RenderError> {
        tracing::debug!(
            job_id = %ctx.job_id,
            operation = %operation,
            executable = %self.executable.display(),
            "spawning headless blender"
        );

        let mut cmd = Command::new(&self.executable);
        cmd.arg("-b")
            .arg("--factory-startup")
            .arg("-noaudio")
            .arg("-P")
            .arg(&self.script)
            .arg("--")
            .arg("--input")
            .arg(&ctx.input_path)
            .arg("--output-dir")
            .arg(&ctx.output_dir)
            .arg("--operation")
            .arg(operation.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The runner enforces the operation timeout by dropping this
            // future; kill_on_drop reaps the child when that happens.
            .kill_on_drop(true);

        let output = cmd.output().await.map_err(RenderError::Spawn)?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            let mut detail = String::from_utf8_lossy(&output.stderr).into_owned();
            if detail.trim().is_empty() {
                // Blender frequently reports script errors on stdout.
                detail = stdout.into_owned();
            }
            if detail.len() > MAX_ERROR_DETAIL {
                let mut cut = MAX_ERROR_DETAIL;
                while !detail.is_char_boundary(cut) {
                    cut -= 1;
                }
                detail.truncate(cut);
            }
            return Err(RenderError::ToolFailed {
                code: output.status.code().unwrap_or(-1),
                detail,
            });
        }

        Self::parse_manifest(&stdout, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ctx(dir: &std::path::Path) -> RenderContext {
        RenderContext {
            job_id: Uuid::new_v4(),
            input_path: dir.join("model.glb"),
            output_dir: dir.to_path_buf(),
        }
    }

    #[test]
    fn manifest_line_is_parsed_from_noisy_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let stdout = concat!(
            "Blender 4.2.0 (hash abc123)\n",
            "Read blend: ...\n",
            "RESULT_JSON {\"artifacts\": [{\"file\": \"optimized.glb\", \"kind\": \"model\"}, {\"file\": \"turntable_000.png\", \"kind\": \"image\"}]}\n",
            "Blender quit\n",
        );
        // The marker line is not the last line; the parser scans from the end.
        let artifacts = BlenderRenderer::parse_manifest(stdout, &ctx(dir.path())).unwrap();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].kind, ArtifactKind::Model);
        assert_eq!(artifacts[0].content_type, "model/gltf-binary");
        assert!(artifacts[1].path.ends_with("turntable_000.png"));
    }

    #[test]
    fn missing_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = BlenderRenderer::parse_manifest("Blender quit\n", &ctx(dir.path())).unwrap_err();
        assert!(matches!(err, RenderError::MissingManifest));
    }

    #[test]
    fn malformed_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            BlenderRenderer::parse_manifest("RESULT_JSON {not json}\n", &ctx(dir.path())).unwrap_err();
        assert!(matches!(err, RenderError::Manifest(_)));
    }
}
