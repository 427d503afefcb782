use std::path::Path;

use async_trait::async_trait;

use super::{glb, mesh::TriMesh, raster, Artifact, ArtifactKind, ModelRenderer, RenderContext, RenderError};
use crate::models::job::Operation;
use crate::services::renderer::raster::FrameOptions;

/// In-process rendering backend. No external tools: parses OBJ/STL meshes,
/// decimates by vertex clustering, rasterizes frames in software and writes
/// GLB directly. Used when Blender is not available on the host.
pub struct EmbeddedRenderer {
    /// Triangle budget for `optimize`.
    pub target_triangles: usize,
    /// Number of evenly spaced turntable angles for `render_360`.
    pub turntable_angles: u32,
    /// Edge length of turntable frames, pixels.
    pub frame_size: u32,
    /// Edge length of the thumbnail, pixels.
    pub thumbnail_size: u32,
}

impl Default for EmbeddedRenderer {
    fn default() -> Self {
        Self {
            target_triangles: 10_000,
            turntable_angles: 8,
            frame_size: 1024,
            thumbnail_size: 800,
        }
    }
}

#[async_trait]
impl ModelRenderer for EmbeddedRenderer {
    fn name(&self) -> &'static str {
        "embedded"
    }

    async fn run(
        &self,
        operation: Operation,
        ctx: &RenderContext,
    ) -> Result<Vec<Artifact>, RenderError> {
        let input = ctx.input_path.clone();
        let output_dir = ctx.output_dir.clone();
        let target_triangles = self.target_triangles;
        let turntable_angles = self.turntable_angles;
        let frame_size = self.frame_size;
        let thumbnail_size = self.thumbnail_size;

        // Mesh work is CPU-bound; keep it off the async executor.
        tokio::task::spawn_blocking(move || {
            let mesh = TriMesh::load(&input)?;
            match operation {
                Operation::Optimize => optimize(&mesh, &output_dir, target_triangles),
                Operation::Render360 => {
                    render_360(&mesh, &output_dir, turntable_angles, frame_size)
                }
                Operation::GenerateThumbnail => thumbnail(&mesh, &output_dir, thumbnail_size),
                Operation::ExtractDimensions => extract_dimensions(&mesh, &output_dir),
            }
        })
        .await
        .map_err(|_| RenderError::TaskAborted)?
    }
}

fn optimize(
    mesh: &TriMesh,
    output_dir: &Path,
    target_triangles: usize,
) -> Result<Vec<Artifact>, RenderError> {
    let slim = mesh.decimate(target_triangles);
    let path = output_dir.join("optimized.glb");
    glb::write_glb(&slim, &path)?;

    tracing::debug!(
        original_triangles = mesh.triangle_count(),
        optimized_triangles = slim.triangle_count(),
        "optimize complete"
    );

    Ok(vec![Artifact::new(ArtifactKind::Model, path)])
}

fn render_360(
    mesh: &TriMesh,
    output_dir: &Path,
    angles: u32,
    size: u32,
) -> Result<Vec<Artifact>, RenderError> {
    let mut artifacts = Vec::with_capacity(angles as usize);
    for i in 0..angles {
        let yaw = i as f32 * 360.0 / angles as f32;
        let frame = raster::render_frame(
            mesh,
            &FrameOptions {
                width: size,
                height: size,
                yaw_deg: yaw,
                pitch_deg: 15.0,
            },
        );
        let path = output_dir.join(format!("turntable_{:03}.png", yaw as u32));
        frame.save(&path)?;
        artifacts.push(Artifact::new(ArtifactKind::Image, path));
    }
    Ok(artifacts)
}

fn thumbnail(mesh: &TriMesh, output_dir: &Path, size: u32) -> Result<Vec<Artifact>, RenderError> {
    // Raised three-quarter view, the standard hero angle.
    let frame = raster::render_frame(
        mesh,
        &FrameOptions {
            width: size,
            height: size,
            yaw_deg: 45.0,
            pitch_deg: 30.0,
        },
    );
    let path = output_dir.join("thumbnail.png");
    frame.save(&path)?;
    Ok(vec![Artifact::new(ArtifactKind::Image, path)])
}

fn extract_dimensions(mesh: &TriMesh, output_dir: &Path) -> Result<Vec<Artifact>, RenderError> {
    let (min, max) = mesh.bounds();
    let extents = mesh.extents();
    let dims = serde_json::json!({
        "width": extents[0],
        "height": extents[1],
        "depth": extents[2],
        "center": mesh.center(),
        "bounds_min": min,
        "bounds_max": max,
        "surface_area": mesh.surface_area(),
        "triangles": mesh.triangle_count(),
        "vertices": mesh.vertex_count(),
    });

    let path = output_dir.join("dimensions.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&dims)?)?;
    Ok(vec![Artifact::new(ArtifactKind::Metadata, path)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::renderer::mesh::cube_obj;
    use uuid::Uuid;

    async fn run_op(op: Operation) -> (tempfile::TempDir, Vec<Artifact>) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("model.obj");
        std::fs::write(&input, cube_obj()).unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();

        let ctx = RenderContext {
            job_id: Uuid::new_v4(),
            input_path: input,
            output_dir: out,
        };
        let renderer = EmbeddedRenderer {
            frame_size: 64,
            thumbnail_size: 64,
            ..EmbeddedRenderer::default()
        };
        let artifacts = renderer.run(op, &ctx).await.unwrap();
        (dir, artifacts)
    }

    #[tokio::test]
    async fn optimize_produces_single_glb() {
        let (_dir, artifacts) = run_op(Operation::Optimize).await;
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].kind, ArtifactKind::Model);
        assert_eq!(artifacts[0].content_type, "model/gltf-binary");

        let bytes = std::fs::read(&artifacts[0].path).unwrap();
        assert_eq!(&bytes[0..4], b"glTF");
    }

    #[tokio::test]
    async fn render_360_produces_eight_frames() {
        let (_dir, artifacts) = run_op(Operation::Render360).await;
        assert_eq!(artifacts.len(), 8);
        for a in &artifacts {
            assert_eq!(a.kind, ArtifactKind::Image);
            assert!(a.path.exists());
        }
        // Evenly spaced angles appear in the file names.
        assert!(artifacts[0].file_name().contains("000"));
        assert!(artifacts[2].file_name().contains("090"));
    }

    #[tokio::test]
    async fn thumbnail_produces_one_png() {
        let (_dir, artifacts) = run_op(Operation::GenerateThumbnail).await;
        assert_eq!(artifacts.len(), 1);
        let img = image::open(&artifacts[0].path).unwrap().to_rgba8();
        assert_eq!(img.width(), 64);
    }

    #[tokio::test]
    async fn dimensions_report_cube_extents() {
        let (_dir, artifacts) = run_op(Operation::ExtractDimensions).await;
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].kind, ArtifactKind::Metadata);

        let dims: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&artifacts[0].path).unwrap()).unwrap();
        assert_eq!(dims["width"], 1.0);
        assert_eq!(dims["triangles"], 12);
    }

    #[tokio::test]
    async fn unsupported_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("model.fbx");
        std::fs::write(&input, b"not a mesh").unwrap();

        let ctx = RenderContext {
            job_id: Uuid::new_v4(),
            input_path: input,
            output_dir: dir.path().to_path_buf(),
        };
        let err = EmbeddedRenderer::default()
            .run(Operation::Optimize, &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Blender"));
    }
}
