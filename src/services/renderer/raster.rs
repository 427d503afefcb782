use image::{Rgba, RgbaImage};

use super::mesh::{cross, dot, normalize, sub, TriMesh};

/// Base color approximating polished gold, shared by all embedded renders so
/// catalog imagery stays uniform.
const BASE_COLOR: [f32; 3] = [0.85, 0.68, 0.24];

const FOV_DEG: f32 = 40.0;
const AMBIENT: f32 = 0.25;

/// Camera parameters for a single frame. The camera orbits the mesh center
/// at a radius of twice the bounding-box diagonal, matching the framing the
/// Blender backend uses.
#[derive(Debug, Clone, Copy)]
pub struct FrameOptions {
    pub width: u32,
    pub height: u32,
    /// Orbit angle around the vertical (Y) axis, degrees.
    pub yaw_deg: f32,
    /// Elevation above the horizon, degrees.
    pub pitch_deg: f32,
}

/// Render one frame of the mesh with a z-buffered software rasterizer:
/// perspective projection, flat Lambertian shading, transparent background.
pub fn render_frame(mesh: &TriMesh, opts: &FrameOptions) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(opts.width, opts.height, Rgba([0, 0, 0, 0]));
    let mut depth = vec![0.0f32; (opts.width * opts.height) as usize];

    let center = mesh.center();
    let radius = (mesh.diagonal() * 2.0).max(1e-4);
    let near = radius * 0.01;

    let yaw = opts.yaw_deg.to_radians();
    let pitch = opts.pitch_deg.to_radians();
    let eye = [
        center[0] + radius * pitch.cos() * yaw.sin(),
        center[1] + radius * pitch.sin(),
        center[2] + radius * pitch.cos() * yaw.cos(),
    ];

    // Orthonormal camera basis; fall back when looking straight down the Y axis.
    let forward = normalize(sub(center, eye));
    let mut right = cross(forward, [0.0, 1.0, 0.0]);
    if dot(right, right) < 1e-8 {
        right = cross(forward, [0.0, 0.0, 1.0]);
    }
    let right = normalize(right);
    let up = cross(right, forward);

    let focal = 1.0 / (FOV_DEG.to_radians() / 2.0).tan();
    let aspect = opts.width as f32 / opts.height as f32;

    // Fixed world-space lights (key + fill), so shading tracks geometry
    // rather than the camera.
    let key_light = normalize([1.0, 1.0, 1.0]);
    let fill_light = normalize([-1.0, 0.4, -0.6]);

    // Project every vertex once: screen x/y plus 1/z for the depth test.
    let projected: Vec<Option<[f32; 3]>> = mesh
        .positions
        .iter()
        .map(|p| {
            let v = sub(*p, eye);
            let z = dot(v, forward);
            if z <= near {
                return None;
            }
            let ndc_x = focal * dot(v, right) / z / aspect;
            let ndc_y = focal * dot(v, up) / z;
            Some([
                (ndc_x * 0.5 + 0.5) * opts.width as f32,
                (1.0 - (ndc_y * 0.5 + 0.5)) * opts.height as f32,
                1.0 / z,
            ])
        })
        .collect();

    for tri in &mesh.triangles {
        let (Some(a), Some(b), Some(c)) = (
            projected[tri[0] as usize],
            projected[tri[1] as usize],
            projected[tri[2] as usize],
        ) else {
            continue; // triangle crosses the near plane
        };

        // Flat shading off the world-space normal; meshes are treated as
        // double-sided, so take the absolute incidence.
        let pa = mesh.positions[tri[0] as usize];
        let pb = mesh.positions[tri[1] as usize];
        let pc = mesh.positions[tri[2] as usize];
        let n = normalize(cross(sub(pb, pa), sub(pc, pa)));
        let intensity = (AMBIENT
            + 0.55 * dot(n, key_light).abs()
            + 0.25 * dot(n, fill_light).abs())
        .min(1.0);
        let shade = [
            (BASE_COLOR[0] * intensity * 255.0) as u8,
            (BASE_COLOR[1] * intensity * 255.0) as u8,
            (BASE_COLOR[2] * intensity * 255.0) as u8,
        ];

        fill_triangle(&mut img, &mut depth, a, b, c, shade);
    }

    img
}

/// Standard edge-function rasterization with a 1/z depth buffer
/// (larger = closer).
fn fill_triangle(
    img: &mut RgbaImage,
    depth: &mut [f32],
    a: [f32; 3],
    b: [f32; 3],
    c: [f32; 3],
    shade: [u8; 3],
) {
    let width = img.width();
    let height = img.height();

    let area = edge(a, b, c);
    if area.abs() < f32::EPSILON {
        return; // degenerate in screen space
    }

    let min_x = a[0].min(b[0]).min(c[0]).floor().max(0.0) as u32;
    let max_x = (a[0].max(b[0]).max(c[0]).ceil() as i64).clamp(0, width as i64 - 1) as u32;
    let min_y = a[1].min(b[1]).min(c[1]).floor().max(0.0) as u32;
    let max_y = (a[1].max(b[1]).max(c[1]).ceil() as i64).clamp(0, height as i64 - 1) as u32;
    if min_x > max_x || min_y > max_y {
        return;
    }

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let p = [x as f32 + 0.5, y as f32 + 0.5, 0.0];
            let w0 = edge(b, c, p) / area;
            let w1 = edge(c, a, p) / area;
            let w2 = edge(a, b, p) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            let inv_z = w0 * a[2] + w1 * b[2] + w2 * c[2];
            let idx = (y * width + x) as usize;
            if inv_z > depth[idx] {
                depth[idx] = inv_z;
                img.put_pixel(x, y, Rgba([shade[0], shade[1], shade[2], 255]));
            }
        }
    }
}

fn edge(a: [f32; 3], b: [f32; 3], p: [f32; 3]) -> f32 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::renderer::mesh::cube_obj;

    fn opts(yaw: f32) -> FrameOptions {
        FrameOptions {
            width: 128,
            height: 128,
            yaw_deg: yaw,
            pitch_deg: 20.0,
        }
    }

    #[test]
    fn cube_renders_with_transparent_background() {
        let mesh = TriMesh::from_obj(&cube_obj()).unwrap();
        let img = render_frame(&mesh, &opts(30.0));

        // Corners stay transparent, the center of frame holds the model.
        assert_eq!(img.get_pixel(0, 0).0[3], 0);
        assert_eq!(img.get_pixel(64, 64).0[3], 255);

        let opaque = img.pixels().filter(|p| p.0[3] == 255).count();
        assert!(opaque > 100, "model should cover a visible area");
        assert!(
            opaque < (128 * 128) / 2,
            "model should not flood the frame at orbit distance"
        );
    }

    #[test]
    fn shading_is_gold_tinted() {
        let mesh = TriMesh::from_obj(&cube_obj()).unwrap();
        let img = render_frame(&mesh, &opts(45.0));
        let px = img.get_pixel(64, 64).0;
        assert!(px[0] >= px[1] && px[1] >= px[2], "expected warm tint, got {px:?}");
    }

    #[test]
    fn different_orbit_angles_differ() {
        let mesh = TriMesh::from_obj(&cube_obj()).unwrap();
        let a = render_frame(&mesh, &opts(0.0));
        let b = render_frame(&mesh, &opts(45.0));
        assert_ne!(a.as_raw(), b.as_raw());
    }
}
