use std::collections::HashMap;
use std::path::Path;

/// Indexed triangle mesh. The embedded backend's working representation for
/// every operation: decimation, rasterization, GLB export, dimension
/// extraction.
#[derive(Debug, Clone)]
pub struct TriMesh {
    pub positions: Vec<[f32; 3]>,
    pub triangles: Vec<[u32; 3]>,
}

#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("failed to read model file: {0}")]
    Io(#[from] std::io::Error),

    #[error("model parse error: {0}")]
    Parse(String),

    #[error("format not supported by the embedded renderer: {0} (requires the Blender backend)")]
    UnsupportedFormat(String),

    #[error("model contains no triangles")]
    Empty,
}

impl TriMesh {
    /// Load a mesh from disk, dispatching on the file extension.
    ///
    /// The embedded backend reads OBJ and STL natively; richer formats
    /// (fbx, blend, gltf, glb) need the Blender backend.
    pub fn load(path: &Path) -> Result<Self, MeshError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let mesh = match ext.as_str() {
            "obj" => Self::from_obj(&std::fs::read_to_string(path)?)?,
            "stl" => Self::from_stl(&std::fs::read(path)?)?,
            other => return Err(MeshError::UnsupportedFormat(other.to_string())),
        };

        if mesh.triangles.is_empty() {
            return Err(MeshError::Empty);
        }
        Ok(mesh)
    }

    /// Parse Wavefront OBJ text. Supports `v` and `f` records; faces with
    /// more than three vertices are fan-triangulated, `v/vt/vn` index forms
    /// and negative (relative) indices are handled.
    pub fn from_obj(text: &str) -> Result<Self, MeshError> {
        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut triangles: Vec<[u32; 3]> = Vec::new();

        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            let mut parts = line.split_whitespace();
            match parts.next() {
                Some("v") => {
                    let mut coord = [0.0f32; 3];
                    for c in coord.iter_mut() {
                        *c = parts
                            .next()
                            .and_then(|t| t.parse().ok())
                            .ok_or_else(|| {
                                MeshError::Parse(format!("bad vertex on line {}", line_no + 1))
                            })?;
                    }
                    positions.push(coord);
                }
                Some("f") => {
                    let indices: Vec<u32> = parts
                        .map(|token| parse_obj_index(token, positions.len(), line_no))
                        .collect::<Result<_, _>>()?;
                    if indices.len() < 3 {
                        return Err(MeshError::Parse(format!(
                            "face with fewer than 3 vertices on line {}",
                            line_no + 1
                        )));
                    }
                    for i in 1..indices.len() - 1 {
                        triangles.push([indices[0], indices[i], indices[i + 1]]);
                    }
                }
                _ => {}
            }
        }

        Ok(Self {
            positions,
            triangles,
        })
    }

    /// Parse STL, auto-detecting ASCII vs binary.
    pub fn from_stl(bytes: &[u8]) -> Result<Self, MeshError> {
        // ASCII files start with "solid" AND contain facet records; binary
        // exporters sometimes write "solid" into the 80-byte header too.
        let looks_ascii = bytes.starts_with(b"solid")
            && std::str::from_utf8(bytes)
                .map(|s| s.contains("facet"))
                .unwrap_or(false);

        if looks_ascii {
            Self::from_stl_ascii(std::str::from_utf8(bytes).map_err(|_| {
                MeshError::Parse("ASCII STL is not valid UTF-8".to_string())
            })?)
        } else {
            Self::from_stl_binary(bytes)
        }
    }

    fn from_stl_binary(bytes: &[u8]) -> Result<Self, MeshError> {
        if bytes.len() < 84 {
            return Err(MeshError::Parse("binary STL shorter than header".to_string()));
        }
        let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
        let expected = 84 + count * 50;
        if bytes.len() < expected {
            return Err(MeshError::Parse(format!(
                "binary STL truncated: {} triangles declared, {} bytes present",
                count,
                bytes.len()
            )));
        }

        let mut builder = IndexedBuilder::default();
        for t in 0..count {
            let base = 84 + t * 50 + 12; // skip the facet normal
            let mut tri = [0u32; 3];
            for (v, slot) in tri.iter_mut().enumerate() {
                let off = base + v * 12;
                let p = [
                    f32::from_le_bytes(bytes[off..off + 4].try_into().unwrap()),
                    f32::from_le_bytes(bytes[off + 4..off + 8].try_into().unwrap()),
                    f32::from_le_bytes(bytes[off + 8..off + 12].try_into().unwrap()),
                ];
                *slot = builder.index_of(p);
            }
            builder.push_triangle(tri);
        }
        Ok(builder.finish())
    }

    fn from_stl_ascii(text: &str) -> Result<Self, MeshError> {
        let mut builder = IndexedBuilder::default();
        let mut pending: Vec<u32> = Vec::with_capacity(3);

        for (line_no, line) in text.lines().enumerate() {
            let mut parts = line.split_whitespace();
            if parts.next() != Some("vertex") {
                continue;
            }
            let mut p = [0.0f32; 3];
            for c in p.iter_mut() {
                *c = parts
                    .next()
                    .and_then(|t| t.parse().ok())
                    .ok_or_else(|| {
                        MeshError::Parse(format!("bad STL vertex on line {}", line_no + 1))
                    })?;
            }
            pending.push(builder.index_of(p));
            if pending.len() == 3 {
                builder.push_triangle([pending[0], pending[1], pending[2]]);
                pending.clear();
            }
        }
        Ok(builder.finish())
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Axis-aligned bounding box as (min, max).
    pub fn bounds(&self) -> ([f32; 3], [f32; 3]) {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for p in &self.positions {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        (min, max)
    }

    /// Per-axis size of the bounding box.
    pub fn extents(&self) -> [f32; 3] {
        let (min, max) = self.bounds();
        [max[0] - min[0], max[1] - min[1], max[2] - min[2]]
    }

    /// Center of the bounding box.
    pub fn center(&self) -> [f32; 3] {
        let (min, max) = self.bounds();
        [
            (min[0] + max[0]) / 2.0,
            (min[1] + max[1]) / 2.0,
            (min[2] + max[2]) / 2.0,
        ]
    }

    /// Bounding-box diagonal. Drives the camera orbit radius.
    pub fn diagonal(&self) -> f32 {
        let e = self.extents();
        (e[0] * e[0] + e[1] * e[1] + e[2] * e[2]).sqrt()
    }

    pub fn surface_area(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| {
                let a = self.positions[t[0] as usize];
                let b = self.positions[t[1] as usize];
                let c = self.positions[t[2] as usize];
                let ab = sub(b, a);
                let ac = sub(c, a);
                let cr = cross(ab, ac);
                (length(cr) / 2.0) as f64
            })
            .sum()
    }

    /// Reduce the triangle count to at most `target_triangles` by uniform-grid
    /// vertex clustering, coarsening the grid until the budget is met.
    ///
    /// Degenerate triangles (two corners collapsed into one cluster) are
    /// dropped, which is where the reduction comes from.
    pub fn decimate(&self, target_triangles: usize) -> TriMesh {
        if self.triangles.len() <= target_triangles {
            return self.clone();
        }

        // Initial grid: roughly two triangles per occupied cell on a surface.
        let mut resolution = ((target_triangles as f32 / 2.0).sqrt().ceil() as u32).clamp(2, 512);

        loop {
            let clustered = self.cluster_to_grid(resolution);
            if clustered.triangles.len() <= target_triangles || resolution <= 2 {
                return clustered;
            }
            resolution = (resolution * 3 / 4).max(2);
        }
    }

    fn cluster_to_grid(&self, resolution: u32) -> TriMesh {
        let (min, _) = self.bounds();
        let max_extent = self
            .extents()
            .iter()
            .fold(f32::MIN, |acc, &e| acc.max(e))
            .max(f32::EPSILON);
        let cell = max_extent / resolution as f32;

        // cell coordinate -> cluster index; clusters accumulate a mean position
        let mut cells: HashMap<[i32; 3], u32> = HashMap::new();
        let mut sums: Vec<([f64; 3], u32)> = Vec::new();
        let mut remap: Vec<u32> = Vec::with_capacity(self.positions.len());

        for p in &self.positions {
            let key = [
                ((p[0] - min[0]) / cell).floor() as i32,
                ((p[1] - min[1]) / cell).floor() as i32,
                ((p[2] - min[2]) / cell).floor() as i32,
            ];
            let idx = *cells.entry(key).or_insert_with(|| {
                sums.push(([0.0; 3], 0));
                (sums.len() - 1) as u32
            });
            let (sum, n) = &mut sums[idx as usize];
            for axis in 0..3 {
                sum[axis] += p[axis] as f64;
            }
            *n += 1;
            remap.push(idx);
        }

        let positions = sums
            .iter()
            .map(|(sum, n)| {
                let n = *n as f64;
                [
                    (sum[0] / n) as f32,
                    (sum[1] / n) as f32,
                    (sum[2] / n) as f32,
                ]
            })
            .collect();

        let triangles = self
            .triangles
            .iter()
            .map(|t| {
                [
                    remap[t[0] as usize],
                    remap[t[1] as usize],
                    remap[t[2] as usize],
                ]
            })
            .filter(|t| t[0] != t[1] && t[1] != t[2] && t[0] != t[2])
            .collect();

        TriMesh {
            positions,
            triangles,
        }
    }
}

fn parse_obj_index(token: &str, vertex_count: usize, line_no: usize) -> Result<u32, MeshError> {
    // "v", "v/vt", "v//vn", "v/vt/vn" — only the position index matters here.
    let first = token.split('/').next().unwrap_or_default();
    let raw: i64 = first
        .parse()
        .map_err(|_| MeshError::Parse(format!("bad face index on line {}", line_no + 1)))?;

    let resolved = if raw < 0 {
        vertex_count as i64 + raw
    } else {
        raw - 1
    };

    if resolved < 0 || resolved >= vertex_count as i64 {
        return Err(MeshError::Parse(format!(
            "face index out of range on line {}",
            line_no + 1
        )));
    }
    Ok(resolved as u32)
}

/// Builds an indexed mesh from triangle soup, deduplicating exact-duplicate
/// vertices by bit pattern.
#[derive(Default)]
struct IndexedBuilder {
    positions: Vec<[f32; 3]>,
    triangles: Vec<[u32; 3]>,
    seen: HashMap<[u32; 3], u32>,
}

impl IndexedBuilder {
    fn index_of(&mut self, p: [f32; 3]) -> u32 {
        let key = [p[0].to_bits(), p[1].to_bits(), p[2].to_bits()];
        *self.seen.entry(key).or_insert_with(|| {
            self.positions.push(p);
            (self.positions.len() - 1) as u32
        })
    }

    fn push_triangle(&mut self, tri: [u32; 3]) {
        self.triangles.push(tri);
    }

    fn finish(self) -> TriMesh {
        TriMesh {
            positions: self.positions,
            triangles: self.triangles,
        }
    }
}

pub(crate) fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub(crate) fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub(crate) fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub(crate) fn length(a: [f32; 3]) -> f32 {
    dot(a, a).sqrt()
}

pub(crate) fn normalize(a: [f32; 3]) -> [f32; 3] {
    let len = length(a).max(f32::EPSILON);
    [a[0] / len, a[1] / len, a[2] / len]
}

/// Unit cube as OBJ text: 8 vertices, 6 quad faces. Shared fixture for the
/// renderer test modules.
#[cfg(test)]
pub(crate) fn cube_obj() -> String {
    let mut obj = String::new();
    for z in [0.0, 1.0] {
        for y in [0.0, 1.0] {
            for x in [0.0, 1.0] {
                obj.push_str(&format!("v {x} {y} {z}\n"));
            }
        }
    }
    // Quads, 1-based indices; fan triangulation yields 12 triangles.
    for quad in [
        [1, 2, 4, 3],
        [5, 7, 8, 6],
        [1, 5, 6, 2],
        [3, 4, 8, 7],
        [1, 3, 7, 5],
        [2, 6, 8, 4],
    ] {
        obj.push_str(&format!("f {} {} {} {}\n", quad[0], quad[1], quad[2], quad[3]));
    }
    obj
}
