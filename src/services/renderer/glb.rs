use std::path::Path;

use super::mesh::TriMesh;

const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
const CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E_4942; // "BIN\0"

const COMPONENT_F32: u32 = 5126;
const COMPONENT_U32: u32 = 5125;
const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;

/// Serialize a mesh as a self-contained binary glTF 2.0 (GLB) container:
/// a JSON chunk describing one scene/node/mesh and a BIN chunk holding
/// positions and u32 indices.
pub fn glb_bytes(mesh: &TriMesh) -> Vec<u8> {
    // ── BIN chunk: positions then indices, 4-byte aligned ─────────────
    let mut bin = Vec::with_capacity(mesh.positions.len() * 12 + mesh.triangles.len() * 12);
    for p in &mesh.positions {
        for c in p {
            bin.extend_from_slice(&c.to_le_bytes());
        }
    }
    let positions_len = bin.len();
    // f32*3 per vertex is always 4-byte aligned; the index view starts here.
    for t in &mesh.triangles {
        for i in t {
            bin.extend_from_slice(&i.to_le_bytes());
        }
    }
    let indices_len = bin.len() - positions_len;
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let (min, max) = mesh.bounds();
    let json = serde_json::json!({
        "asset": { "version": "2.0", "generator": env!("CARGO_PKG_NAME") },
        "scene": 0,
        "scenes": [ { "nodes": [0] } ],
        "nodes": [ { "mesh": 0 } ],
        "meshes": [ {
            "primitives": [ {
                "attributes": { "POSITION": 0 },
                "indices": 1,
                "mode": 4
            } ]
        } ],
        "accessors": [
            {
                "bufferView": 0,
                "componentType": COMPONENT_F32,
                "count": mesh.positions.len(),
                "type": "VEC3",
                "min": min,
                "max": max
            },
            {
                "bufferView": 1,
                "componentType": COMPONENT_U32,
                "count": mesh.triangles.len() * 3,
                "type": "SCALAR"
            }
        ],
        "bufferViews": [
            {
                "buffer": 0,
                "byteOffset": 0,
                "byteLength": positions_len,
                "target": TARGET_ARRAY_BUFFER
            },
            {
                "buffer": 0,
                "byteOffset": positions_len,
                "byteLength": indices_len,
                "target": TARGET_ELEMENT_ARRAY_BUFFER
            }
        ],
        "buffers": [ { "byteLength": bin.len() } ]
    });

    let mut json_bytes = serde_json::to_vec(&json).expect("glTF JSON serialization is infallible");
    while json_bytes.len() % 4 != 0 {
        json_bytes.push(b' '); // glTF requires JSON chunks padded with spaces
    }

    // ── Container: 12-byte header + two (length, type, payload) chunks ─
    let total = 12 + 8 + json_bytes.len() + 8 + bin.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());

    out.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json_bytes);

    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    out.extend_from_slice(&bin);

    out
}

/// Write a mesh to `path` as GLB.
pub fn write_glb(mesh: &TriMesh, path: &Path) -> std::io::Result<()> {
    std::fs::write(path, glb_bytes(mesh))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::renderer::mesh::cube_obj;

    #[test]
    fn glb_container_layout_is_valid() {
        let mesh = TriMesh::from_obj(&cube_obj()).unwrap();
        let bytes = glb_bytes(&mesh);

        // Header
        assert_eq!(&bytes[0..4], b"glTF");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 2);
        let total = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
        assert_eq!(total, bytes.len());

        // JSON chunk
        let json_len = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
        assert_eq!(&bytes[16..20], b"JSON");
        assert_eq!(json_len % 4, 0);

        let json: serde_json::Value = serde_json::from_slice(&bytes[20..20 + json_len]).unwrap();
        assert_eq!(json["asset"]["version"], "2.0");
        assert_eq!(json["accessors"][0]["count"], 8);
        assert_eq!(json["accessors"][1]["count"], 36);
        assert_eq!(json["accessors"][0]["min"], serde_json::json!([0.0, 0.0, 0.0]));
        assert_eq!(json["accessors"][0]["max"], serde_json::json!([1.0, 1.0, 1.0]));

        // BIN chunk directly follows
        let bin_off = 20 + json_len;
        let bin_len = u32::from_le_bytes(bytes[bin_off..bin_off + 4].try_into().unwrap()) as usize;
        assert_eq!(&bytes[bin_off + 4..bin_off + 7], b"BIN");
        assert_eq!(bin_off + 8 + bin_len, bytes.len());
        assert_eq!(
            json["buffers"][0]["byteLength"].as_u64().unwrap() as usize,
            bin_len
        );
    }
}
