use serde_json::{json, Value};

use crate::error::ExportError;
use crate::scene::{NodeId, NodeKind, SceneGraph};

/// GLB magic number: "glTF"
const GLB_MAGIC: u32 = 0x46546C67;
/// GLB version 2
const GLB_VERSION: u32 = 2;
/// JSON chunk type
const CHUNK_TYPE_JSON: u32 = 0x4E4F534A;
/// BIN chunk type
const CHUNK_TYPE_BIN: u32 = 0x004E4942;

/// glTF component types
const FLOAT: u32 = 5126;
const UNSIGNED_INT: u32 = 5125;

/// glTF buffer view targets
const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;

/// Accumulates the binary buffer and the JSON arrays in one pass.
#[derive(Default)]
struct GlbBuilder {
    bin: Vec<u8>,
    accessors: Vec<Value>,
    buffer_views: Vec<Value>,
    meshes: Vec<Value>,
    materials: Vec<Value>,
    nodes: Vec<Value>,
}

impl GlbBuilder {
    fn push_view(&mut self, bytes: &[u8], target: u32) -> usize {
        let offset = self.bin.len();
        self.bin.extend_from_slice(bytes);
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        self.buffer_views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": bytes.len(),
            "target": target
        }));
        self.buffer_views.len() - 1
    }

    fn push_accessor(&mut self, accessor: Value) -> usize {
        self.accessors.push(accessor);
        self.accessors.len() - 1
    }

    /// Emit a visible node and its visible children. Returns the glTF node index.
    fn visit(&mut self, graph: &SceneGraph, id: NodeId) -> Result<Option<usize>, ExportError> {
        let Some(node) = graph.get(id) else {
            return Ok(None);
        };
        if !node.visible {
            return Ok(None);
        }

        let mut children = Vec::new();
        for child in node.children() {
            if let Some(index) = self.visit(graph, *child)? {
                children.push(index);
            }
        }

        let mut out = json!({ "name": node.name });
        let t = &node.transform;
        if !t.is_identity() {
            out["translation"] = json!(t.translation.to_array());
            out["rotation"] = json!(t.rotation.to_array());
            out["scale"] = json!(t.scale.to_array());
        }
        if let NodeKind::Mesh(mesh) = &node.kind {
            if let Some(index) = self.push_mesh(&node.name, mesh)? {
                out["mesh"] = json!(index);
            }
        }
        if !children.is_empty() {
            out["children"] = json!(children);
        }

        self.nodes.push(out);
        Ok(Some(self.nodes.len() - 1))
    }

    fn push_mesh(
        &mut self,
        name: &str,
        mesh: &crate::scene::MeshNode,
    ) -> Result<Option<usize>, ExportError> {
        let geometry = &mesh.geometry;
        if geometry.is_empty() {
            return Ok(None);
        }
        let vertex_count = geometry.vertex_count();
        if geometry
            .indices
            .iter()
            .any(|i| *i as usize >= vertex_count)
        {
            return Err(ExportError::Glb(format!("mesh '{name}' has out-of-range indices")));
        }
        let Some((min, max)) = geometry.bounds() else {
            return Ok(None);
        };

        let positions: Vec<f32> = geometry.positions.iter().flat_map(|p| p.to_array()).collect();
        let view = self.push_view(&floats_to_bytes(&positions), ARRAY_BUFFER);
        let position = self.push_accessor(json!({
            "bufferView": view,
            "byteOffset": 0,
            "componentType": FLOAT,
            "count": vertex_count,
            "type": "VEC3",
            "min": min.to_array(),
            "max": max.to_array()
        }));

        let mut attributes = json!({ "POSITION": position });
        if geometry.has_normals() {
            let normals: Vec<f32> = geometry.normals.iter().flat_map(|n| n.to_array()).collect();
            let view = self.push_view(&floats_to_bytes(&normals), ARRAY_BUFFER);
            let normal = self.push_accessor(json!({
                "bufferView": view,
                "byteOffset": 0,
                "componentType": FLOAT,
                "count": vertex_count,
                "type": "VEC3"
            }));
            attributes["NORMAL"] = json!(normal);
        }

        let view = self.push_view(&u32s_to_bytes(&geometry.indices), ELEMENT_ARRAY_BUFFER);
        let indices = self.push_accessor(json!({
            "bufferView": view,
            "byteOffset": 0,
            "componentType": UNSIGNED_INT,
            "count": geometry.indices.len(),
            "type": "SCALAR"
        }));

        let m = &mesh.material;
        let [r, g, b] = m.color.to_array();
        let mut material = json!({
            "name": m.name,
            "pbrMetallicRoughness": {
                "baseColorFactor": [r, g, b, m.opacity],
                "metallicFactor": m.metallic,
                "roughnessFactor": m.roughness
            },
            "doubleSided": m.is_double_sided()
        });
        if m.opacity < 1.0 {
            material["alphaMode"] = json!("BLEND");
        }
        self.materials.push(material);
        let material = self.materials.len() - 1;

        self.meshes.push(json!({
            "name": name,
            "primitives": [{
                "attributes": attributes,
                "indices": indices,
                "material": material
            }]
        }));
        Ok(Some(self.meshes.len() - 1))
    }
}

/// Build a complete GLB (binary glTF) file from the visible part of the
/// subtree at `root`.
///
/// Output is deterministic for a given graph. Fails if nothing visible
/// carries geometry.
pub fn build_glb(graph: &SceneGraph, root: NodeId) -> Result<Vec<u8>, ExportError> {
    let mut builder = GlbBuilder::default();
    let scene_root = builder
        .visit(graph, root)?
        .ok_or(ExportError::EmptyScene)?;
    if builder.meshes.is_empty() {
        return Err(ExportError::EmptyScene);
    }

    let mut gltf_json = json!({
        "asset": {
            "version": "2.0",
            "generator": concat!("configurator v", env!("CARGO_PKG_VERSION"))
        },
        "scene": 0,
        "scenes": [{
            "name": "Scene",
            "nodes": [scene_root]
        }],
        "nodes": builder.nodes,
        "meshes": builder.meshes,
        "materials": builder.materials,
        "accessors": builder.accessors,
        "bufferViews": builder.buffer_views,
        "buffers": [{
            "byteLength": builder.bin.len()
        }]
    });
    if let Some(name) = graph.get(root).map(|n| n.name.clone()) {
        gltf_json["scenes"][0]["name"] = json!(name);
    }

    let mut json_bytes =
        serde_json::to_vec(&gltf_json).map_err(|e| ExportError::Glb(e.to_string()))?;
    let mut bin_data = builder.bin;

    // Pad JSON to 4-byte alignment with spaces (per GLB spec)
    while json_bytes.len() % 4 != 0 {
        json_bytes.push(b' ');
    }
    while bin_data.len() % 4 != 0 {
        bin_data.push(0);
    }

    // ── Assemble GLB ─────────────────────────────────────────
    let json_chunk_length = u32::try_from(json_bytes.len())
        .map_err(|_| ExportError::Glb("JSON chunk exceeds 4 GiB".into()))?;
    let bin_chunk_length = u32::try_from(bin_data.len())
        .map_err(|_| ExportError::Glb("BIN chunk exceeds 4 GiB".into()))?;
    let total_length = 12u32
        .checked_add(8 + json_chunk_length)
        .and_then(|t| t.checked_add(8 + bin_chunk_length))
        .ok_or_else(|| ExportError::Glb("GLB exceeds 4 GiB".into()))?;

    let mut glb = Vec::with_capacity(total_length as usize);

    // Header
    glb.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    glb.extend_from_slice(&GLB_VERSION.to_le_bytes());
    glb.extend_from_slice(&total_length.to_le_bytes());

    // JSON chunk
    glb.extend_from_slice(&json_chunk_length.to_le_bytes());
    glb.extend_from_slice(&CHUNK_TYPE_JSON.to_le_bytes());
    glb.extend_from_slice(&json_bytes);

    // BIN chunk
    glb.extend_from_slice(&bin_chunk_length.to_le_bytes());
    glb.extend_from_slice(&CHUNK_TYPE_BIN.to_le_bytes());
    glb.extend_from_slice(&bin_data);

    Ok(glb)
}

fn floats_to_bytes(data: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(data.len() * 4);
    for &f in data {
        bytes.extend_from_slice(&f.to_le_bytes());
    }
    bytes
}

fn u32s_to_bytes(data: &[u32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(data.len() * 4);
    for &v in data {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::Vec3;

    use super::*;
    use crate::scene::import::import_glb;
    use crate::scene::material::{Color, Material, Side};
    use crate::scene::mesh::cuboid;
    use crate::scene::{Node, Transform};

    fn sample() -> (SceneGraph, NodeId) {
        let mut g = SceneGraph::new();
        let root = g.add(Node::group("Truck"), None);
        let body = g.add(
            Node::group("TruckBody").with_transform(Transform::from_translation(Vec3::Y)),
            Some(root),
        );
        let mut paint = Material::named("Paint", Color::new(0.8, 0.0, 0.0));
        paint.side = Side::Double;
        g.add(
            Node::mesh("Panel", Arc::new(cuboid(2.0, 0.2, 4.0, Vec3::ZERO)), paint),
            Some(body),
        );
        g.add(
            Node::mesh("Hidden", Arc::new(cuboid(1.0, 1.0, 1.0, Vec3::ZERO)), Material::default())
                .with_visible(false),
            Some(root),
        );
        (g, root)
    }

    #[test]
    fn test_glb_header() {
        let (g, root) = sample();
        let glb = build_glb(&g, root).unwrap();
        assert_eq!(&glb[0..4], b"glTF");
        assert_eq!(u32::from_le_bytes(glb[4..8].try_into().unwrap()), 2);
        assert_eq!(
            u32::from_le_bytes(glb[8..12].try_into().unwrap()) as usize,
            glb.len()
        );
        assert_eq!(glb.len() % 4, 0);
    }

    #[test]
    fn test_glb_reimports_visible_nodes_only() {
        let (g, root) = sample();
        let glb = build_glb(&g, root).unwrap();
        let (back, back_root) = import_glb(&glb).unwrap();

        let truck = back.find_by_name(back_root, "Truck").unwrap();
        let body = back.find_by_name(truck, "TruckBody").unwrap();
        assert_eq!(back.get(body).unwrap().transform.translation, Vec3::Y);
        let panel = back.find_by_name(truck, "Panel").unwrap();
        let mesh = back.get(panel).unwrap().mesh_data().unwrap();
        assert_eq!(mesh.geometry.triangle_count(), 12);
        assert!(mesh.material.is_double_sided());
        assert!(back.find_by_name(back_root, "Hidden").is_none());
    }

    #[test]
    fn test_glb_is_deterministic() {
        let (g, root) = sample();
        assert_eq!(build_glb(&g, root).unwrap(), build_glb(&g, root).unwrap());
    }

    #[test]
    fn test_empty_scene_is_an_error() {
        let mut g = SceneGraph::new();
        let root = g.add(Node::group("Empty"), None);
        assert!(matches!(build_glb(&g, root), Err(ExportError::EmptyScene)));
    }
}
