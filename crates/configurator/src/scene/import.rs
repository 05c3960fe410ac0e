//! Binary glTF (GLB) → `SceneGraph`.
//!
//! Mirrors the node layout a glTF viewer produces: one group per glTF node,
//! single-primitive meshes collapse into the node itself, multi-primitive
//! meshes become `{name}_{i}` mesh children.

use std::sync::Arc;

use glam::{Quat, Vec3};

use super::material::{Color, Material, Side};
use super::mesh::Geometry;
use super::{Node, NodeId, NodeKind, MeshNode, SceneGraph, Transform};
use crate::error::LoadError;

/// Parse GLB bytes into a standalone graph. Returns the graph and its root.
pub fn import_glb(bytes: &[u8]) -> Result<(SceneGraph, NodeId), LoadError> {
    check_required_extensions(bytes)?;
    let (document, buffers, _images) =
        gltf::import_slice(bytes).map_err(|e| LoadError::Parse(e.to_string()))?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| LoadError::Parse("asset contains no scene".into()))?;

    let mut graph = SceneGraph::new();
    let root = graph.add(Node::group(scene.name().unwrap_or("Scene")), None);

    for node in scene.nodes() {
        import_node(&mut graph, &buffers, &node, root)?;
    }

    tracing::debug!("Imported GLB: {} nodes", graph.len());
    Ok((graph, root))
}

/// No optional glTF extensions are decoded, so any entry in
/// `extensionsRequired` (Draco mesh compression in practice) is refused by
/// name. Extensions that are only "used" fall back to plain accessors.
fn check_required_extensions(bytes: &[u8]) -> Result<(), LoadError> {
    let Ok(glb) = gltf::Glb::from_slice(bytes) else {
        return Ok(());
    };
    let json: serde_json::Value =
        serde_json::from_slice(&glb.json).map_err(|e| LoadError::Parse(e.to_string()))?;
    let required = json
        .get("extensionsRequired")
        .and_then(|v| v.as_array())
        .and_then(|a| a.first())
        .and_then(|v| v.as_str());
    match required {
        Some(name) => Err(LoadError::UnsupportedExtension(name.to_string())),
        None => Ok(()),
    }
}

fn import_node(
    graph: &mut SceneGraph,
    buffers: &[gltf::buffer::Data],
    node: &gltf::Node,
    parent: NodeId,
) -> Result<(), LoadError> {
    let (t, r, s) = node.transform().decomposed();
    let transform = Transform {
        translation: Vec3::from(t),
        rotation: Quat::from_array(r),
        scale: Vec3::from(s),
    };
    let name = node.name().unwrap_or_default().to_string();
    let id = graph.add(Node::group(name.clone()).with_transform(transform), Some(parent));

    if let Some(mesh) = node.mesh() {
        let mut parts = Vec::new();
        for primitive in mesh.primitives() {
            parts.push(read_primitive(&primitive, buffers)?);
        }

        if parts.len() == 1 {
            if let (Some(n), Some(part)) = (graph.get_mut(id), parts.pop()) {
                n.kind = NodeKind::Mesh(part);
            }
        } else {
            for (i, part) in parts.into_iter().enumerate() {
                let child = graph.add(Node::group(format!("{name}_{i}")), Some(id));
                if let Some(n) = graph.get_mut(child) {
                    n.kind = NodeKind::Mesh(part);
                }
            }
        }
    }

    for child in node.children() {
        import_node(graph, buffers, &child, id)?;
    }
    Ok(())
}

fn read_primitive(
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
) -> Result<MeshNode, LoadError> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        return Err(LoadError::Parse(format!(
            "unsupported primitive mode {:?}",
            primitive.mode()
        )));
    }

    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));

    let positions: Vec<Vec3> = reader
        .read_positions()
        .ok_or_else(|| LoadError::Parse("primitive without POSITION".into()))?
        .map(Vec3::from)
        .collect();

    let normals: Vec<Vec3> = reader
        .read_normals()
        .map(|n| n.map(Vec3::from).collect())
        .unwrap_or_default();

    let indices: Vec<u32> = match reader.read_indices() {
        Some(i) => i.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };

    if indices.iter().any(|i| *i as usize >= positions.len()) {
        return Err(LoadError::Parse("index out of range".into()));
    }

    Ok(MeshNode {
        geometry: Arc::new(Geometry {
            positions,
            normals,
            indices,
        }),
        material: read_material(&primitive.material()),
        original_material: None,
    })
}

fn read_material(material: &gltf::Material) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, a] = pbr.base_color_factor();
    Material {
        name: material.name().unwrap_or_default().to_string(),
        color: Color::new(r, g, b),
        opacity: a,
        metallic: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        side: if material.double_sided() {
            Side::Double
        } else {
            Side::Front
        },
    }
}
