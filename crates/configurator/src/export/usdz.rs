//! USDZ writer
//!
//! Emits a single ASCII layer (`model.usda`) and packs it into an
//! uncompressed zip with 64-byte aligned entries, as AR Quick Look
//! requires. Every mesh is written single-sided.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::{Cursor, Write as _};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ExportError;
use crate::scene::{MeshNode, NodeId, NodeKind, SceneGraph};

/// Name of the root layer inside the package
pub const LAYER_NAME: &str = "model.usda";

/// Build a USDZ package from the visible part of the subtree at `root`.
pub fn build_usdz(graph: &SceneGraph, root: NodeId) -> Result<Vec<u8>, ExportError> {
    let layer = build_usda(graph, root)?;

    let mut buffer = Vec::new();
    let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(zip::DateTime::default())
        .with_alignment(64);
    zip.start_file(LAYER_NAME, options)
        .map_err(|e| ExportError::Usdz(e.to_string()))?;
    zip.write_all(layer.as_bytes())
        .map_err(|e| ExportError::Usdz(e.to_string()))?;
    zip.finish().map_err(|e| ExportError::Usdz(e.to_string()))?;

    Ok(buffer)
}

/// The USDA text for the visible part of the subtree at `root`.
pub fn build_usda(graph: &SceneGraph, root: NodeId) -> Result<String, ExportError> {
    let mut writer = UsdaWriter::default();
    writer.used.extend(["Root".to_string(), "Materials".to_string()]);
    let mut body = String::new();
    writer.visit(graph, root, "/Root", 1, &mut body)?;
    if writer.materials.is_empty() {
        return Err(ExportError::EmptyScene);
    }

    let mut out = String::new();
    out.push_str("#usda 1.0\n(\n");
    out.push_str("    customLayerData = {\n        string creator = \"configurator\"\n    }\n");
    out.push_str("    defaultPrim = \"Root\"\n    metersPerUnit = 1\n    upAxis = \"Y\"\n)\n\n");
    out.push_str("def Xform \"Root\"\n{\n");
    out.push_str(&body);
    out.push_str("\n    def Scope \"Materials\"\n    {\n");
    for m in &writer.materials {
        out.push_str(m);
    }
    out.push_str("    }\n}\n");
    Ok(out)
}

#[derive(Default)]
struct UsdaWriter {
    materials: Vec<String>,
    used: HashSet<String>,
}

impl UsdaWriter {
    /// Valid prim identifier, unique across the whole layer.
    fn prim_name(&mut self, name: &str) -> String {
        let mut base: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if base.is_empty() || base.starts_with(|c: char| c.is_ascii_digit()) {
            base.insert(0, '_');
        }
        let mut candidate = base.clone();
        let mut n = 1;
        while !self.used.insert(candidate.clone()) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        candidate
    }

    fn visit(
        &mut self,
        graph: &SceneGraph,
        id: NodeId,
        parent_path: &str,
        depth: usize,
        out: &mut String,
    ) -> Result<(), ExportError> {
        let Some(node) = graph.get(id) else {
            return Ok(());
        };
        if !node.visible {
            return Ok(());
        }
        let indent = "    ".repeat(depth);
        let name = self.prim_name(&node.name);
        let path = format!("{parent_path}/{name}");

        let _ = writeln!(out, "{indent}def Xform \"{name}\"\n{indent}{{");
        if !node.transform.is_identity() {
            let cols = node.transform.matrix().to_cols_array_2d();
            let rows: Vec<String> = cols
                .iter()
                .map(|c| format!("({}, {}, {}, {})", c[0], c[1], c[2], c[3]))
                .collect();
            let _ = writeln!(
                out,
                "{indent}    matrix4d xformOp:transform = ( {} )",
                rows.join(", ")
            );
            let _ = writeln!(
                out,
                "{indent}    uniform token[] xformOpOrder = [\"xformOp:transform\"]"
            );
        }

        if let NodeKind::Mesh(mesh) = &node.kind {
            self.write_mesh(mesh, &path, depth + 1, out)?;
        }
        for child in node.children() {
            self.visit(graph, *child, &path, depth + 1, out)?;
        }
        let _ = writeln!(out, "{indent}}}");
        Ok(())
    }

    fn write_mesh(
        &mut self,
        mesh: &MeshNode,
        parent_path: &str,
        depth: usize,
        out: &mut String,
    ) -> Result<(), ExportError> {
        let g = &mesh.geometry;
        if g.is_empty() {
            return Ok(());
        }
        if g.indices.iter().any(|i| *i as usize >= g.vertex_count()) {
            return Err(ExportError::Usdz(format!(
                "mesh under {parent_path} has out-of-range indices"
            )));
        }
        let indent = "    ".repeat(depth);
        let material = self.write_material(mesh);
        let prim = self.prim_name("Geometry");

        let counts = vec!["3"; g.triangle_count()].join(", ");
        let indices: Vec<String> = g
            .indices
            .iter()
            .take(g.triangle_count() * 3)
            .map(|i| i.to_string())
            .collect();
        let points: Vec<String> = g
            .positions
            .iter()
            .map(|p| format!("({}, {}, {})", p.x, p.y, p.z))
            .collect();

        let _ = writeln!(out, "{indent}def Mesh \"{prim}\"\n{indent}{{");
        let _ = writeln!(out, "{indent}    uniform bool doubleSided = 0");
        let _ = writeln!(out, "{indent}    int[] faceVertexCounts = [{counts}]");
        let _ = writeln!(out, "{indent}    int[] faceVertexIndices = [{}]", indices.join(", "));
        let _ = writeln!(out, "{indent}    point3f[] points = [{}]", points.join(", "));
        if g.has_normals() {
            let normals: Vec<String> = g
                .normals
                .iter()
                .map(|n| format!("({}, {}, {})", n.x, n.y, n.z))
                .collect();
            let _ = writeln!(
                out,
                "{indent}    normal3f[] normals = [{}] (\n{indent}        interpolation = \"vertex\"\n{indent}    )",
                normals.join(", ")
            );
        }
        let _ = writeln!(out, "{indent}    uniform token subdivisionScheme = \"none\"");
        let _ = writeln!(out, "{indent}    rel material:binding = </Root/Materials/{material}>");
        let _ = writeln!(out, "{indent}}}");
        Ok(())
    }

    /// Append a UsdPreviewSurface material; returns its prim name.
    fn write_material(&mut self, mesh: &MeshNode) -> String {
        let m = &mesh.material;
        let name = format!("Material_{}", self.materials.len());
        let path = format!("/Root/Materials/{name}");
        let [r, g, b] = m.color.to_array();

        let mut s = String::new();
        let _ = writeln!(s, "        def Material \"{name}\"\n        {{");
        let _ = writeln!(
            s,
            "            token outputs:surface.connect = <{path}/PreviewSurface.outputs:surface>"
        );
        let _ = writeln!(s, "            def Shader \"PreviewSurface\"\n            {{");
        let _ = writeln!(s, "                uniform token info:id = \"UsdPreviewSurface\"");
        let _ = writeln!(s, "                color3f inputs:diffuseColor = ({r}, {g}, {b})");
        let _ = writeln!(s, "                float inputs:metallic = {}", m.metallic);
        let _ = writeln!(s, "                float inputs:roughness = {}", m.roughness);
        let _ = writeln!(s, "                float inputs:opacity = {}", m.opacity);
        let _ = writeln!(s, "                token outputs:surface");
        let _ = writeln!(s, "            }}\n        }}");
        self.materials.push(s);
        name
    }
}
