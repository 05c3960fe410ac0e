//! Scene graph arena
//!
//! Nodes live in a flat arena addressed by `NodeId`. Parent/child links are
//! indices, and ids are never reused after a node is removed, so bookkeeping
//! collections can hold ids without dangling.

pub mod import;
pub mod material;
pub mod mesh;
pub mod picking;

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use uuid::Uuid;

use material::{Color, Material};
use mesh::Geometry;

/// Stable identifier of a node inside one `SceneGraph`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Local transform: translation, rotation, scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

/// Geometry plus the live material of a renderable node
#[derive(Debug, Clone, PartialEq)]
pub struct MeshNode {
    pub geometry: Arc<Geometry>,
    pub material: Material,
    /// Material as first seen by the color manager, kept for reversion
    pub original_material: Option<Material>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Ambient,
    Directional,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
}

/// Closed set of node kinds, fixed at load time
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh(MeshNode),
    Light(Light),
    /// Shadow catcher / environment backdrop. Never exported.
    GroundPlane(MeshNode),
}

/// Kind discriminant without payload, used when matching nodes across graphs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeTag {
    Group,
    Mesh,
    Light,
    GroundPlane,
}

impl NodeKind {
    pub fn tag(&self) -> NodeTag {
        match self {
            NodeKind::Group => NodeTag::Group,
            NodeKind::Mesh(_) => NodeTag::Mesh,
            NodeKind::Light(_) => NodeTag::Light,
            NodeKind::GroundPlane(_) => NodeTag::GroundPlane,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub uuid: Uuid,
    pub name: String,
    pub kind: NodeKind,
    pub transform: Transform,
    pub visible: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn with_kind(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            kind,
            transform: Transform::IDENTITY,
            visible: true,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::with_kind(name, NodeKind::Group)
    }

    pub fn mesh(name: impl Into<String>, geometry: Arc<Geometry>, material: Material) -> Self {
        Self::with_kind(
            name,
            NodeKind::Mesh(MeshNode {
                geometry,
                material,
                original_material: None,
            }),
        )
    }

    pub fn light(name: impl Into<String>, kind: LightKind, intensity: f32) -> Self {
        Self::with_kind(
            name,
            NodeKind::Light(Light {
                kind,
                color: Color::WHITE,
                intensity,
            }),
        )
    }

    pub fn ground_plane(name: impl Into<String>, geometry: Arc<Geometry>, material: Material) -> Self {
        Self::with_kind(
            name,
            NodeKind::GroundPlane(MeshNode {
                geometry,
                material,
                original_material: None,
            }),
        )
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn tag(&self) -> NodeTag {
        self.kind.tag()
    }

    pub fn mesh_data(&self) -> Option<&MeshNode> {
        match &self.kind {
            NodeKind::Mesh(m) => Some(m),
            _ => None,
        }
    }

    pub fn mesh_data_mut(&mut self) -> Option<&mut MeshNode> {
        match &mut self.kind {
            NodeKind::Mesh(m) => Some(m),
            _ => None,
        }
    }
}

/// Arena of nodes
///
/// Ids are slot indices and are never reused, so a removed node leaves an
/// empty slot behind. The arena grows by one model per load or LOD swap and
/// by one part per replacement for the life of a session.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: Vec<Option<Node>>,
    live: usize,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.live
    }

    /// Slots ever allocated, live or removed
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a node, optionally as the last child of `parent`.
    pub fn add(&mut self, mut node: Node, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        node.parent = None;
        node.children.clear();
        self.nodes.push(Some(node));
        self.live += 1;
        if let Some(parent) = parent {
            self.attach(id, parent);
        }
        id
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(|n| n.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(|n| n.as_mut())
    }

    /// Re-parent `child` under `parent`. A no-op if either is missing or
    /// `parent` lies inside `child`'s subtree.
    pub fn attach(&mut self, child: NodeId, parent: NodeId) {
        if child == parent || !self.contains(child) || !self.contains(parent) {
            return;
        }
        if self.is_within(parent, child) {
            return;
        }
        self.detach(child);
        if let Some(p) = self.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = Some(parent);
        }
    }

    /// Unlink a node from its parent; the subtree stays in the arena.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.get(id).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|c| *c != id);
        }
        if let Some(n) = self.get_mut(id) {
            n.parent = None;
        }
    }

    /// Remove a node and its whole subtree. Returns the removed ids.
    pub fn remove_subtree(&mut self, id: NodeId) -> Vec<NodeId> {
        if !self.contains(id) {
            return Vec::new();
        }
        self.detach(id);
        let removed = self.descendants(id);
        for r in &removed {
            if self.nodes[r.index()].take().is_some() {
                self.live -= 1;
            }
        }
        removed
    }

    /// Depth-first pre-order traversal starting at (and including) `root`.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.get(id) else { continue };
            out.push(id);
            for child in node.children.iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Nodes without a parent, in insertion order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| match n {
                Some(n) if n.parent.is_none() => Some(NodeId(i as u32)),
                _ => None,
            })
            .collect()
    }

    /// True if `id` equals `ancestor` or lies in its subtree.
    pub fn is_within(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.get(c).and_then(|n| n.parent);
        }
        false
    }

    /// Visible and every ancestor visible.
    pub fn is_effectively_visible(&self, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            match self.get(c) {
                Some(n) if n.visible => cur = n.parent,
                _ => return false,
            }
        }
        true
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        if let Some(n) = self.get_mut(id) {
            n.visible = visible;
        }
    }

    /// Local-to-world matrix
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut m = Mat4::IDENTITY;
        let mut cur = Some(id);
        while let Some(c) = cur {
            let Some(node) = self.get(c) else { break };
            m = node.transform.matrix() * m;
            cur = node.parent;
        }
        m
    }

    /// First node under `root` (pre-order) with exactly this name
    pub fn find_by_name(&self, root: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|id| self.get(*id).is_some_and(|n| n.name == name))
    }

    /// World-space bounds of all mesh geometry under `root`
    pub fn world_bounds(&self, root: NodeId) -> Option<(Vec3, Vec3)> {
        let mut acc: Option<(Vec3, Vec3)> = None;
        for id in self.descendants(root) {
            let Some(mesh) = self.get(id).and_then(|n| n.mesh_data()) else {
                continue;
            };
            let world = self.world_matrix(id);
            for p in &mesh.geometry.positions {
                let w = world.transform_point3(*p);
                acc = Some(match acc {
                    Some((min, max)) => (min.min(w), max.max(w)),
                    None => (w, w),
                });
            }
        }
        acc
    }

    /// Deep-copy the subtree at `source_root` of `source` into this graph,
    /// optionally under `parent`. Copies get fresh uuids; geometry is shared.
    pub fn graft(&mut self, source: &SceneGraph, source_root: NodeId, parent: Option<NodeId>) -> Option<NodeId> {
        let node = source.get(source_root)?;
        let mut copy = node.clone();
        copy.uuid = Uuid::new_v4();
        let new_id = self.add(copy, parent);
        for &child in &node.children {
            self.graft(source, child, Some(new_id));
        }
        Some(new_id)
    }

    /// Deep clone of one subtree into a fresh graph.
    pub fn extract(&self, root: NodeId) -> Option<(SceneGraph, NodeId)> {
        let mut out = SceneGraph::new();
        let new_root = out.graft(self, root, None)?;
        Some((out, new_root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::mesh::cuboid;

    fn sample() -> (SceneGraph, NodeId, NodeId, NodeId) {
        let mut g = SceneGraph::new();
        let root = g.add(Node::group("Root"), None);
        let body = g.add(
            Node::group("Body").with_transform(Transform::from_translation(Vec3::new(0.0, 1.0, 0.0))),
            Some(root),
        );
        let panel = g.add(
            Node::mesh(
                "Panel",
                Arc::new(cuboid(1.0, 1.0, 1.0, Vec3::ZERO)),
                Material::default(),
            )
            .with_transform(Transform::from_translation(Vec3::new(2.0, 0.0, 0.0))),
            Some(body),
        );
        (g, root, body, panel)
    }

    #[test]
    fn test_add_and_traverse() {
        let (g, root, body, panel) = sample();
        assert_eq!(g.len(), 3);
        assert_eq!(g.descendants(root), vec![root, body, panel]);
        assert_eq!(g.roots(), vec![root]);
        assert_eq!(g.get(panel).unwrap().parent(), Some(body));
    }

    #[test]
    fn test_world_matrix_composes_parents() {
        let (g, _, _, panel) = sample();
        let p = g.world_matrix(panel).transform_point3(Vec3::ZERO);
        assert_eq!(p, Vec3::new(2.0, 1.0, 0.0));
    }

    #[test]
    fn test_remove_subtree_never_reuses_ids() {
        let (mut g, root, body, panel) = sample();
        let removed = g.remove_subtree(body);
        assert_eq!(removed, vec![body, panel]);
        assert!(!g.contains(panel));
        assert!(g.get(root).unwrap().children().is_empty());

        let fresh = g.add(Node::group("New"), Some(root));
        assert_ne!(fresh, body);
        assert_ne!(fresh, panel);
    }

    #[test]
    fn test_len_counts_live_nodes_only() {
        let (mut g, root, body, _) = sample();
        g.remove_subtree(body);
        assert_eq!(g.len(), 1);
        assert_eq!(g.capacity(), 3);

        // removing twice does not double count
        assert!(g.remove_subtree(body).is_empty());
        assert_eq!(g.len(), 1);

        g.add(Node::group("New"), Some(root));
        assert_eq!(g.len(), 2);
        assert_eq!(g.capacity(), 4);
        g.remove_subtree(root);
        assert!(g.is_empty());
    }

    #[test]
    fn test_attach_rejects_cycles() {
        let (mut g, root, body, _) = sample();
        g.attach(root, body);
        assert_eq!(g.get(root).unwrap().parent(), None);
        assert_eq!(g.get(body).unwrap().parent(), Some(root));
    }

    #[test]
    fn test_effective_visibility() {
        let (mut g, _, body, panel) = sample();
        assert!(g.is_effectively_visible(panel));
        g.set_visible(body, false);
        assert!(!g.is_effectively_visible(panel));
        assert!(g.get(panel).unwrap().visible);
    }

    #[test]
    fn test_graft_copies_with_new_uuids() {
        let (g, _, body, _) = sample();
        let mut other = SceneGraph::new();
        let host = other.add(Node::group("Host"), None);
        let copy = other.graft(&g, body, Some(host)).unwrap();
        assert_eq!(other.len(), 3);
        assert_eq!(other.get(copy).unwrap().name, "Body");
        assert_ne!(other.get(copy).unwrap().uuid, g.get(body).unwrap().uuid);
        assert!(other.find_by_name(host, "Panel").is_some());
    }

    #[test]
    fn test_world_bounds() {
        let (g, root, _, _) = sample();
        let (min, max) = g.world_bounds(root).unwrap();
        assert_eq!(min, Vec3::new(1.5, 0.5, -0.5));
        assert_eq!(max, Vec3::new(2.5, 1.5, 0.5));
    }
}
