//! Configuration state
//!
//! The canonical record of the user's selections together with the live
//! scene graph they apply to. Every engine takes this as an explicit
//! `&mut` dependency; there is no global store.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::Vec3;

use shared::{ConfigurationSummary, DEFAULT_ENVIRONMENT, DEFAULT_PART};

use crate::scene::material::{Color, Material};
use crate::scene::mesh::plane;
use crate::scene::{LightKind, Node, NodeId, NodeTag, SceneGraph, Transform};

/// Name of the world's backdrop node toggled by environment presets
pub const ENVIRONMENT_GROUND: &str = "EnvironmentGround";

/// Lower-case and join whitespace runs with `_`.
///
/// Applied identically to requested categories and to scene node names, so
/// `"Wheels & Tires"` and a node named `Wheels_&_Tires_FL` meet as
/// `wheels_&_tires`.
pub fn normalize_key(s: &str) -> String {
    s.to_lowercase().split_whitespace().collect::<Vec<_>>().join("_")
}

/// Substring match on normalized names. An empty key matches nothing.
pub fn name_matches(name: &str, key: &str) -> bool {
    !key.is_empty() && normalize_key(name).contains(key)
}

/// A replacement subtree inserted by the part engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacedNode {
    pub id: NodeId,
    /// Normalized category
    pub category: String,
    /// Identity used for the content hash (node name, uuid when unnamed)
    pub key: String,
}

/// An original node hidden because a replacement is active
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiddenNode {
    pub id: NodeId,
    /// Normalized category that hid it
    pub category: String,
    pub name: String,
    pub tag: NodeTag,
}

/// Canonical configuration plus the live world graph
#[derive(Debug)]
pub struct ConfigurationState {
    pub paint_color: String,
    pub selected_parts: BTreeMap<String, String>,
    pub selected_environment: String,
    pub world: SceneGraph,
    world_root: NodeId,
    scene_handle: Option<NodeId>,
    high_detail: bool,
    replaced_nodes: Vec<ReplacedNode>,
    hidden_original_nodes: Vec<HiddenNode>,
    /// Body offset in user units, as accepted by the height engine
    pub height_offset: f32,
    pub is_colliding: bool,
    pub load_progress: f32,
    pub is_loading: bool,
    pub is_exporting: bool,
}

impl ConfigurationState {
    /// Factory defaults: paint color, base selections, neutral environment,
    /// and a world holding the default lights and a hidden backdrop.
    pub fn new(default_color: &str) -> Self {
        let mut world = SceneGraph::new();
        let world_root = world.add(Node::group("Scene"), None);

        world.add(Node::light("AmbientLight", LightKind::Ambient, 0.5), Some(world_root));
        world.add(
            Node::light("DirectionalLight", LightKind::Directional, 1.0)
                .with_transform(Transform::from_translation(Vec3::new(2.0, 10.0, 2.0))),
            Some(world_root),
        );
        world.add(
            Node::ground_plane(
                ENVIRONMENT_GROUND,
                Arc::new(plane(40.0, 40.0)),
                Material::named("Ground", Color::new(0.5, 0.5, 0.5)),
            )
            .with_visible(false),
            Some(world_root),
        );

        let selected_parts = [
            ("truckModel", "Truck"),
            ("tyreModel", "Tire"),
            ("wheelModel", "Wheel_1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            paint_color: default_color.to_string(),
            selected_parts,
            selected_environment: DEFAULT_ENVIRONMENT.to_string(),
            world,
            world_root,
            scene_handle: None,
            high_detail: false,
            replaced_nodes: Vec::new(),
            hidden_original_nodes: Vec::new(),
            height_offset: 0.0,
            is_colliding: false,
            load_progress: 0.0,
            is_loading: false,
            is_exporting: false,
        }
    }

    // ── Scene handle ──────────────────────────────────────────

    pub fn world_root(&self) -> NodeId {
        self.world_root
    }

    /// Root of the active vehicle model (low or high detail)
    pub fn scene_handle(&self) -> Option<NodeId> {
        self.scene_handle
    }

    pub fn is_high_detail(&self) -> bool {
        self.high_detail
    }

    pub(crate) fn set_scene_handle(&mut self, handle: Option<NodeId>, high_detail: bool) {
        self.scene_handle = handle;
        self.high_detail = high_detail;
    }

    // ── Replacement bookkeeping ──────────────────────────────

    pub fn replaced_nodes(&self) -> &[ReplacedNode] {
        &self.replaced_nodes
    }

    pub fn hidden_original_nodes(&self) -> &[HiddenNode] {
        &self.hidden_original_nodes
    }

    pub(crate) fn add_replaced(&mut self, entry: ReplacedNode) {
        self.replaced_nodes.push(entry);
    }

    pub(crate) fn add_hidden(&mut self, entry: HiddenNode) {
        if !self.hidden_original_nodes.iter().any(|h| h.id == entry.id) {
            self.hidden_original_nodes.push(entry);
        }
    }

    /// Remove and return every replacement tracked for `category`.
    pub(crate) fn take_replaced(&mut self, category: &str) -> Vec<ReplacedNode> {
        let (taken, kept) = std::mem::take(&mut self.replaced_nodes)
            .into_iter()
            .partition(|r| r.category == category);
        self.replaced_nodes = kept;
        taken
    }

    pub(crate) fn take_replaced_all(&mut self) -> Vec<ReplacedNode> {
        std::mem::take(&mut self.replaced_nodes)
    }

    /// Remove and return hidden entries selected by `pred`.
    pub(crate) fn take_hidden(&mut self, pred: impl Fn(&HiddenNode) -> bool) -> Vec<HiddenNode> {
        let (taken, kept) = std::mem::take(&mut self.hidden_original_nodes)
            .into_iter()
            .partition(|h| pred(h));
        self.hidden_original_nodes = kept;
        taken
    }

    pub(crate) fn replace_hidden(&mut self, hidden: Vec<HiddenNode>) {
        self.hidden_original_nodes = hidden;
    }

    /// True if `id` lies inside any tracked replacement subtree
    pub fn is_replacement(&self, id: NodeId) -> bool {
        self.replaced_nodes
            .iter()
            .any(|r| self.world.is_within(id, r.id))
    }

    /// Hash identities of the replaced nodes
    pub fn replaced_keys(&self) -> Vec<String> {
        self.replaced_nodes.iter().map(|r| r.key.clone()).collect()
    }

    /// Hash identities of the hidden original nodes
    pub fn hidden_keys(&self) -> Vec<String> {
        self.hidden_original_nodes
            .iter()
            .map(|h| h.name.clone())
            .collect()
    }

    // ── Selections ───────────────────────────────────────────

    pub fn select_part(&mut self, category: &str, part_id: &str) {
        self.selected_parts
            .insert(category.to_string(), part_id.to_string());
    }

    pub fn clear_part(&mut self, category: &str) {
        self.select_part(category, DEFAULT_PART);
    }

    pub fn summary(&self, content_hash: String) -> ConfigurationSummary {
        let mut replaced = self.replaced_keys();
        replaced.sort();
        let mut hidden = self.hidden_keys();
        hidden.sort();
        ConfigurationSummary {
            paint_color: self.paint_color.clone(),
            selected_parts: self.selected_parts.clone(),
            selected_environment: self.selected_environment.clone(),
            content_hash,
            replaced_parts: replaced,
            hidden_parts: hidden,
            high_detail: self.high_detail,
            is_loading: self.is_loading,
            is_exporting: self.is_exporting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::NodeKind;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("Wheels & Tires"), "wheels_&_tires");
        assert_eq!(normalize_key("wheels  &\tTIRES"), "wheels_&_tires");
        assert_eq!(normalize_key("wheels_&_tires"), "wheels_&_tires");
        assert_eq!(normalize_key("  Bumper "), "bumper");
    }

    #[test]
    fn test_name_matches_is_substring() {
        assert!(name_matches("Wheels_&_Tires_FL", "wheels_&_tires"));
        assert!(name_matches("Bumper_Front", "bumper"));
        assert!(!name_matches("TruckBody", "bumper"));
        assert!(!name_matches("anything", ""));
    }

    #[test]
    fn test_new_state_defaults() {
        let s = ConfigurationState::new("#e20407");
        assert_eq!(s.paint_color, "#e20407");
        assert_eq!(s.selected_environment, "neutral");
        assert_eq!(s.selected_parts["wheelModel"], "Wheel_1");
        assert!(s.scene_handle().is_none());
        assert!(!s.is_loading && !s.is_exporting && !s.is_colliding);

        let lights: Vec<LightKind> = s
            .world
            .descendants(s.world_root())
            .into_iter()
            .filter_map(|id| match &s.world.get(id)?.kind {
                NodeKind::Light(l) => Some(l.kind),
                _ => None,
            })
            .collect();
        assert_eq!(lights, vec![LightKind::Ambient, LightKind::Directional]);
        let ground = s.world.find_by_name(s.world_root(), ENVIRONMENT_GROUND).unwrap();
        assert!(!s.world.get(ground).unwrap().visible);
    }

    #[test]
    fn test_hidden_entries_are_unique() {
        let mut s = ConfigurationState::new("#e20407");
        let id = s.world.add(Node::group("Tire"), Some(s.world_root()));
        let entry = HiddenNode {
            id,
            category: "tire".into(),
            name: "Tire".into(),
            tag: NodeTag::Group,
        };
        s.add_hidden(entry.clone());
        s.add_hidden(entry);
        assert_eq!(s.hidden_original_nodes().len(), 1);
        assert_eq!(s.take_hidden(|h| h.category == "tire").len(), 1);
        assert!(s.hidden_original_nodes().is_empty());
    }

    #[test]
    fn test_select_and_clear_part() {
        let mut s = ConfigurationState::new("#e20407");
        s.select_part("wheels_&_tires", "Wheel_2");
        assert_eq!(s.selected_parts["wheels_&_tires"], "Wheel_2");
        s.clear_part("wheels_&_tires");
        assert_eq!(s.selected_parts["wheels_&_tires"], "default");
    }
}
