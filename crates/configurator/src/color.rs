//! Body paint
//!
//! The first time a body mesh is painted its material is cached, so a reset
//! can bring back exactly what the asset shipped with.

use crate::error::ColorError;
use crate::scene::material::Color;
use crate::scene::NodeId;
use crate::state::ConfigurationState;

pub struct ColorManager {
    body_node: String,
}

impl ColorManager {
    pub fn new(body_node: impl Into<String>) -> Self {
        Self {
            body_node: body_node.into(),
        }
    }

    /// Mesh nodes under every node named after the body sub-assembly.
    fn body_meshes(&self, state: &ConfigurationState) -> Vec<NodeId> {
        let Some(handle) = state.scene_handle() else {
            return Vec::new();
        };
        let world = &state.world;
        let mut out = Vec::new();
        for id in world.descendants(handle) {
            if !world.get(id).is_some_and(|n| n.name == self.body_node) {
                continue;
            }
            for d in world.descendants(id) {
                let is_mesh = world.get(d).is_some_and(|n| n.mesh_data().is_some());
                if is_mesh && !out.contains(&d) {
                    out.push(d);
                }
            }
        }
        out
    }

    /// Record `hex` as the paint color and apply it to the body.
    ///
    /// Returns the number of meshes painted; zero when no model is loaded
    /// yet (the color is applied on load).
    pub fn apply_color(&self, state: &mut ConfigurationState, hex: &str) -> Result<usize, ColorError> {
        let color = Color::from_hex(hex)?;
        state.paint_color = hex.trim().to_string();

        let meshes = self.body_meshes(state);
        for id in &meshes {
            let Some(mesh) = state.world.get_mut(*id).and_then(|n| n.mesh_data_mut()) else {
                continue;
            };
            if mesh.original_material.is_none() {
                mesh.original_material = Some(mesh.material.clone());
            }
            mesh.material.color = color;
        }
        tracing::debug!("Painted {} body meshes {}", meshes.len(), state.paint_color);
        Ok(meshes.len())
    }

    /// Restore cached originals. Meshes never painted are left alone.
    pub fn reset_color(&self, state: &mut ConfigurationState) -> usize {
        let mut restored = 0;
        for id in self.body_meshes(state) {
            let Some(mesh) = state.world.get_mut(id).and_then(|n| n.mesh_data_mut()) else {
                continue;
            };
            if let Some(original) = &mesh.original_material {
                mesh.material = original.clone();
                restored += 1;
            }
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::scene::material::Material;

    fn body_materials(state: &ConfigurationState) -> Vec<Material> {
        let cm = ColorManager::new("TruckBody");
        cm.body_meshes(state)
            .into_iter()
            .filter_map(|id| state.world.get(id).and_then(|n| n.mesh_data()))
            .map(|m| m.material.clone())
            .collect()
    }

    #[test]
    fn test_apply_then_reset_restores_materials() {
        let mut state = fixtures::loaded_state();
        let cm = ColorManager::new("TruckBody");
        let before = body_materials(&state);
        assert!(!before.is_empty());

        let n = cm.apply_color(&mut state, "#00ff00").unwrap();
        assert_eq!(n, before.len());
        assert!(body_materials(&state)
            .iter()
            .all(|m| m.color.to_hex() == "#00ff00"));
        assert_eq!(state.paint_color, "#00ff00");

        // A second paint must not overwrite the cached original
        cm.apply_color(&mut state, "#0000ff").unwrap();
        assert_eq!(cm.reset_color(&mut state), before.len());
        assert_eq!(body_materials(&state), before);
    }

    #[test]
    fn test_only_body_is_painted() {
        let mut state = fixtures::loaded_state();
        let handle = state.scene_handle().unwrap();
        let bumper = state.world.find_by_name(handle, "Bumper_Front").unwrap();
        let before = state.world.get(bumper).unwrap().mesh_data().unwrap().material.clone();

        ColorManager::new("TruckBody").apply_color(&mut state, "#123456").unwrap();
        let after = &state.world.get(bumper).unwrap().mesh_data().unwrap().material;
        assert_eq!(&before, after);
    }

    #[test]
    fn test_invalid_color_changes_nothing() {
        let mut state = fixtures::loaded_state();
        let cm = ColorManager::new("TruckBody");
        let err = cm.apply_color(&mut state, "red").unwrap_err();
        assert_eq!(err, ColorError::Invalid("red".into()));
        assert_eq!(state.paint_color, shared::DEFAULT_PAINT_COLOR);
    }

    #[test]
    fn test_reset_without_paint_is_noop() {
        let mut state = fixtures::loaded_state();
        let before = body_materials(&state);
        assert_eq!(ColorManager::new("TruckBody").reset_color(&mut state), 0);
        assert_eq!(body_materials(&state), before);
    }
}
