//! Ride height adjustment with a clearance check against the tires.

use glam::Vec3;

use crate::config::{Units, VehicleSettings};
use crate::scene::picking::{raycast, Ray};
use crate::scene::NodeId;
use crate::state::{name_matches, normalize_key, ConfigurationState};

pub struct HeightAdjustmentEngine {
    body_node: String,
    reference_key: String,
    units: Units,
    clearance: f32,
}

impl HeightAdjustmentEngine {
    pub fn new(vehicle: &VehicleSettings) -> Self {
        Self {
            body_node: vehicle.body_node.clone(),
            reference_key: normalize_key(&vehicle.reference_part),
            units: vehicle.units,
            clearance: vehicle.clearance,
        }
    }

    fn body(&self, state: &ConfigurationState) -> Option<NodeId> {
        let handle = state.scene_handle()?;
        state.world.find_by_name(handle, &self.body_node)
    }

    /// Move the body by `delta` (in the configured unit).
    ///
    /// Returns whether the move took effect. While colliding, raises are
    /// refused and any lowering is accepted and clears the collision.
    pub fn adjust(&self, state: &mut ConfigurationState, delta: f32) -> bool {
        let Some(body) = self.body(state) else {
            tracing::warn!("Height adjust ignored: no '{}' in scene", self.body_node);
            return false;
        };
        let step = self.units.to_meters(delta);

        if state.is_colliding {
            if delta > 0.0 {
                tracing::debug!("Raise by {}{} blocked by collision", delta, self.units.abbrev());
                return false;
            }
            if delta < 0.0 {
                translate_y(state, body, step);
                state.height_offset += delta;
                state.is_colliding = false;
                return true;
            }
        }

        translate_y(state, body, step);
        if self.is_colliding(state, body) {
            translate_y(state, body, -step);
            state.is_colliding = true;
            tracing::info!("Height change of {}{} reverted: collision", delta, self.units.abbrev());
            return false;
        }
        state.height_offset += delta;
        true
    }

    /// Put the body back at zero offset. The collision flag is left as is.
    pub fn reset(&self, state: &mut ConfigurationState) {
        if let Some(body) = self.body(state) {
            if let Some(node) = state.world.get_mut(body) {
                node.transform.translation.y = 0.0;
            }
        }
        state.height_offset = 0.0;
    }

    /// Re-apply the accepted offset to the current model's body.
    pub fn reapply(&self, state: &mut ConfigurationState) {
        let y = self.units.to_meters(state.height_offset);
        if let Some(body) = self.body(state) {
            if let Some(node) = state.world.get_mut(body) {
                node.transform.translation.y = y;
            }
        }
    }

    /// True if the body is closer than the clearance above the reference part.
    pub fn is_colliding(&self, state: &ConfigurationState, body: NodeId) -> bool {
        let Some(top) = self.reference_top(state, body) else {
            return false;
        };
        let clearance = self.units.to_meters(self.clearance);
        raycast(&state.world, body, &Ray::up_from(top)).is_some_and(|d| d < clearance)
    }

    /// World-space highest vertex of the first visible reference part.
    fn reference_top(&self, state: &ConfigurationState, body: NodeId) -> Option<Vec3> {
        let handle = state.scene_handle()?;
        let world = &state.world;
        let reference = world.descendants(handle).into_iter().find(|id| {
            !world.is_within(*id, body)
                && world.is_effectively_visible(*id)
                && world
                    .get(*id)
                    .is_some_and(|n| name_matches(&n.name, &self.reference_key))
        })?;

        let mut top: Option<Vec3> = None;
        for id in world.descendants(reference) {
            if !world.is_effectively_visible(id) {
                continue;
            }
            let Some(mesh) = world.get(id).and_then(|n| n.mesh_data()) else {
                continue;
            };
            let Some(local) = mesh.geometry.highest_vertex() else {
                continue;
            };
            let p = world.world_matrix(id).transform_point3(local);
            if top.map_or(true, |t| p.y > t.y) {
                top = Some(p);
            }
        }
        top
    }
}

fn translate_y(state: &mut ConfigurationState, id: NodeId, dy: f32) {
    if let Some(node) = state.world.get_mut(id) {
        node.transform.translation.y += dy;
    }
}
