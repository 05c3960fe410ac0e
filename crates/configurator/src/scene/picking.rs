use glam::Vec3;

use super::{NodeId, NodeKind, SceneGraph};

/// A ray in world space
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn up_from(origin: Vec3) -> Self {
        Self {
            origin,
            direction: Vec3::Y,
        }
    }
}

/// Möller-Trumbore ray-triangle intersection algorithm.
/// Returns the distance along the ray if hit, or None if no intersection.
pub fn ray_triangle_intersect(ray: &Ray, v0: Vec3, v1: Vec3, v2: Vec3) -> Option<f32> {
    const EPSILON: f32 = 1e-7;

    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = ray.direction.cross(edge2);
    let a = edge1.dot(h);

    // Ray is parallel to triangle
    if a.abs() < EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(h);

    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray.direction.dot(q);

    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);

    // Intersection is behind ray origin
    if t > EPSILON {
        Some(t)
    } else {
        None
    }
}

/// Nearest hit distance between `ray` and any visible mesh under `root`
/// (including `root` itself).
pub fn raycast(graph: &SceneGraph, root: NodeId, ray: &Ray) -> Option<f32> {
    let mut best: Option<f32> = None;

    for id in graph.descendants(root) {
        if !graph.is_effectively_visible(id) {
            continue;
        }
        let Some(node) = graph.get(id) else { continue };
        let NodeKind::Mesh(mesh) = &node.kind else {
            continue;
        };
        let world = graph.world_matrix(id);
        for [v0, v1, v2] in mesh.geometry.world_triangles(&world) {
            if let Some(dist) = ray_triangle_intersect(ray, v0, v1, v2) {
                if best.is_none_or(|d| dist < d) {
                    best = Some(dist);
                }
            }
        }
    }

    best
}
