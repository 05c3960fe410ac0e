use glam::{Mat4, Vec3};

/// CPU-side triangle geometry: positions, optional per-vertex normals and u32 indices.
///
/// Geometry is immutable once built and shared between the live scene and
/// export clones through `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub positions: Vec<Vec3>,
    /// Either empty or one normal per position
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.indices.len() < 3
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty() && self.normals.len() == self.positions.len()
    }

    /// Vertex with the largest local Y coordinate.
    pub fn highest_vertex(&self) -> Option<Vec3> {
        self.positions
            .iter()
            .copied()
            .reduce(|best, p| if p.y > best.y { p } else { best })
    }

    /// Local-space bounding box
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        if self.positions.is_empty() {
            return None;
        }
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for p in &self.positions {
            min = min.min(*p);
            max = max.max(*p);
        }
        Some((min, max))
    }

    /// World-space triangles under the given transform.
    pub fn world_triangles(&self, world: &Mat4) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        let world = *world;
        self.indices.chunks_exact(3).filter_map(move |tri| {
            let v0 = self.positions.get(tri[0] as usize)?;
            let v1 = self.positions.get(tri[1] as usize)?;
            let v2 = self.positions.get(tri[2] as usize)?;
            Some([
                world.transform_point3(*v0),
                world.transform_point3(*v1),
                world.transform_point3(*v2),
            ])
        })
    }
}

// ── Primitive generation (fixtures, shadow plane) ──

/// Axis-aligned box centered at `center`.
pub fn cuboid(w: f32, h: f32, d: f32, center: Vec3) -> Geometry {
    let hw = w * 0.5;
    let hh = h * 0.5;
    let hd = d * 0.5;

    let faces: [([Vec3; 4], Vec3); 6] = [
        // Front (+Z)
        ([Vec3::new(-hw, -hh, hd), Vec3::new(hw, -hh, hd), Vec3::new(hw, hh, hd), Vec3::new(-hw, hh, hd)], Vec3::Z),
        // Back (-Z)
        ([Vec3::new(hw, -hh, -hd), Vec3::new(-hw, -hh, -hd), Vec3::new(-hw, hh, -hd), Vec3::new(hw, hh, -hd)], Vec3::NEG_Z),
        // Right (+X)
        ([Vec3::new(hw, -hh, hd), Vec3::new(hw, -hh, -hd), Vec3::new(hw, hh, -hd), Vec3::new(hw, hh, hd)], Vec3::X),
        // Left (-X)
        ([Vec3::new(-hw, -hh, -hd), Vec3::new(-hw, -hh, hd), Vec3::new(-hw, hh, hd), Vec3::new(-hw, hh, -hd)], Vec3::NEG_X),
        // Top (+Y)
        ([Vec3::new(-hw, hh, hd), Vec3::new(hw, hh, hd), Vec3::new(hw, hh, -hd), Vec3::new(-hw, hh, -hd)], Vec3::Y),
        // Bottom (-Y)
        ([Vec3::new(-hw, -hh, -hd), Vec3::new(hw, -hh, -hd), Vec3::new(hw, -hh, hd), Vec3::new(-hw, -hh, hd)], Vec3::NEG_Y),
    ];

    let mut positions = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (quad, normal) in &faces {
        let base = positions.len() as u32;
        for v in quad {
            positions.push(*v + center);
            normals.push(*normal);
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    Geometry {
        positions,
        normals,
        indices,
    }
}

/// Horizontal plane (XZ) facing +Y, centered at the origin.
pub fn plane(w: f32, d: f32) -> Geometry {
    let hw = w * 0.5;
    let hd = d * 0.5;
    Geometry {
        positions: vec![
            Vec3::new(-hw, 0.0, hd),
            Vec3::new(hw, 0.0, hd),
            Vec3::new(hw, 0.0, -hd),
            Vec3::new(-hw, 0.0, -hd),
        ],
        normals: vec![Vec3::Y; 4],
        indices: vec![0, 1, 2, 0, 2, 3],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cuboid_counts_and_bounds() {
        let g = cuboid(2.0, 1.0, 4.0, Vec3::new(0.0, 1.5, 0.0));
        assert_eq!(g.vertex_count(), 24);
        assert_eq!(g.triangle_count(), 12);
        assert!(g.has_normals());
        let (min, max) = g.bounds().unwrap();
        assert_eq!(min, Vec3::new(-1.0, 1.0, -2.0));
        assert_eq!(max, Vec3::new(1.0, 2.0, 2.0));
    }

    #[test]
    fn test_highest_vertex() {
        let g = cuboid(1.0, 1.0, 1.0, Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(g.highest_vertex().unwrap().y, 3.5);
    }

    #[test]
    fn test_world_triangles_apply_transform() {
        let g = plane(2.0, 2.0);
        let m = Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0));
        let tris: Vec<_> = g.world_triangles(&m).collect();
        assert_eq!(tris.len(), 2);
        assert!(tris.iter().flatten().all(|v| v.y == 5.0));
    }

    #[test]
    fn test_empty_geometry() {
        let g = Geometry {
            positions: vec![],
            normals: vec![],
            indices: vec![],
        };
        assert!(g.is_empty());
        assert!(g.highest_vertex().is_none());
        assert!(g.bounds().is_none());
    }
}
