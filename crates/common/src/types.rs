use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Position of an object in the physics catalog.
///
/// Catalog positions are load-bearing: simulation logic spawns bodies by
/// these ids, so they must match the load order of the asset catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl ObjectId {
    pub const SPHERE: Self = Self(0);
    pub const PLANE: Self = Self(1);
    pub const CUBE: Self = Self(2);
    pub const WALL: Self = Self(3);
    pub const CYLINDER: Self = Self(4);
    pub const RAMP: Self = Self(5);
    pub const ELONGATED_BOX: Self = Self(6);

    /// Number of entries in the fixed catalog.
    pub const COUNT: usize = 7;

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Axis-aligned bounding box in object space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box enclosing every point. `None` for an empty input.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points
            .iter()
            .fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
        Some(Self { min, max })
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn center(&self) -> Vec3 {
        (self.max + self.min) * 0.5
    }
}

/// Per-view camera configuration handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraMode {
    Perspective,
    None,
}

impl CameraMode {
    pub fn from_render_flag(enable_render: bool) -> Self {
        if enable_render {
            Self::Perspective
        } else {
            Self::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_are_dense() {
        let ids = [
            ObjectId::SPHERE,
            ObjectId::PLANE,
            ObjectId::CUBE,
            ObjectId::WALL,
            ObjectId::CYLINDER,
            ObjectId::RAMP,
            ObjectId::ELONGATED_BOX,
        ];
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(id.index(), i);
        }
        assert_eq!(ids.len(), ObjectId::COUNT);
    }

    #[test]
    fn aabb_from_points() {
        let aabb = Aabb::from_points(&[
            Vec3::new(-1.0, 2.0, 0.0),
            Vec3::new(3.0, -4.0, 1.0),
            Vec3::new(0.0, 0.0, 5.0),
        ])
        .unwrap();
        assert_eq!(aabb.min, Vec3::new(-1.0, -4.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(3.0, 2.0, 5.0));
        assert_eq!(aabb.half_extents(), Vec3::new(2.0, 3.0, 2.5));
        assert!(Aabb::from_points(&[]).is_none());
    }

    #[test]
    fn camera_mode_follows_render_flag() {
        assert_eq!(CameraMode::from_render_flag(true), CameraMode::Perspective);
        assert_eq!(CameraMode::from_render_flag(false), CameraMode::None);
    }
}
