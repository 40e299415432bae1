//! Placed instances of a mesh and a material.

use glam::{Mat4, Quat, Vec3};

use crate::resources::{MaterialId, MeshId};

/// A drawable object: transform, cached world matrix and shared resource handles.
///
/// Mutating the transform marks the world matrix stale. Call
/// [`update_world_matrix`](Self::update_world_matrix) before the entity is drawn;
/// [`is_dirty`](Self::is_dirty) reports whether that is still pending.
#[derive(Clone, Debug)]
pub struct GameEntity {
    position: Vec3,
    rotation: Quat,
    scale: Vec3,
    world: Mat4,
    dirty: bool,
    pub mesh: MeshId,
    pub material: MaterialId,
    /// Multiplies the material's alpha; 1.0 is fully opaque.
    pub opacity: f32,
}

impl GameEntity {
    pub fn new(mesh: MeshId, material: MaterialId) -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            world: Mat4::IDENTITY,
            dirty: false,
            mesh,
            material,
            opacity: 1.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.dirty = true;
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.dirty = true;
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.dirty = true;
    }

    /// Recompute the world matrix as scale, then rotation, then translation.
    pub fn update_world_matrix(&mut self) {
        self.world = Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position);
        self.dirty = false;
    }

    /// Whether the transform changed since the last world matrix update.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The cached world matrix.
    pub fn world_matrix(&self) -> Mat4 {
        if self.dirty {
            log::trace!("World matrix read while stale");
        }
        self.world
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity() -> GameEntity {
        GameEntity::new(MeshId(0), MaterialId(0))
    }

    #[test]
    fn mutation_marks_dirty_until_refreshed() {
        let mut e = entity();
        assert!(!e.is_dirty());
        e.set_position(Vec3::new(1.0, 2.0, 3.0));
        assert!(e.is_dirty());
        assert_eq!(e.world_matrix(), Mat4::IDENTITY);

        e.update_world_matrix();
        assert!(!e.is_dirty());
        assert_eq!(e.world_matrix().w_axis.truncate(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn world_matrix_applies_scale_before_translation() {
        let mut e = entity();
        e.set_scale(Vec3::new(2.0, 0.5, 1.0));
        e.set_position(Vec3::new(0.0, -2.0, 4.0));
        e.update_world_matrix();
        let p = e.world_matrix().transform_point3(Vec3::new(1.0, 1.0, 1.0));
        assert!((p - Vec3::new(2.0, -1.5, 5.0)).length() < 1e-6);
    }

    #[test]
    fn rotation_applies_between_scale_and_translation() {
        let mut e = entity();
        e.set_scale(Vec3::splat(2.0));
        e.set_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));
        e.set_position(Vec3::new(0.0, 0.0, 3.0));
        assert!(e.is_dirty());
        e.update_world_matrix();
        let p = e.world_matrix().transform_point3(Vec3::X);
        assert!((p - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-5);
    }
}
