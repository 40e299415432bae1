//! Free-fly camera with left-handed view and projection matrices.
//!
//! The camera looks down +Z by default. Mouse drags rotate it, the arrow keys and
//! PageUp/PageDown translate it. Depth maps to `0..1`, matching wgpu clip space.

use glam::{Mat4, Vec3};
use winit::keyboard::KeyCode;

use crate::input::Input;

const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// A free-fly camera.
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    /// Rotation around the X axis, in radians. Positive looks down.
    pub pitch: f32,
    /// Rotation around the Y axis, in radians. Positive turns right.
    pub yaw: f32,
    /// Vertical field of view, in radians.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Translation speed in units per second.
    pub move_speed: f32,
    view: Mat4,
    projection: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, -5.0), 16.0 / 9.0)
    }
}

impl Camera {
    /// Create a camera at `position` looking down +Z.
    pub fn new(position: Vec3, aspect: f32) -> Self {
        let mut camera = Self {
            position,
            pitch: 0.0,
            yaw: 0.0,
            fov: std::f32::consts::FRAC_PI_4,
            near: 0.1,
            far: 100.0,
            move_speed: 2.0,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        camera.update_view_matrix();
        camera.update_projection_matrix(aspect);
        camera
    }

    /// Unit vector the camera is looking along.
    pub fn forward(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vec3::new(sin_yaw * cos_pitch, -sin_pitch, cos_yaw * cos_pitch)
    }

    /// Unit vector pointing to the camera's right.
    pub fn right(&self) -> Vec3 {
        Vec3::Y.cross(self.forward()).normalize_or_zero()
    }

    /// Rotate by the given pitch and yaw deltas (radians). Pitch is clamped just
    /// short of straight up/down.
    pub fn rotate(&mut self, pitch_delta: f32, yaw_delta: f32) {
        self.pitch = (self.pitch + pitch_delta).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.yaw += yaw_delta;
        self.update_view_matrix();
    }

    /// Move relative to the camera's orientation: `x` right, `y` world up, `z` forward.
    pub fn translate_relative(&mut self, x: f32, y: f32, z: f32) {
        self.position += self.right() * x + Vec3::Y * y + self.forward() * z;
        self.update_view_matrix();
    }

    /// Apply keyboard translation for this frame.
    pub fn update(&mut self, dt: f32, input: &Input) {
        let mut speed = self.move_speed * dt;
        if input.key_down(KeyCode::ShiftLeft) || input.key_down(KeyCode::ShiftRight) {
            speed *= 5.0;
        }

        let axis = |positive: KeyCode, negative: KeyCode| -> f32 {
            let mut value = 0.0;
            if input.key_down(positive) {
                value += 1.0;
            }
            if input.key_down(negative) {
                value -= 1.0;
            }
            value
        };

        let x = axis(KeyCode::ArrowRight, KeyCode::ArrowLeft);
        let y = axis(KeyCode::PageUp, KeyCode::PageDown);
        let z = axis(KeyCode::ArrowUp, KeyCode::ArrowDown);

        if x != 0.0 || y != 0.0 || z != 0.0 {
            self.translate_relative(x * speed, y * speed, z * speed);
        }
    }

    /// Rebuild the projection matrix for a new aspect ratio.
    pub fn update_projection_matrix(&mut self, aspect: f32) {
        self.projection = Mat4::perspective_lh(self.fov, aspect, self.near, self.far);
    }

    fn update_view_matrix(&mut self) {
        self.view = Mat4::look_to_lh(self.position, self.forward(), Vec3::Y);
    }

    /// World-to-view transform.
    pub fn view(&self) -> Mat4 {
        self.view
    }

    /// View-to-clip transform.
    pub fn projection(&self) -> Mat4 {
        self.projection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_looks_down_positive_z() {
        let camera = Camera::default();
        assert!((camera.forward() - Vec3::Z).length() < 1e-6);
        assert!((camera.right() - Vec3::X).length() < 1e-6);

        // A point in front of the camera lands at positive view-space z.
        let p = camera.view().transform_point3(Vec3::new(0.0, 0.0, 0.0));
        assert!((p.z - 5.0).abs() < 1e-5);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = Camera::default();
        camera.rotate(10.0, 0.0);
        assert!(camera.pitch < std::f32::consts::FRAC_PI_2);
        camera.rotate(-20.0, 0.0);
        assert!(camera.pitch > -std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn keyboard_moves_forward() {
        let mut camera = Camera::default();
        let mut input = Input::new();
        input.set_key(KeyCode::ArrowUp, true);
        camera.update(0.5, &input);
        assert!((camera.position.z - (-4.0)).abs() < 1e-5);
    }
}
