//! Directional lights passed to the renderer each frame.

use glam::Vec3;

/// One directional light, laid out for a WGSL uniform struct.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DirectionalLight {
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    /// Direction the light travels in; `w` is padding.
    pub direction: [f32; 4],
}

impl DirectionalLight {
    pub fn new(ambient: [f32; 4], diffuse: [f32; 4], direction: Vec3) -> Self {
        let d = direction.normalize_or_zero();
        Self {
            ambient,
            diffuse,
            direction: [d.x, d.y, d.z, 0.0],
        }
    }
}

/// The scene's light set. Built once and handed to
/// [`Renderer::prepare`](crate::renderer::Renderer::prepare) every frame.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Lighting {
    pub lights: [DirectionalLight; 2],
}

impl Default for Lighting {
    /// A dim grey ambient term with a blue key light from the left and a red
    /// light from the right, both angled down.
    fn default() -> Self {
        let ambient = [0.1, 0.1, 0.1, 1.0];
        Self {
            lights: [
                DirectionalLight::new(ambient, [0.0, 0.0, 1.0, 1.0], Vec3::new(1.0, -1.0, 0.0)),
                DirectionalLight::new(ambient, [1.0, 0.0, 0.0, 1.0], Vec3::new(-1.0, -1.0, 0.0)),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directions_are_normalized() {
        let lighting = Lighting::default();
        for light in lighting.lights {
            let d = Vec3::new(light.direction[0], light.direction[1], light.direction[2]);
            assert!((d.length() - 1.0).abs() < 1e-6);
            assert_eq!(light.direction[3], 0.0);
        }
    }

    #[test]
    fn light_is_three_vec4s() {
        assert_eq!(std::mem::size_of::<DirectionalLight>(), 48);
    }
}
