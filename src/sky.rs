//! Skybox with a slow blend between two cube maps.

use glam::Mat4;

use crate::camera::Camera;
use crate::gpu::{DEPTH_FORMAT, GpuContext, HDR_FORMAT};
use crate::mesh::Vertex;
use crate::resources::{MeshId, Resources};
use crate::texture::CubeTexture;

/// Frame-counted oscillator driving the sky blend factor.
///
/// Every 100 frames the factor moves 0.01 in the current direction. The direction
/// turns downward when the counter reaches 10000 modulo 20000 and upward again at
/// 0 modulo 20000. The factor itself is never clamped; the shader clamps it when
/// sampling.
#[derive(Clone, Debug, Default)]
pub struct SkyBlend {
    counter: u64,
    lerp: f32,
    decreasing: bool,
}

impl SkyBlend {
    const NUDGE_PERIOD: u64 = 100;
    const NUDGE: f32 = 0.01;
    const CYCLE: u64 = 20_000;
    const HALF_CYCLE: u64 = 10_000;

    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by one frame.
    pub fn advance(&mut self) {
        self.counter += 1;
        match self.counter % Self::CYCLE {
            Self::HALF_CYCLE => self.decreasing = true,
            0 => self.decreasing = false,
            _ => {}
        }
        if self.counter % Self::NUDGE_PERIOD == 0 {
            self.lerp += if self.decreasing { -Self::NUDGE } else { Self::NUDGE };
        }
    }

    /// Current blend factor; 0 shows the first cube map, 1 the second.
    pub fn lerp(&self) -> f32 {
        self.lerp
    }

    pub fn frame(&self) -> u64 {
        self.counter
    }
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct SkyUniforms {
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    /// x: blend factor, yzw: padding.
    blend: [f32; 4],
}

/// Draws the sky cube around the camera after the opaque geometry.
pub struct SkyPass {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    mesh: MeshId,
}

impl SkyPass {
    pub fn new(gpu: &GpuContext, mesh: MeshId, first: &CubeTexture, second: &CubeTexture) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Sky Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/sky.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Sky Uniforms"),
            size: std::mem::size_of::<SkyUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Sky Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let cube_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::Cube,
                multisampled: false,
            },
            count: None,
        };

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sky Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                cube_entry(1),
                cube_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Sky Bind Group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(first.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(second.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Sky Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        // Inside faces only, drawn at the far plane behind everything already in
        // the depth buffer.
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Sky Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: HDR_FORMAT,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Front),
                front_face: wgpu::FrontFace::Cw,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            uniform_buffer,
            bind_group,
            mesh,
        }
    }

    /// Upload the camera rotation and the blend factor for this frame.
    pub fn prepare(&self, gpu: &GpuContext, camera: &Camera, blend: f32) {
        // Translation is dropped so the sky stays centered on the camera.
        let rotation_only = Mat4::from_mat3(glam::Mat3::from_mat4(camera.view()));
        let uniforms = SkyUniforms {
            view: rotation_only.to_cols_array_2d(),
            projection: camera.projection().to_cols_array_2d(),
            blend: [blend, 0.0, 0.0, 0.0],
        };
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>, resources: &Resources) {
        let mesh = resources.mesh(self.mesh);
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        mesh.bind(pass);
        pass.draw_indexed(0..mesh.index_count(), 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_every_100(blend: &mut SkyBlend, samples: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(samples);
        for _ in 0..samples {
            out.push(blend.lerp());
            for _ in 0..100 {
                blend.advance();
            }
        }
        out
    }

    #[test]
    fn rises_for_100_samples_then_turns() {
        let mut blend = SkyBlend::new();
        let samples = sample_every_100(&mut blend, 101);
        for pair in samples[..100].windows(2) {
            assert!(pair[1] > pair[0], "not increasing: {pair:?}");
        }
        assert_eq!(blend.frame(), 10_100);
        assert!(samples[100] < samples[99]);
    }

    #[test]
    fn falls_until_the_full_cycle_then_rises() {
        let mut blend = SkyBlend::new();
        for _ in 0..10_000 {
            blend.advance();
        }
        let samples = sample_every_100(&mut blend, 101);
        for pair in samples[..100].windows(2) {
            assert!(pair[1] < pair[0], "not decreasing: {pair:?}");
        }
        assert!(samples[100] > samples[99]);
    }

    #[test]
    fn lerp_is_not_clamped() {
        let mut blend = SkyBlend::new();
        for _ in 0..19_900 {
            blend.advance();
        }
        assert!(blend.lerp() < 0.0);
    }

    #[test]
    fn only_every_hundredth_frame_moves() {
        let mut blend = SkyBlend::new();
        for _ in 0..99 {
            blend.advance();
        }
        assert_eq!(blend.lerp(), 0.0);
        blend.advance();
        assert!((blend.lerp() - 0.01).abs() < 1e-6);
    }
}
