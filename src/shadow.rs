//! Directional shadow map.
//!
//! Casters are rendered depth-only from a fixed light position into a square depth
//! texture, which the lit program then samples through a comparison sampler. The
//! map is created once and never resized.

use glam::{Mat4, Vec3};

use crate::entity::GameEntity;
use crate::gpu::{DEPTH_FORMAT, GpuContext};
use crate::mesh::Vertex;
use crate::renderer::aligned_stride;
use crate::resources::Resources;

/// Side length of the shadow map in texels.
pub const SHADOW_MAP_SIZE: u32 = 2048;

/// Maximum number of shadow casters per frame.
const MAX_CASTERS: usize = 8;

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct LightUniforms {
    view_projection: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct CasterUniforms {
    world: [[f32; 4]; 4],
}

/// Depth-only shadow pass and the bind group the lit program samples it through.
///
/// Render the casters before the main pass, then hand the light matrices to
/// [`Renderer::prepare`](crate::Renderer::prepare) and the bind group to
/// [`Renderer::bind`](crate::Renderer::bind).
///
/// # Example
///
/// ```ignore
/// let shadow = ShadowMap::new(&gpu, renderer.shadow_layout());
///
/// // Only the player casts a shadow
/// shadow.render(&gpu, &mut encoder, &resources, &[&player]);
/// renderer.prepare(&gpu, &camera, &lighting, shadow.view(), shadow.projection(), &entities);
///
/// // Inside the scene pass
/// let count = renderer.bind(&mut pass, slot, entity, &resources, shadow.sample_bind_group());
/// pass.draw_indexed(0..count, 0, 0..1);
/// ```
pub struct ShadowMap {
    #[allow(dead_code)]
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    pipeline: wgpu::RenderPipeline,
    light_buffer: wgpu::Buffer,
    light_bind_group: wgpu::BindGroup,
    caster_buffer: wgpu::Buffer,
    caster_bind_group: wgpu::BindGroup,
    caster_stride: u64,
    /// Depth texture and comparison sampler, laid out for the renderer's group 3.
    sample_bind_group: wgpu::BindGroup,
    view: Mat4,
    projection: Mat4,
}

impl ShadowMap {
    /// Light eye position; the light looks at the origin with +Y up.
    pub const LIGHT_POSITION: Vec3 = Vec3::new(0.0, 20.0, -20.0);

    pub fn new(gpu: &GpuContext, sample_layout: &wgpu::BindGroupLayout) -> Self {
        let device = &gpu.device;

        let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Shadow Map"),
            size: wgpu::Extent3d {
                width: SHADOW_MAP_SIZE,
                height: SHADOW_MAP_SIZE,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let comparison_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let sample_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shadow Sample Bind Group"),
            layout: sample_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&depth_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&comparison_sampler),
                },
            ],
        });

        let light_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Light Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let caster_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Caster Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let light_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shadow Light Uniforms"),
            size: std::mem::size_of::<LightUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let light_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shadow Light Bind Group"),
            layout: &light_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: light_buffer.as_entire_binding(),
            }],
        });

        let caster_stride = aligned_stride(
            std::mem::size_of::<CasterUniforms>() as u64,
            gpu.uniform_alignment(),
        );
        let caster_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shadow Caster Uniforms"),
            size: caster_stride * MAX_CASTERS as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let caster_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shadow Caster Bind Group"),
            layout: &caster_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &caster_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<CasterUniforms>() as u64),
                }),
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shadow Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/shadow.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Pipeline Layout"),
            bind_group_layouts: &[&light_layout, &caster_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Shadow Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                front_face: wgpu::FrontFace::Cw,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState {
                    constant: 1000,
                    slope_scale: 1.0,
                    clamp: 0.0,
                },
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let view = Mat4::look_at_lh(Self::LIGHT_POSITION, Vec3::ZERO, Vec3::Y);
        let projection = Mat4::orthographic_lh(-5.0, 5.0, -5.0, 5.0, 0.1, 100.0);

        Self {
            depth_texture,
            depth_view,
            pipeline,
            light_buffer,
            light_bind_group,
            caster_buffer,
            caster_bind_group,
            caster_stride,
            sample_bind_group,
            view,
            projection,
        }
    }

    /// Depth texture and comparison sampler, laid out for group 3 of the lit program.
    pub fn sample_bind_group(&self) -> &wgpu::BindGroup {
        &self.sample_bind_group
    }

    /// Light view matrix.
    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// Clear the map and render the casters' depth into it.
    pub fn render(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        resources: &Resources,
        casters: &[&GameEntity],
    ) {
        if casters.len() > MAX_CASTERS {
            log::warn!(
                "{} shadow casters requested, only the first {} are drawn",
                casters.len(),
                MAX_CASTERS
            );
        }
        let casters = &casters[..casters.len().min(MAX_CASTERS)];

        let light = LightUniforms {
            view_projection: (self.projection * self.view).to_cols_array_2d(),
        };
        gpu.queue
            .write_buffer(&self.light_buffer, 0, bytemuck::bytes_of(&light));
        for (slot, caster) in casters.iter().enumerate() {
            let uniforms = CasterUniforms {
                world: caster.world_matrix().to_cols_array_2d(),
            };
            gpu.queue.write_buffer(
                &self.caster_buffer,
                slot as u64 * self.caster_stride,
                bytemuck::bytes_of(&uniforms),
            );
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.light_bind_group, &[]);
        for (slot, caster) in casters.iter().enumerate() {
            let mesh = resources.mesh(caster.mesh);
            pass.set_bind_group(
                1,
                &self.caster_bind_group,
                &[(slot as u64 * self.caster_stride) as u32],
            );
            mesh.bind(&mut pass);
            pass.draw_indexed(0..mesh.index_count(), 0, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light_matrix() -> Mat4 {
        let view = Mat4::look_at_lh(ShadowMap::LIGHT_POSITION, Vec3::ZERO, Vec3::Y);
        let projection = Mat4::orthographic_lh(-5.0, 5.0, -5.0, 5.0, 0.1, 100.0);
        projection * view
    }

    #[test]
    fn origin_projects_inside_the_map() {
        let clip = light_matrix().project_point3(Vec3::ZERO);
        assert!(clip.x.abs() < 1e-5 && clip.y.abs() < 1e-5);
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }

    #[test]
    fn player_start_is_covered() {
        let clip = light_matrix().project_point3(Vec3::new(0.0, -1.6, 0.0));
        assert!(clip.x.abs() <= 1.0 && clip.y.abs() <= 1.0);
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }
}
