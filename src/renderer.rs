//! Entity shader-binding protocol for the main geometry pass.
//!
//! The renderer owns the bind group layouts every lit program shares:
//!
//! - **Group 0**: frame uniforms (camera and light matrices, camera position, lights)
//! - **Group 1**: entity uniforms (world matrix, normal matrix, tint), one aligned
//!   slot per drawn entity, selected with a dynamic offset
//! - **Group 2**: material (albedo map, normal map, sampler)
//! - **Group 3**: shadow map (depth texture, comparison sampler)
//!
//! Per frame the caller runs [`Renderer::prepare`] once with the ordered entity list,
//! then, inside the pass, [`Renderer::bind`] for each entity followed by its own
//! `draw_indexed` call.

use glam::{Mat4, Vec3};

use crate::camera::Camera;
use crate::entity::GameEntity;
use crate::gpu::{DEPTH_FORMAT, GpuContext, HDR_FORMAT};
use crate::lighting::{DirectionalLight, Lighting};
use crate::mesh::Vertex;
use crate::resources::Resources;

/// Uniforms shared by every entity drawn in a frame.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub light_view: [[f32; 4]; 4],
    pub light_projection: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub lights: [DirectionalLight; 2],
}

/// Per-entity uniforms.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EntityUniforms {
    pub world: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    /// RGB tint and opacity.
    pub tint: [f32; 4],
}

impl EntityUniforms {
    pub fn from_entity(entity: &GameEntity) -> Self {
        let world = entity.world_matrix();
        Self {
            world: world.to_cols_array_2d(),
            normal_matrix: world.inverse().transpose().to_cols_array_2d(),
            tint: [1.0, 1.0, 1.0, entity.opacity],
        }
    }
}

/// Round `size` up to the next multiple of `alignment`.
pub(crate) fn aligned_stride(size: u64, alignment: u64) -> u64 {
    size.div_ceil(alignment) * alignment
}

/// A compiled vertex/fragment program for lit meshes.
#[derive(Debug)]
pub struct ShaderProgram {
    pub(crate) pipeline: wgpu::RenderPipeline,
}

/// Owner of the shared bind group layouts and the per-frame uniform buffers.
///
/// Materials and programs are built against its layouts, so create it before
/// loading any material.
///
/// # Example
///
/// ```ignore
/// let mut renderer = Renderer::new(&gpu);
/// let program = renderer.create_program(&gpu, "Lit", include_str!("shaders/mesh.wgsl"));
///
/// // Once per frame, with every entity in draw order
/// renderer.prepare(&gpu, &camera, &lighting, light_view, light_projection, &entities);
///
/// // In the pass, the slot is the entity's index in that list
/// for (slot, entity) in entities.iter().enumerate() {
///     let count = renderer.bind(&mut pass, slot, entity, &resources, shadow_bind_group);
///     pass.draw_indexed(0..count, 0, 0..1);
/// }
/// ```
pub struct Renderer {
    frame_layout: wgpu::BindGroupLayout,
    entity_layout: wgpu::BindGroupLayout,
    material_layout: wgpu::BindGroupLayout,
    shadow_layout: wgpu::BindGroupLayout,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    entity_buffer: wgpu::Buffer,
    entity_bind_group: wgpu::BindGroup,
    entity_stride: u64,
    entity_capacity: usize,
    material_sampler: wgpu::Sampler,
}

impl Renderer {
    const INITIAL_ENTITY_CAPACITY: usize = 16;

    pub fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let uniform_entry = |dynamic: bool| wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: dynamic,
                min_binding_size: None,
            },
            count: None,
        };

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[uniform_entry(false)],
        });

        let entity_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Entity Bind Group Layout"),
            entries: &[uniform_entry(true)],
        });

        let color_texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material Bind Group Layout"),
            entries: &[
                color_texture_entry(0),
                color_texture_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let entity_stride = aligned_stride(
            std::mem::size_of::<EntityUniforms>() as u64,
            gpu.uniform_alignment(),
        );
        let (entity_buffer, entity_bind_group) =
            Self::create_entity_slots(gpu, &entity_layout, entity_stride, Self::INITIAL_ENTITY_CAPACITY);

        let material_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            frame_layout,
            entity_layout,
            material_layout,
            shadow_layout,
            frame_buffer,
            frame_bind_group,
            entity_buffer,
            entity_bind_group,
            entity_stride,
            entity_capacity: Self::INITIAL_ENTITY_CAPACITY,
            material_sampler,
        }
    }

    fn create_entity_slots(
        gpu: &GpuContext,
        layout: &wgpu::BindGroupLayout,
        stride: u64,
        capacity: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Entity Uniforms"),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Entity Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<EntityUniforms>() as u64),
                }),
            }],
        });

        (buffer, bind_group)
    }

    pub fn material_layout(&self) -> &wgpu::BindGroupLayout {
        &self.material_layout
    }

    pub fn shadow_layout(&self) -> &wgpu::BindGroupLayout {
        &self.shadow_layout
    }

    pub fn material_sampler(&self) -> &wgpu::Sampler {
        &self.material_sampler
    }

    /// Compile a lit program from WGSL with `vs_main`/`fs_main` entry points.
    ///
    /// The program renders into the HDR scene target with alpha blending, back-face
    /// culling (clockwise front faces) and a `Less` depth test.
    pub fn create_program(&self, gpu: &GpuContext, label: &str, source: &str) -> ShaderProgram {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[
                &self.frame_layout,
                &self.entity_layout,
                &self.material_layout,
                &self.shadow_layout,
            ],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&layout),
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
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
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
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        ShaderProgram { pipeline }
    }

    /// Upload the frame uniforms and one entity slot per entry of `entities`.
    ///
    /// Slot `i` belongs to `entities[i]`; pass the same index to [`bind`](Self::bind).
    pub fn prepare(
        &mut self,
        gpu: &GpuContext,
        camera: &Camera,
        lighting: &Lighting,
        light_view: Mat4,
        light_projection: Mat4,
        entities: &[&GameEntity],
    ) {
        let position: Vec3 = camera.position;
        let frame = FrameUniforms {
            view: camera.view().to_cols_array_2d(),
            projection: camera.projection().to_cols_array_2d(),
            light_view: light_view.to_cols_array_2d(),
            light_projection: light_projection.to_cols_array_2d(),
            camera_position: [position.x, position.y, position.z, 1.0],
            lights: lighting.lights,
        };
        gpu.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&frame));

        if entities.len() > self.entity_capacity {
            let capacity = entities.len().next_power_of_two();
            log::debug!("Growing entity uniform slots to {}", capacity);
            let (buffer, bind_group) =
                Self::create_entity_slots(gpu, &self.entity_layout, self.entity_stride, capacity);
            self.entity_buffer = buffer;
            self.entity_bind_group = bind_group;
            self.entity_capacity = capacity;
        }

        for (slot, entity) in entities.iter().enumerate() {
            let uniforms = EntityUniforms::from_entity(entity);
            gpu.queue.write_buffer(
                &self.entity_buffer,
                slot as u64 * self.entity_stride,
                bytemuck::bytes_of(&uniforms),
            );
        }
    }

    /// Bind everything `entity` needs for its draw: mesh buffers, the material's
    /// program, frame and entity uniforms, material textures and the shadow map.
    ///
    /// Returns the index count; the caller issues `draw_indexed(0..count, 0, 0..1)`.
    pub fn bind(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        slot: usize,
        entity: &GameEntity,
        resources: &Resources,
        shadow_bind_group: &wgpu::BindGroup,
    ) -> u32 {
        let mesh = resources.mesh(entity.mesh);
        let material = resources.material(entity.material);
        let program = resources.program(material.program());

        pass.set_pipeline(&program.pipeline);
        mesh.bind(pass);
        pass.set_bind_group(0, &self.frame_bind_group, &[]);
        pass.set_bind_group(
            1,
            &self.entity_bind_group,
            &[(slot as u64 * self.entity_stride) as u32],
        );
        pass.set_bind_group(2, &material.bind_group, &[]);
        pass.set_bind_group(3, shadow_bind_group, &[]);

        mesh.index_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_layouts_match_wgsl() {
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 4 * 64 + 16 + 2 * 48);
        assert_eq!(std::mem::size_of::<EntityUniforms>(), 144);
    }

    #[test]
    fn stride_rounds_up_to_alignment() {
        assert_eq!(aligned_stride(144, 256), 256);
        assert_eq!(aligned_stride(256, 256), 256);
        assert_eq!(aligned_stride(257, 256), 512);
    }
}
