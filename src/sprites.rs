//! Screen-space sprites for the menu panels, and their click regions.

use glam::Vec2;

use crate::gpu::GpuContext;
use crate::texture::Texture;

/// Axis-aligned screen rectangle in pixels, origin top-left.
///
/// A point is inside when `min <= p < max` on both axes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClickRegion {
    pub min: Vec2,
    pub max: Vec2,
}

impl ClickRegion {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Region of the given size centered on `center`.
    pub fn centered(center: Vec2, size: Vec2) -> Self {
        let half = size * 0.5;
        Self::new(center - half, center + half)
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x < self.max.x && point.y >= self.min.y && point.y < self.max.y
    }
}

/// Vertex for textured screen-space quads.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpriteVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

impl SpriteVertex {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<SpriteVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            },
            wgpu::VertexAttribute {
                offset: 8,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x2,
            },
            wgpu::VertexAttribute {
                offset: 16,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x4,
            },
        ],
    };
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct SpriteUniforms {
    resolution: [f32; 2],
    _padding: [f32; 2],
}

/// Handle to a texture registered with the [`SpritePass`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpriteId(pub(crate) usize);

struct SpriteSheet {
    bind_group: wgpu::BindGroup,
    size: Vec2,
}

const MAX_SPRITE_VERTICES: usize = 6 * 64;

/// Batched sprite drawing onto the swap-chain surface.
///
/// Call [`clear`](Self::clear) at the start of a frame, queue sprites with
/// [`draw_centered`](Self::draw_centered), then [`render`](Self::render) once in a
/// pass that loads the already-composited frame.
pub struct SpritePass {
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    sheets: Vec<SpriteSheet>,
    batches: Vec<(SpriteId, Vec<SpriteVertex>)>,
}

impl SpritePass {
    pub fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Sprite Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/sprite.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Sprite Uniforms"),
            size: std::mem::size_of::<SpriteUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sprite Uniform Layout"),
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

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Sprite Uniform Bind Group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sprite Texture Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Sprite Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Sprite Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Sprite Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[SpriteVertex::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Sprite Vertex Buffer"),
            size: (MAX_SPRITE_VERTICES * std::mem::size_of::<SpriteVertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            pipeline,
            vertex_buffer,
            uniform_buffer,
            uniform_bind_group,
            texture_layout,
            sampler,
            sheets: Vec::new(),
            batches: Vec::new(),
        }
    }

    /// Register a texture for sprite drawing. Sprites draw at the texture's pixel size.
    pub fn add_sprite(&mut self, gpu: &GpuContext, texture: &Texture) -> SpriteId {
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Sprite Bind Group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(texture.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        self.sheets.push(SpriteSheet {
            bind_group,
            size: Vec2::new(texture.width as f32, texture.height as f32),
        });
        SpriteId(self.sheets.len() - 1)
    }

    /// Pixel size of a registered sprite.
    pub fn size(&self, id: SpriteId) -> Vec2 {
        self.sheets[id.0].size
    }

    /// Drop all queued sprites.
    pub fn clear(&mut self) {
        self.batches.clear();
    }

    /// Queue a sprite centered at `center` and return the rectangle it covers.
    pub fn draw_centered(&mut self, id: SpriteId, center: Vec2) -> ClickRegion {
        let region = ClickRegion::centered(center, self.size(id));
        let color = [1.0, 1.0, 1.0, 1.0];
        let (min, max) = (region.min, region.max);
        let vertex = |x: f32, y: f32, u: f32, v: f32| SpriteVertex {
            position: [x, y],
            uv: [u, v],
            color,
        };

        let batch = match self.batches.iter().position(|(batch_id, _)| *batch_id == id) {
            Some(i) => i,
            None => {
                self.batches.push((id, Vec::new()));
                self.batches.len() - 1
            }
        };
        self.batches[batch].1.extend_from_slice(&[
            vertex(min.x, min.y, 0.0, 0.0),
            vertex(max.x, min.y, 1.0, 0.0),
            vertex(min.x, max.y, 0.0, 1.0),
            vertex(max.x, min.y, 1.0, 0.0),
            vertex(max.x, max.y, 1.0, 1.0),
            vertex(min.x, max.y, 0.0, 1.0),
        ]);
        region
    }

    /// Upload and draw every queued sprite.
    pub fn render(&self, gpu: &GpuContext, pass: &mut wgpu::RenderPass<'_>) {
        let uniforms = SpriteUniforms {
            resolution: [gpu.width() as f32, gpu.height() as f32],
            _padding: [0.0, 0.0],
        };
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));

        let mut offset = 0;
        for (id, vertices) in &self.batches {
            if offset + vertices.len() > MAX_SPRITE_VERTICES {
                log::warn!("Sprite vertex buffer full, dropping remaining sprites");
                break;
            }
            gpu.queue.write_buffer(
                &self.vertex_buffer,
                (offset * std::mem::size_of::<SpriteVertex>()) as u64,
                bytemuck::cast_slice(vertices),
            );
            pass.set_bind_group(1, &self.sheets[id.0].bind_group, &[]);
            pass.draw(offset as u32..(offset + vertices.len()) as u32, 0..1);
            offset += vertices.len();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_edge_is_inside_max_edge_is_not() {
        let region = ClickRegion::new(Vec2::new(10.0, 20.0), Vec2::new(110.0, 70.0));
        assert!(region.contains(Vec2::new(10.0, 20.0)));
        assert!(region.contains(Vec2::new(109.9, 69.9)));
        assert!(!region.contains(Vec2::new(110.0, 40.0)));
        assert!(!region.contains(Vec2::new(50.0, 70.0)));
        assert!(!region.contains(Vec2::new(9.9, 40.0)));
    }

    #[test]
    fn centered_region_spans_the_given_size() {
        let region = ClickRegion::centered(Vec2::new(640.0, 360.0), Vec2::new(200.0, 80.0));
        assert_eq!(region.min, Vec2::new(540.0, 320.0));
        assert_eq!(region.max, Vec2::new(740.0, 400.0));
    }

    #[test]
    fn menu_buttons_do_not_overlap() {
        let size = Vec2::new(256.0, 128.0);
        let play = ClickRegion::centered(Vec2::new(640.0, 360.0), size);
        let quit = ClickRegion::centered(Vec2::new(640.0, 560.0), size);
        assert!(play.contains(Vec2::new(640.0, 360.0)));
        assert!(!quit.contains(Vec2::new(640.0, 360.0)));
        assert!(quit.contains(Vec2::new(640.0, 560.0)));
    }
}
