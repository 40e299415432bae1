//! Bloom post-process chain.
//!
//! The main pass renders into an off-screen HDR scene target. Four full-screen
//! passes then run in order, each a single 3-vertex triangle with no vertex or
//! index buffer:
//!
//! 1. bright pass: scene → bright target, keeping only pixels above the threshold
//! 2. horizontal blur: bright → h-blur target
//! 3. vertical blur: h-blur → v-blur target
//! 4. composite: scene + v-blur → swap-chain surface
//!
//! Every pass clears its target before drawing. All targets follow the window size
//! and are recreated by [`PostProcessChain::ensure_size`].

use crate::config::BloomConfig;
use crate::gpu::{DEPTH_FORMAT, GpuContext, HDR_FORMAT};

/// An off-screen texture that is rendered to and then sampled by a later pass.
pub struct RenderTarget {
    #[allow(dead_code)]
    texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl RenderTarget {
    /// Create a target matching the current surface size.
    pub fn new(gpu: &GpuContext, label: &str, format: wgpu::TextureFormat) -> Self {
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: gpu.width(),
                height: gpu.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width: gpu.width(),
            height: gpu.height(),
        }
    }

    fn matches(&self, gpu: &GpuContext) -> bool {
        self.width == gpu.width() && self.height == gpu.height()
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PostUniforms {
    /// UV distance between blur taps.
    pub texel_step: [f32; 2],
    pub blur_amount: f32,
    pub threshold: f32,
}

impl PostUniforms {
    /// Uniforms for the horizontal and vertical blur at the given surface size.
    ///
    /// Taps step one texel of a half-resolution image: `1 / (width / 2)` across and
    /// `1 / (height / 2)` down.
    pub fn blur_pair(width: u32, height: u32, settings: &BloomConfig) -> (Self, Self) {
        let horizontal = Self {
            texel_step: [1.0 / (width as f32 / 2.0), 0.0],
            blur_amount: settings.blur_amount,
            threshold: settings.threshold,
        };
        let vertical = Self {
            texel_step: [0.0, 1.0 / (height as f32 / 2.0)],
            blur_amount: settings.blur_amount,
            threshold: settings.threshold,
        };
        (horizontal, vertical)
    }
}

/// One full-screen pass: a pipeline reading `inputs` textures plus a uniform block.
struct FullscreenPass {
    label: &'static str,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl FullscreenPass {
    fn new(
        gpu: &GpuContext,
        label: &'static str,
        shader_source: &str,
        inputs: u32,
        target_format: wgpu::TextureFormat,
    ) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(shader_source.into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<PostUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Uniforms at 0, sampler at 1, inputs from 2.
        let mut entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ];
        for i in 0..inputs {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 2 + i,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
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

        Self {
            label,
            pipeline,
            uniform_buffer,
            bind_group_layout,
        }
    }

    fn create_bind_group(
        &self,
        gpu: &GpuContext,
        sampler: &wgpu::Sampler,
        inputs: &[&wgpu::TextureView],
    ) -> wgpu::BindGroup {
        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: self.uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ];
        for (i, view) in inputs.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }

        gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &self.bind_group_layout,
            entries: &entries,
        })
    }

    fn write_uniforms(&self, gpu: &GpuContext, uniforms: &PostUniforms) {
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    fn run(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        bind_group: &wgpu::BindGroup,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(self.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}

/// Window-sized targets, rebuilt together on resize.
struct ChainTargets {
    scene: RenderTarget,
    depth: RenderTarget,
    bright: RenderTarget,
    horizontal: RenderTarget,
    vertical: RenderTarget,
    bright_bind_group: wgpu::BindGroup,
    horizontal_bind_group: wgpu::BindGroup,
    vertical_bind_group: wgpu::BindGroup,
    composite_bind_group: wgpu::BindGroup,
}

/// Scene target, depth buffer and the four bloom passes.
///
/// The main pass draws into [`scene_view`](Self::scene_view) with
/// [`depth_view`](Self::depth_view) as its depth attachment; [`run`](Self::run) then
/// writes the bloomed frame to the surface.
///
/// # Example
///
/// ```ignore
/// let mut post = PostProcessChain::new(&gpu, &config.bloom);
///
/// // Each frame, after a possible resize
/// post.ensure_size(&gpu);
/// {
///     let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
///         color_attachments: &[Some(wgpu::RenderPassColorAttachment {
///             view: post.scene_view(),
///             // ...
///         })],
///         // ...
///     });
///     // draw the scene
/// }
/// post.run(&mut encoder, &surface_view);
/// ```
pub struct PostProcessChain {
    bright_pass: FullscreenPass,
    horizontal_pass: FullscreenPass,
    vertical_pass: FullscreenPass,
    composite_pass: FullscreenPass,
    sampler: wgpu::Sampler,
    settings: BloomConfig,
    targets: ChainTargets,
}

impl PostProcessChain {
    pub fn new(gpu: &GpuContext, settings: &BloomConfig) -> Self {
        let blur_source = include_str!("shaders/blur.wgsl");
        let bright_pass = FullscreenPass::new(
            gpu,
            "Bright Pass",
            include_str!("shaders/bright.wgsl"),
            1,
            HDR_FORMAT,
        );
        let horizontal_pass = FullscreenPass::new(gpu, "Horizontal Blur", blur_source, 1, HDR_FORMAT);
        let vertical_pass = FullscreenPass::new(gpu, "Vertical Blur", blur_source, 1, HDR_FORMAT);
        let composite_pass = FullscreenPass::new(
            gpu,
            "Bloom Composite",
            include_str!("shaders/composite.wgsl"),
            2,
            gpu.config.format,
        );

        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Post Process Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let targets = Self::create_targets(
            gpu,
            &sampler,
            [&bright_pass, &horizontal_pass, &vertical_pass, &composite_pass],
        );

        let chain = Self {
            bright_pass,
            horizontal_pass,
            vertical_pass,
            composite_pass,
            sampler,
            settings: settings.clone(),
            targets,
        };
        chain.write_uniforms(gpu);
        chain
    }

    fn create_targets(
        gpu: &GpuContext,
        sampler: &wgpu::Sampler,
        [bright_pass, horizontal_pass, vertical_pass, composite_pass]: [&FullscreenPass; 4],
    ) -> ChainTargets {
        let scene = RenderTarget::new(gpu, "Scene Target", HDR_FORMAT);
        let depth = RenderTarget::new(gpu, "Scene Depth", DEPTH_FORMAT);
        let bright = RenderTarget::new(gpu, "Bright Target", HDR_FORMAT);
        let horizontal = RenderTarget::new(gpu, "Horizontal Blur Target", HDR_FORMAT);
        let vertical = RenderTarget::new(gpu, "Vertical Blur Target", HDR_FORMAT);

        let bright_bind_group = bright_pass.create_bind_group(gpu, sampler, &[&scene.view]);
        let horizontal_bind_group = horizontal_pass.create_bind_group(gpu, sampler, &[&bright.view]);
        let vertical_bind_group =
            vertical_pass.create_bind_group(gpu, sampler, &[&horizontal.view]);
        let composite_bind_group =
            composite_pass.create_bind_group(gpu, sampler, &[&scene.view, &vertical.view]);

        ChainTargets {
            scene,
            depth,
            bright,
            horizontal,
            vertical,
            bright_bind_group,
            horizontal_bind_group,
            vertical_bind_group,
            composite_bind_group,
        }
    }

    fn write_uniforms(&self, gpu: &GpuContext) {
        let (horizontal, vertical) = PostUniforms::blur_pair(gpu.width(), gpu.height(), &self.settings);
        self.bright_pass.write_uniforms(gpu, &horizontal);
        self.horizontal_pass.write_uniforms(gpu, &horizontal);
        self.vertical_pass.write_uniforms(gpu, &vertical);
        self.composite_pass.write_uniforms(gpu, &vertical);
    }

    /// Recreate every target if the surface size changed. Returns whether it did.
    pub fn ensure_size(&mut self, gpu: &GpuContext) -> bool {
        if self.targets.scene.matches(gpu) {
            return false;
        }
        log::debug!(
            "Recreating post-process targets at {}x{}",
            gpu.width(),
            gpu.height()
        );
        self.targets = Self::create_targets(
            gpu,
            &self.sampler,
            [
                &self.bright_pass,
                &self.horizontal_pass,
                &self.vertical_pass,
                &self.composite_pass,
            ],
        );
        self.write_uniforms(gpu);
        true
    }

    /// HDR color target for the main pass.
    pub fn scene_view(&self) -> &wgpu::TextureView {
        &self.targets.scene.view
    }

    /// Depth buffer for the main pass.
    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.targets.depth.view
    }

    /// Run bright, blur and composite, writing the final image to `output`.
    pub fn run(&self, encoder: &mut wgpu::CommandEncoder, output: &wgpu::TextureView) {
        let t = &self.targets;
        self.bright_pass.run(encoder, &t.bright.view, &t.bright_bind_group);
        self.horizontal_pass
            .run(encoder, &t.horizontal.view, &t.horizontal_bind_group);
        self.vertical_pass
            .run(encoder, &t.vertical.view, &t.vertical_bind_group);
        self.composite_pass
            .run(encoder, output, &t.composite_bind_group);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blur_steps_use_half_resolution_texels() {
        let (h, v) = PostUniforms::blur_pair(1280, 720, &BloomConfig::default());
        assert_eq!(h.texel_step, [1.0 / 640.0, 0.0]);
        assert_eq!(v.texel_step, [0.0, 1.0 / 360.0]);
        assert_eq!(h.blur_amount, 3.0);
        assert_eq!(v.blur_amount, 3.0);
    }

    #[test]
    fn uniforms_fill_one_vec4() {
        assert_eq!(std::mem::size_of::<PostUniforms>(), 16);
    }
}
