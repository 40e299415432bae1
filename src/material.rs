use crate::gpu::GpuContext;
use crate::resources::{ProgramId, Resources, TextureId};

/// An immutable surface description: a shader program plus its albedo and normal
/// maps and the sampler they are read with.
///
/// The textures are bound once at construction into a bind group matching the
/// renderer's material layout (group 2). Materials are shared by handle.
#[derive(Debug)]
pub struct Material {
    program: ProgramId,
    albedo: TextureId,
    normal: TextureId,
    pub(crate) bind_group: wgpu::BindGroup,
}

impl Material {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gpu: &GpuContext,
        layout: &wgpu::BindGroupLayout,
        resources: &Resources,
        program: ProgramId,
        albedo: TextureId,
        normal: TextureId,
        sampler: &wgpu::Sampler,
        label: &str,
    ) -> Self {
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(resources.texture(albedo).view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(resources.texture(normal).view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        Self {
            program,
            albedo,
            normal,
            bind_group,
        }
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }

    pub fn albedo(&self) -> TextureId {
        self.albedo
    }

    pub fn normal_map(&self) -> TextureId {
        self.normal
    }
}
