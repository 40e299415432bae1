//! Particle emitter and its billboard pass.
//!
//! [`Emitter`] is pure CPU state: a fixed-capacity ring of particles that all share
//! one lifetime, so the oldest particle is always at the front of the ring and dies
//! first. [`ParticlePass`] uploads the live particles as instances and draws each
//! one as a camera-facing quad with additive blending.

use glam::{Vec3, Vec4};
use rand::Rng;
use rand::rngs::StdRng;

use crate::camera::Camera;
use crate::config::EmitterConfig;
use crate::gpu::{DEPTH_FORMAT, GpuContext, HDR_FORMAT};

#[derive(Clone, Copy, Debug, Default)]
struct Particle {
    age: f32,
    max_age: f32,
    start_position: Vec3,
    start_velocity: Vec3,
}

impl Particle {
    fn alive(&self) -> bool {
        self.age < self.max_age
    }
}

/// One particle as drawn: world position, quad size and color.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParticleInstance {
    pub position: [f32; 3],
    pub size: f32,
    pub color: [f32; 4],
}

impl ParticleInstance {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<ParticleInstance>() as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x4,
            },
            wgpu::VertexAttribute {
                offset: 16,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x4,
            },
        ],
    };
}

/// Fixed-capacity particle pool with time-accumulated emission.
pub struct Emitter {
    particles: Vec<Particle>,
    first_alive: usize,
    live_count: usize,
    accumulator: f32,
    /// Where new particles start.
    pub position: Vec3,
    /// Whether `update` spawns particles continuously.
    pub emitting: bool,
    config: EmitterConfig,
    rng: StdRng,
}

impl Emitter {
    pub fn new(config: &EmitterConfig, rng: StdRng) -> Self {
        Self {
            particles: vec![Particle::default(); config.max_particles],
            first_alive: 0,
            live_count: 0,
            accumulator: 0.0,
            position: Vec3::ZERO,
            emitting: true,
            config: config.clone(),
            rng,
        }
    }

    pub fn capacity(&self) -> usize {
        self.particles.len()
    }

    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// Drop every particle and the emission remainder.
    pub fn clear(&mut self) {
        self.first_alive = 0;
        self.live_count = 0;
        self.accumulator = 0.0;
    }

    /// Age live particles, retire dead ones, then emit for this step.
    pub fn update(&mut self, dt: f32) {
        let capacity = self.capacity();
        for i in 0..self.live_count {
            let slot = (self.first_alive + i) % capacity;
            self.particles[slot].age += dt;
        }

        while self.live_count > 0 && !self.particles[self.first_alive].alive() {
            self.first_alive = (self.first_alive + 1) % capacity;
            self.live_count -= 1;
        }

        if self.emitting {
            self.accumulator += self.config.particles_per_second * dt;
            while self.accumulator >= 1.0 {
                self.spawn();
                self.accumulator -= 1.0;
            }
        }
    }

    /// Spawn `count` particles at `position` immediately.
    pub fn burst(&mut self, position: Vec3, count: usize) {
        let previous = self.position;
        self.position = position;
        for _ in 0..count {
            self.spawn();
        }
        self.position = previous;
    }

    /// Take the slot after the newest live particle. A full pool drops the spawn.
    fn spawn(&mut self) -> bool {
        let capacity = self.capacity();
        if self.live_count == capacity {
            return false;
        }

        let spread = Vec3::from(self.config.velocity_spread);
        let jitter = Vec3::new(
            self.rng.gen_range(-1.0..=1.0),
            self.rng.gen_range(-1.0..=1.0),
            self.rng.gen_range(-1.0..=1.0),
        ) * spread;

        let slot = (self.first_alive + self.live_count) % capacity;
        self.particles[slot] = Particle {
            age: 0.0,
            max_age: self.config.lifetime,
            start_position: self.position,
            start_velocity: Vec3::from(self.config.start_velocity) + jitter,
        };
        self.live_count += 1;
        true
    }

    /// Instances for every live particle, oldest first.
    pub fn instances(&self) -> Vec<ParticleInstance> {
        let capacity = self.capacity();
        let acceleration = Vec3::from(self.config.acceleration);
        let start_color = Vec4::from(self.config.start_color);
        let end_color = Vec4::from(self.config.end_color);

        (0..self.live_count)
            .map(|i| &self.particles[(self.first_alive + i) % capacity])
            .filter(|p| p.alive())
            .map(|p| {
                let t = p.age / p.max_age;
                let position =
                    p.start_position + p.start_velocity * p.age + 0.5 * acceleration * p.age * p.age;
                let size = self.config.start_size + (self.config.end_size - self.config.start_size) * t;
                ParticleInstance {
                    position: position.into(),
                    size,
                    color: start_color.lerp(end_color, t).into(),
                }
            })
            .collect()
    }
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct ParticleUniforms {
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
}

/// Draws an emitter's live particles as additive billboards.
pub struct ParticlePass {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    instance_buffer: wgpu::Buffer,
    capacity: usize,
    instance_count: u32,
}

impl ParticlePass {
    pub fn new(gpu: &GpuContext, capacity: usize) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Particle Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/particle.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Uniforms"),
            size: std::mem::size_of::<ParticleUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Bind Group Layout"),
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

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Bind Group"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Instances"),
            size: (capacity.max(1) * std::mem::size_of::<ParticleInstance>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let additive = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::Zero,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Particle Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[ParticleInstance::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: HDR_FORMAT,
                    blend: Some(additive),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Less,
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
            instance_buffer,
            capacity,
            instance_count: 0,
        }
    }

    /// Upload camera matrices and the emitter's live particles.
    pub fn prepare(&mut self, gpu: &GpuContext, camera: &Camera, emitter: &Emitter) {
        let uniforms = ParticleUniforms {
            view: camera.view().to_cols_array_2d(),
            projection: camera.projection().to_cols_array_2d(),
        };
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let mut instances = emitter.instances();
        instances.truncate(self.capacity);
        if !instances.is_empty() {
            gpu.queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }
        self.instance_count = instances.len() as u32;
    }

    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>) {
        if self.instance_count == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.instance_buffer.slice(..));
        pass.draw(0..6, 0..self.instance_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn emitter(config: EmitterConfig) -> Emitter {
        Emitter::new(&config, StdRng::seed_from_u64(1))
    }

    fn quiet_config() -> EmitterConfig {
        EmitterConfig {
            max_particles: 4,
            particles_per_second: 0.0,
            lifetime: 1.0,
            velocity_spread: [0.0; 3],
            ..EmitterConfig::default()
        }
    }

    #[test]
    fn pool_never_exceeds_capacity() {
        let mut e = emitter(EmitterConfig {
            max_particles: 4,
            particles_per_second: 1000.0,
            ..EmitterConfig::default()
        });
        e.update(0.5);
        assert_eq!(e.live_count(), 4);
        e.burst(Vec3::ZERO, 10);
        assert_eq!(e.live_count(), 4);
        assert!(e.instances().len() <= e.capacity());
    }

    #[test]
    fn fractional_emission_carries_over() {
        let mut e = emitter(EmitterConfig {
            max_particles: 16,
            particles_per_second: 10.0,
            lifetime: 100.0,
            ..EmitterConfig::default()
        });
        for _ in 0..3 {
            e.update(0.04);
        }
        assert_eq!(e.live_count(), 1);
    }

    #[test]
    fn dead_particles_are_never_drawn() {
        let mut e = emitter(quiet_config());
        e.burst(Vec3::ZERO, 3);
        assert_eq!(e.instances().len(), 3);
        e.update(1.0);
        assert_eq!(e.live_count(), 0);
        assert!(e.instances().is_empty());
    }

    #[test]
    fn slots_are_recycled_after_death() {
        let mut e = emitter(quiet_config());
        e.burst(Vec3::ZERO, 4);
        e.update(1.5);
        e.burst(Vec3::ONE, 4);
        assert_eq!(e.live_count(), 4);
        assert!(e.instances().iter().all(|p| p.position == [1.0, 1.0, 1.0]));
    }

    #[test]
    fn attributes_interpolate_over_lifetime() {
        let mut e = emitter(EmitterConfig {
            start_size: 1.0,
            end_size: 0.0,
            start_color: [1.0, 1.0, 1.0, 1.0],
            end_color: [0.0, 0.0, 0.0, 0.0],
            start_velocity: [1.0, 0.0, 0.0],
            acceleration: [0.0, -2.0, 0.0],
            ..quiet_config()
        });
        e.burst(Vec3::ZERO, 1);
        e.update(0.5);
        let p = e.instances()[0];
        assert!((p.size - 0.5).abs() < 1e-6);
        assert!((p.color[3] - 0.5).abs() < 1e-6);
        // x = v t, y = a t^2 / 2
        assert!((p.position[0] - 0.5).abs() < 1e-6);
        assert!((p.position[1] + 0.25).abs() < 1e-6);
    }

    #[test]
    fn instance_is_two_vec4s() {
        assert_eq!(std::mem::size_of::<ParticleInstance>(), 32);
    }
}
