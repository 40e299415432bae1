//! The game: owns every resource and pass, runs update and draw each frame.

use glam::{Quat, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use winit::event::MouseButton;
use winit::keyboard::KeyCode;

use crate::assets::AssetLocator;
use crate::camera::Camera;
use crate::config::GameConfig;
use crate::entity::GameEntity;
use crate::error::Result;
use crate::gameplay::{Controls, Course};
use crate::gpu::GpuContext;
use crate::input::{EdgeTrigger, Input};
use crate::lighting::Lighting;
use crate::material::Material;
use crate::mesh::Mesh;
use crate::particles::{Emitter, ParticlePass};
use crate::post_process::PostProcessChain;
use crate::renderer::Renderer;
use crate::resources::{MaterialId, ProgramId, Resources, TextureId};
use crate::shadow::ShadowMap;
use crate::sky::{SkyBlend, SkyPass};
use crate::sprites::{ClickRegion, SpriteId, SpritePass};
use crate::state::{GameState, StateEvent};
use crate::texture::{CubeTexture, Texture};

/// Radians of camera rotation per pixel of mouse drag.
const DRAG_SENSITIVITY: f32 = 0.005;

/// Camera travel per wheel line.
const WHEEL_STEP: f32 = 0.5;

/// Vertical distance between the centers of the play and quit panels.
const MENU_SPACING: f32 = 200.0;

struct MenuLayout {
    play_sprite: SpriteId,
    quit_sprite: SpriteId,
    play_center: Vec2,
    quit_center: Vec2,
    play_region: ClickRegion,
    quit_region: ClickRegion,
}

impl MenuLayout {
    fn arrange(&mut self, sprites: &SpritePass, width: u32, height: u32) {
        let center = Vec2::new(width as f32 / 2.0, height as f32 / 2.0);
        self.play_center = center;
        self.quit_center = center + Vec2::new(0.0, MENU_SPACING);
        self.play_region = ClickRegion::centered(self.play_center, sprites.size(self.play_sprite));
        self.quit_region = ClickRegion::centered(self.quit_center, sprites.size(self.quit_sprite));
    }

    /// The menu event for a click at `point`, if it hit a panel.
    fn hit(&self, point: Vec2) -> Option<StateEvent> {
        if self.play_region.contains(point) {
            Some(StateEvent::PlayClicked)
        } else if self.quit_region.contains(point) {
            Some(StateEvent::QuitClicked)
        } else {
            None
        }
    }
}

/// Whether the player's trail emits in `state`.
///
/// Pause only freezes the course; the trail keeps emitting on raw frame time.
fn trail_emitting(state: GameState) -> bool {
    state == GameState::GamePlay
}

struct EdgeKeys {
    escape: EdgeTrigger,
    pause: EdgeTrigger,
    restart: EdgeTrigger,
}

pub struct Game {
    resources: Resources,
    renderer: Renderer,
    shadow: ShadowMap,
    sky: SkyPass,
    sky_blend: SkyBlend,
    emitter: Emitter,
    particle_pass: ParticlePass,
    post: PostProcessChain,
    sprites: SpritePass,
    menu: MenuLayout,
    camera: Camera,
    lighting: Lighting,
    course: Course,
    player: GameEntity,
    platforms: Vec<GameEntity>,
    state: GameState,
    pending_event: Option<StateEvent>,
    keys: EdgeKeys,
    drag_origin: Option<Vec2>,
    burst_count: usize,
    /// Accumulated roll of the sphere about x, in radians.
    roll: f32,
    rng: StdRng,
}

fn load_texture(
    gpu: &GpuContext,
    locator: &AssetLocator,
    resources: &mut Resources,
    name: &str,
    format: wgpu::TextureFormat,
) -> Result<TextureId> {
    let image = locator.load_image(name)?;
    let texture = Texture::from_rgba(
        gpu,
        image.as_raw(),
        image.width(),
        image.height(),
        format,
        name,
    );
    Ok(resources.add_texture(texture))
}

fn load_cube(gpu: &GpuContext, locator: &AssetLocator, name: &str) -> Result<CubeTexture> {
    let faces = locator.load_cube_faces(name)?;
    Ok(CubeTexture::from_faces(gpu, &faces.data, faces.size, name))
}

#[allow(clippy::too_many_arguments)]
fn load_material(
    gpu: &GpuContext,
    locator: &AssetLocator,
    renderer: &Renderer,
    resources: &mut Resources,
    program: ProgramId,
    albedo: &str,
    normal: &str,
    label: &str,
) -> Result<MaterialId> {
    let albedo = load_texture(
        gpu,
        locator,
        resources,
        albedo,
        wgpu::TextureFormat::Rgba8UnormSrgb,
    )?;
    let normal = load_texture(gpu, locator, resources, normal, wgpu::TextureFormat::Rgba8Unorm)?;
    let material = Material::new(
        gpu,
        renderer.material_layout(),
        resources,
        program,
        albedo,
        normal,
        renderer.material_sampler(),
        label,
    );
    Ok(resources.add_material(material))
}

impl Game {
    /// Load every asset and create every pass. Any missing or malformed asset fails
    /// the whole initialization.
    pub fn new(gpu: &GpuContext, config: &GameConfig) -> Result<Self> {
        let locator = AssetLocator::from_config(&config.assets);
        let names = &config.assets;
        let mut resources = Resources::new();
        let renderer = Renderer::new(gpu);

        let sphere_mesh = resources.add_mesh(Mesh::from_geometry(
            gpu,
            &names.sphere_mesh,
            &locator.load_geometry(&names.sphere_mesh)?,
        ));
        let platform_mesh = resources.add_mesh(Mesh::from_geometry(
            gpu,
            &names.platform_mesh,
            &locator.load_geometry(&names.platform_mesh)?,
        ));
        let sky_mesh = resources.add_mesh(Mesh::from_geometry(
            gpu,
            &names.sky_mesh,
            &locator.load_geometry(&names.sky_mesh)?,
        ));

        let program = resources.add_program(renderer.create_program(
            gpu,
            "Lit Program",
            include_str!("shaders/mesh.wgsl"),
        ));

        let sphere_material = load_material(
            gpu,
            &locator,
            &renderer,
            &mut resources,
            program,
            &names.sphere_albedo,
            &names.sphere_normal,
            "Sphere Material",
        )?;
        let tile_material = load_material(
            gpu,
            &locator,
            &renderer,
            &mut resources,
            program,
            &names.tile_albedo,
            &names.tile_normal,
            "Tile Material",
        )?;
        let tile_alt_material = load_material(
            gpu,
            &locator,
            &renderer,
            &mut resources,
            program,
            &names.tile_alt_albedo,
            &names.tile_alt_normal,
            "Alternate Tile Material",
        )?;

        let sky_day = load_cube(gpu, &locator, &names.sky_day)?;
        let sky_dusk = load_cube(gpu, &locator, &names.sky_dusk)?;
        let sky = SkyPass::new(gpu, sky_mesh, &sky_day, &sky_dusk);

        let shadow = ShadowMap::new(gpu, renderer.shadow_layout());

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let emitter = Emitter::new(&config.emitter, StdRng::seed_from_u64(rng.r#gen()));
        let particle_pass = ParticlePass::new(gpu, emitter.capacity());

        let post = PostProcessChain::new(gpu, &config.bloom);

        let mut sprites = SpritePass::new(gpu);
        let srgb = wgpu::TextureFormat::Rgba8UnormSrgb;
        let play_texture = load_texture(gpu, &locator, &mut resources, &names.play_button, srgb)?;
        let quit_texture = load_texture(gpu, &locator, &mut resources, &names.quit_button, srgb)?;
        let play_sprite = sprites.add_sprite(gpu, resources.texture(play_texture));
        let quit_sprite = sprites.add_sprite(gpu, resources.texture(quit_texture));
        let mut menu = MenuLayout {
            play_sprite,
            quit_sprite,
            play_center: Vec2::ZERO,
            quit_center: Vec2::ZERO,
            play_region: ClickRegion::new(Vec2::ZERO, Vec2::ZERO),
            quit_region: ClickRegion::new(Vec2::ZERO, Vec2::ZERO),
        };
        menu.arrange(&sprites, gpu.width(), gpu.height());

        let course = Course::new(config.course.clone());

        let mut player = GameEntity::new(sphere_mesh, sphere_material);
        player.set_scale(Vec3::splat(course.config().player_scale));

        let platform_scale = Vec3::from_array(course.config().platform_scale);
        let platforms = (0..course.platforms().len())
            .map(|i| {
                let material = if i % 2 == 0 {
                    tile_material
                } else {
                    tile_alt_material
                };
                let mut platform = GameEntity::new(platform_mesh, material);
                platform.set_scale(platform_scale);
                platform
            })
            .collect();

        log::info!(
            "Loaded {} platforms, emitter capacity {}",
            course.platforms().len(),
            emitter.capacity()
        );

        let mut game = Self {
            resources,
            renderer,
            shadow,
            sky,
            sky_blend: SkyBlend::new(),
            emitter,
            particle_pass,
            post,
            sprites,
            menu,
            camera: Camera::new(Vec3::new(0.0, 0.0, -5.0), gpu.aspect()),
            lighting: Lighting::default(),
            course,
            player,
            platforms,
            state: GameState::default(),
            pending_event: None,
            keys: EdgeKeys {
                escape: EdgeTrigger::new(),
                pause: EdgeTrigger::new(),
                restart: EdgeTrigger::new(),
            },
            drag_origin: None,
            burst_count: config.emitter.burst_count,
            roll: 0.0,
            rng,
        };
        game.emitter.emitting = false;
        game.sync_entities();
        Ok(game)
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn score(&self) -> u32 {
        self.course.score()
    }

    fn transition(&mut self, event: StateEvent) {
        let next = self.state.next(event);
        if next != self.state {
            log::info!("{} -> {} ({:?})", self.state, next, event);
            self.state = next;
        }
    }

    /// Follow a new surface size.
    pub fn resize(&mut self, gpu: &GpuContext) {
        self.camera.update_projection_matrix(gpu.aspect());
        self.post.ensure_size(gpu);
        self.menu.arrange(&self.sprites, gpu.width(), gpu.height());
    }

    pub fn mouse_pressed(&mut self, button: MouseButton, position: Vec2) {
        if button != MouseButton::Left {
            return;
        }
        if self.state == GameState::MainMenu {
            if let Some(event) = self.menu.hit(position) {
                self.pending_event = Some(event);
            }
        }
        self.drag_origin = Some(position);
    }

    pub fn mouse_released(&mut self, button: MouseButton) {
        if button == MouseButton::Left {
            self.drag_origin = None;
        }
    }

    /// Rotate the camera while the left button is held.
    pub fn mouse_moved(&mut self, position: Vec2) {
        if let Some(origin) = self.drag_origin {
            let delta = (position - origin) * DRAG_SENSITIVITY;
            self.camera.rotate(delta.y, delta.x);
            self.drag_origin = Some(position);
        }
    }

    /// Dolly the camera along its view direction; positive lines move forward.
    pub fn mouse_wheel(&mut self, lines: f32) {
        self.camera.translate_relative(0.0, 0.0, lines * WHEEL_STEP);
    }

    /// Advance one frame of `dt` seconds.
    pub fn update(&mut self, dt: f32, input: &Input) {
        let escape = self.keys.escape.update(input.key_down(KeyCode::Escape));
        let pause = self.keys.pause.update(input.key_down(KeyCode::KeyP));
        let restart = self.keys.restart.update(
            input.key_down(KeyCode::Enter) || input.key_down(KeyCode::NumpadEnter),
        );

        if escape {
            self.transition(StateEvent::EscapePressed);
        }
        if let Some(event) = self.pending_event.take() {
            self.transition(event);
        }

        self.camera.update(dt, input);
        self.sky_blend.advance();

        match self.state {
            GameState::GamePlay => {
                if pause {
                    self.course.toggle_pause();
                }
                let controls = Controls {
                    left: input.key_down(KeyCode::KeyA),
                    right: input.key_down(KeyCode::KeyD),
                };
                let config = self.course.config();
                self.roll += self.course.time_scale(dt) * config.scroll_speed / config.player_scale;
                let outcome = self.course.step(dt, controls, &mut self.rng);
                if let Some(at) = outcome.landed {
                    self.emitter.burst(at, self.burst_count);
                }
                if outcome.fell {
                    log::info!("Fell with score {}", self.course.score());
                    self.transition(StateEvent::PlayerFell);
                }
            }
            GameState::GameOver => {
                if restart {
                    self.course.reset();
                    self.emitter.clear();
                    self.roll = 0.0;
                    self.transition(StateEvent::RestartPressed);
                }
            }
            GameState::MainMenu | GameState::Exit => {}
        }

        self.emitter.position = self.course.player();
        self.emitter.emitting = trail_emitting(self.state);
        self.emitter.update(dt);

        self.sync_entities();
        log::trace!(
            "frame {}: state {}, {} particles",
            self.sky_blend.frame(),
            self.state,
            self.emitter.live_count()
        );
    }

    /// Copy course positions into the entities and refresh their world matrices.
    fn sync_entities(&mut self) {
        self.player.set_position(self.course.player());
        self.player.set_rotation(Quat::from_rotation_x(self.roll));
        self.player.update_world_matrix();
        for (i, platform) in self.platforms.iter_mut().enumerate() {
            platform.set_position(self.course.platforms()[i]);
            platform.opacity = self.course.platform_opacity(i);
            platform.update_world_matrix();
        }
    }

    pub fn is_exit(&self) -> bool {
        self.state.is_exit()
    }

    /// Render one frame and present it.
    pub fn draw(&mut self, gpu: &GpuContext) -> std::result::Result<(), wgpu::SurfaceError> {
        let output = gpu.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        self.post.ensure_size(gpu);

        // Opaque first, then fading platforms far to near so they blend over the sky.
        let mut opaque: Vec<&GameEntity> = vec![&self.player];
        let mut fading: Vec<&GameEntity> = Vec::new();
        for platform in &self.platforms {
            if platform.opacity >= 1.0 {
                opaque.push(platform);
            } else if platform.opacity > 0.0 {
                fading.push(platform);
            }
        }
        fading.sort_by(|a, b| b.position().z.total_cmp(&a.position().z));
        let opaque_count = opaque.len();
        let entities: Vec<&GameEntity> = opaque.into_iter().chain(fading).collect();

        self.shadow
            .render(gpu, &mut encoder, &self.resources, &[&self.player]);
        self.renderer.prepare(
            gpu,
            &self.camera,
            &self.lighting,
            self.shadow.view(),
            self.shadow.projection(),
            &entities,
        );
        self.sky.prepare(gpu, &self.camera, self.sky_blend.lerp());
        self.particle_pass.prepare(gpu, &self.camera, &self.emitter);

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.post.scene_view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.post.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for (slot, entity) in entities.iter().enumerate() {
                if slot == opaque_count {
                    self.sky.render(&mut pass, &self.resources);
                }
                let count = self.renderer.bind(
                    &mut pass,
                    slot,
                    entity,
                    &self.resources,
                    self.shadow.sample_bind_group(),
                );
                pass.draw_indexed(0..count, 0, 0..1);
            }
            if entities.len() == opaque_count {
                self.sky.render(&mut pass, &self.resources);
            }
            self.particle_pass.render(&mut pass);
        }

        self.post.run(&mut encoder, &view);

        if self.state == GameState::MainMenu {
            self.sprites.clear();
            self.menu.play_region = self
                .sprites
                .draw_centered(self.menu.play_sprite, self.menu.play_center);
            self.menu.quit_region = self
                .sprites
                .draw_centered(self.menu.quit_sprite, self.menu.quit_center);

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Menu Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.sprites.render(gpu, &mut pass);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(play: ClickRegion, quit: ClickRegion) -> MenuLayout {
        MenuLayout {
            play_sprite: SpriteId(0),
            quit_sprite: SpriteId(1),
            play_center: Vec2::ZERO,
            quit_center: Vec2::ZERO,
            play_region: play,
            quit_region: quit,
        }
    }

    #[test]
    fn menu_hits_map_to_events() {
        let size = Vec2::new(200.0, 100.0);
        let menu = layout(
            ClickRegion::centered(Vec2::new(640.0, 360.0), size),
            ClickRegion::centered(Vec2::new(640.0, 560.0), size),
        );
        assert_eq!(
            menu.hit(Vec2::new(640.0, 360.0)),
            Some(StateEvent::PlayClicked)
        );
        assert_eq!(
            menu.hit(Vec2::new(540.0, 510.0)),
            Some(StateEvent::QuitClicked)
        );
        assert_eq!(menu.hit(Vec2::new(740.0, 560.0)), None);
        assert_eq!(menu.hit(Vec2::new(10.0, 10.0)), None);
    }

    #[test]
    fn pause_leaves_the_trail_emitting() {
        use crate::config::{CourseConfig, EmitterConfig};

        let mut course = Course::new(CourseConfig::default());
        let mut emitter = Emitter::new(
            &EmitterConfig {
                particles_per_second: 10.0,
                lifetime: 100.0,
                ..EmitterConfig::default()
            },
            StdRng::seed_from_u64(5),
        );
        course.toggle_pause();
        assert!(course.paused());
        assert_eq!(course.time_scale(0.5), 0.0);

        emitter.emitting = trail_emitting(GameState::GamePlay);
        emitter.update(0.5);
        assert_eq!(emitter.live_count(), 5);
    }

    #[test]
    fn trail_is_off_outside_gameplay() {
        assert!(trail_emitting(GameState::GamePlay));
        assert!(!trail_emitting(GameState::MainMenu));
        assert!(!trail_emitting(GameState::GameOver));
        assert!(!trail_emitting(GameState::Exit));
    }
}
