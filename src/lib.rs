//! # Skybounce
//!
//! A sphere bounces across scrolling platforms under a blending skybox. The frame is
//! drawn in stages: a directional shadow map, the lit scene into an HDR target, sky
//! and additive particles, then a bloom chain onto the window surface.
//!
//! ```no_run
//! use skybounce::{AppConfig, GameConfig, run};
//!
//! fn main() -> skybounce::Result<()> {
//!     let game = GameConfig::from_file("skybounce.toml")?;
//!     run(AppConfig::new().title("Skybounce").size(1280, 720).game(game))
//! }
//! ```
//!
//! Everything that decides what happens ([`Course`], [`GameState`], [`Emitter`],
//! [`SkyBlend`], [`ClickRegion`]) is plain CPU state and can be driven without a GPU.

mod app;
mod assets;
mod camera;
mod config;
mod entity;
mod error;
mod game;
mod gameplay;
mod geometry;
mod gpu;
mod input;
mod lighting;
mod material;
mod mesh;
mod particles;
mod post_process;
mod renderer;
mod resources;
mod shadow;
mod sky;
mod sprites;
mod state;
mod texture;

pub use app::run;
pub use assets::{AssetLocator, CUBE_FACE_NAMES, CubeFaces};
pub use camera::Camera;
pub use config::{AppConfig, AssetConfig, BloomConfig, CourseConfig, EmitterConfig, GameConfig};
pub use entity::GameEntity;
pub use error::{AssetError, ConfigError, Error, GpuError, Result};
pub use game::Game;
pub use gameplay::{Controls, Course, StepOutcome, multiplier, overlaps};
pub use geometry::{GeometryError, RawGeometry};
pub use gpu::{DEPTH_FORMAT, GpuContext, HDR_FORMAT};
pub use input::{EdgeTrigger, Input};
pub use lighting::{DirectionalLight, Lighting};
pub use material::Material;
pub use mesh::{Mesh, Vertex};
pub use particles::{Emitter, ParticleInstance, ParticlePass};
pub use post_process::{PostProcessChain, PostUniforms, RenderTarget};
pub use renderer::{EntityUniforms, FrameUniforms, Renderer, ShaderProgram};
pub use resources::{MaterialId, MeshId, ProgramId, Resources, TextureId};
pub use shadow::{SHADOW_MAP_SIZE, ShadowMap};
pub use sky::{SkyBlend, SkyPass};
pub use sprites::{ClickRegion, SpriteId, SpritePass, SpriteVertex};
pub use state::{GameState, StateEvent};
pub use texture::{CubeTexture, Texture};

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

// Re-export commonly used winit types for convenience
pub use winit::event::MouseButton;
pub use winit::keyboard::KeyCode;
