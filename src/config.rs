//! Window and game configuration.
//!
//! [`AppConfig`] is built in code with a fluent API. [`GameConfig`] holds every
//! gameplay tunable and the asset catalog, and can be read from a TOML file where
//! every field is optional.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Configuration for the app window.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub game: GameConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Skybounce".to_string(),
            width: 1280,
            height: 720,
            game: GameConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn game(mut self, game: GameConfig) -> Self {
        self.game = game;
        self
    }
}

/// Gameplay tunables, emitter tuning and asset locations.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub course: CourseConfig,
    pub emitter: EmitterConfig,
    pub bloom: BloomConfig,
    pub assets: AssetConfig,
    /// Fixed seed for platform lane selection. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl GameConfig {
    /// Parse a config from TOML text. Missing fields keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a config file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

/// Platform course and player physics.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CourseConfig {
    /// Starting z of each platform; its length is the platform count.
    pub platform_start_z: Vec<f32>,
    pub platform_y: f32,
    pub platform_scale: [f32; 3],
    pub platform_half_width: f32,
    /// Platforms whose z drops below this are recycled.
    pub recycle_z: f32,
    /// Recycled platforms reappear at this z.
    pub spawn_z: f32,
    /// Allowed x positions for recycled platforms.
    pub lanes: Vec<f32>,
    pub scroll_speed: f32,
    pub player_start: [f32; 3],
    pub player_scale: f32,
    pub player_half_width: f32,
    pub strafe_speed: f32,
    pub gravity: f32,
    pub launch_speed: f32,
    /// The landing check only runs below this height.
    pub landing_y: f32,
    /// Round-robin index of the first platform the player must land on.
    pub first_target: usize,
    /// `(score threshold, multiplier)` pairs; the multiplier applies once the
    /// score is strictly above the threshold.
    pub speed_steps: Vec<(u32, f32)>,
    /// Distance over which platforms fade in after spawning.
    pub fade_distance: f32,
}

impl Default for CourseConfig {
    fn default() -> Self {
        Self {
            platform_start_z: vec![0.0, 2.0, 4.0, 6.0, 8.0],
            platform_y: -2.0,
            platform_scale: [1.0, 0.3, 1.0],
            platform_half_width: 0.5,
            recycle_z: -2.0,
            spawn_z: 8.0,
            lanes: vec![0.0, 1.0, 2.0],
            scroll_speed: 2.0,
            player_start: [0.0, -1.6, 0.0],
            player_scale: 0.5,
            player_half_width: 0.35,
            strafe_speed: 2.0,
            gravity: 20.0,
            launch_speed: 10.0,
            landing_y: -1.6,
            first_target: 1,
            speed_steps: vec![(5, 1.2), (10, 1.4), (20, 1.6), (40, 1.8), (80, 2.0)],
            fade_distance: 2.0,
        }
    }
}

/// Particle emitter tuning.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    pub max_particles: usize,
    pub particles_per_second: f32,
    pub lifetime: f32,
    pub start_size: f32,
    pub end_size: f32,
    pub start_color: [f32; 4],
    pub end_color: [f32; 4],
    pub start_velocity: [f32; 3],
    /// Per-axis random spread added to the start velocity.
    pub velocity_spread: [f32; 3],
    pub acceleration: [f32; 3],
    /// Particles spawned on each landing.
    pub burst_count: usize,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            max_particles: 256,
            particles_per_second: 20.0,
            lifetime: 1.2,
            start_size: 0.12,
            end_size: 0.02,
            start_color: [2.0, 1.6, 0.6, 1.0],
            end_color: [1.0, 0.2, 0.1, 0.0],
            start_velocity: [0.0, 0.5, -1.0],
            velocity_spread: [0.6, 0.4, 0.6],
            acceleration: [0.0, -2.0, 0.0],
            burst_count: 24,
        }
    }
}

/// Bloom post-process tuning.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BloomConfig {
    /// Luminance above which the bright pass keeps a pixel.
    pub threshold: f32,
    /// Blur radius in steps of one half-resolution texel.
    pub blur_amount: f32,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            blur_amount: 3.0,
        }
    }
}

/// Asset catalog and search directories.
///
/// Paths are relative to `primary_dir`, with a single retry against
/// `fallback_dir`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub primary_dir: PathBuf,
    pub fallback_dir: PathBuf,
    pub sphere_mesh: String,
    pub platform_mesh: String,
    pub sky_mesh: String,
    pub sphere_albedo: String,
    pub sphere_normal: String,
    pub tile_albedo: String,
    pub tile_normal: String,
    pub tile_alt_albedo: String,
    pub tile_alt_normal: String,
    pub sky_day: String,
    pub sky_dusk: String,
    pub play_button: String,
    pub quit_button: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            primary_dir: PathBuf::from("assets"),
            fallback_dir: PathBuf::from("."),
            sphere_mesh: "models/sphere.obj".to_string(),
            platform_mesh: "models/cube.obj".to_string(),
            sky_mesh: "models/cube.obj".to_string(),
            sphere_albedo: "textures/cobble.png".to_string(),
            sphere_normal: "textures/flat_normal.png".to_string(),
            tile_albedo: "textures/tile_basecolor.png".to_string(),
            tile_normal: "textures/tile_normal.png".to_string(),
            tile_alt_albedo: "textures/tile_alt_basecolor.png".to_string(),
            tile_alt_normal: "textures/tile_normal.png".to_string(),
            sky_day: "textures/sky_day.dds".to_string(),
            sky_dusk: "textures/sky_dusk".to_string(),
            play_button: "textures/play_panel.png".to_string(),
            quit_button: "textures/quit_panel.png".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = GameConfig::from_toml_str("").unwrap();
        assert_eq!(config.course.platform_start_z.len(), 5);
        assert_eq!(config.course.gravity, 20.0);
        assert_eq!(config.assets.primary_dir, PathBuf::from("assets"));
        assert_eq!(config.bloom.blur_amount, 3.0);
        assert!(config.seed.is_none());
    }

    #[test]
    fn default_config_uses_each_section_default() {
        let config = GameConfig::default();
        assert_eq!(config.course.speed_steps, CourseConfig::default().speed_steps);
        assert_eq!(config.emitter.max_particles, EmitterConfig::default().max_particles);
        assert_eq!(config.bloom.threshold, 1.0);
        assert_eq!(config.assets.sky_dusk, "textures/sky_dusk");
        assert!(config.seed.is_none());
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let text = r#"
            seed = 7

            [course]
            gravity = 15.0
            lanes = [-1.0, 0.0, 1.0]

            [assets]
            primary_dir = "data"
        "#;
        let config = GameConfig::from_toml_str(text).unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.course.gravity, 15.0);
        assert_eq!(config.course.lanes, vec![-1.0, 0.0, 1.0]);
        assert_eq!(config.course.launch_speed, 10.0);
        assert_eq!(config.assets.primary_dir, PathBuf::from("data"));
        assert_eq!(config.assets.sphere_mesh, "models/sphere.obj");
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let err = GameConfig::from_toml_str("[course\ngravity = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn app_config_builder() {
        let config = AppConfig::new().title("Test").size(640, 480);
        assert_eq!(config.title, "Test");
        assert_eq!((config.width, config.height), (640, 480));
    }
}
