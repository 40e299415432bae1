//! Error types for skybounce.
//!
//! Every external-resource load returns a typed result. Initialization fails fast
//! with one of these instead of carrying on with missing resources.

use std::path::PathBuf;

use thiserror::Error;

use crate::geometry::GeometryError;

/// Convenience alias used by fallible top-level APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for running the game.
#[derive(Error, Debug)]
pub enum Error {
    /// GPU setup failed.
    #[error(transparent)]
    Gpu(#[from] GpuError),

    /// An asset could not be loaded.
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// The configuration file could not be read.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The windowing system refused to create a window.
    #[error("Window creation failed: {0}")]
    Window(#[from] winit::error::OsError),

    /// The event loop failed.
    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

/// Failures while bringing up the wgpu device.
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("Failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("Failed to find a suitable GPU adapter: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),

    #[error("Failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("Surface reports no supported formats")]
    NoSurfaceFormat,
}

/// Failures while resolving or decoding an asset file.
#[derive(Error, Debug)]
pub enum AssetError {
    /// The file was not found in the primary or the fallback directory.
    #[error("Asset '{name}' not found (tried {tried:?})")]
    NotFound { name: String, tried: Vec<PathBuf> },

    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image decode error in {path:?}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Geometry error in {path:?}: {source}")]
    Geometry {
        path: PathBuf,
        #[source]
        source: GeometryError,
    },

    #[error("Cube map error in {path:?}: {message}")]
    CubeMap { path: PathBuf, message: String },

    #[error("Unsupported asset format '{extension}' for {path:?}")]
    UnsupportedFormat { path: PathBuf, extension: String },
}

/// Failures while loading `GameConfig` from TOML.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
