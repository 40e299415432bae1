//! Asset file resolution and CPU-side decoding.
//!
//! Every asset is named relative to a primary directory. When it is missing there,
//! the lookup is retried once against a fallback directory (the working directory
//! by default), mirroring how the game is run both from the repository root and
//! from a packaged build folder. Decoding happens here; GPU upload is left to
//! [`Resources`](crate::resources::Resources).

use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::config::AssetConfig;
use crate::error::AssetError;
use crate::geometry::RawGeometry;

/// File stems of the six faces in a cube map directory, in GPU layer order.
pub const CUBE_FACE_NAMES: [&str; 6] = ["px", "nx", "py", "ny", "pz", "nz"];

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "tif", "tiff"];

/// Six square RGBA8 faces packed back to back, ready for a cube texture upload.
#[derive(Clone, Debug)]
pub struct CubeFaces {
    pub size: u32,
    pub data: Vec<u8>,
}

impl CubeFaces {
    fn face_bytes(size: u32) -> usize {
        size as usize * size as usize * 4
    }
}

/// Resolves asset names against a primary and a fallback directory.
#[derive(Clone, Debug)]
pub struct AssetLocator {
    primary: PathBuf,
    fallback: PathBuf,
}

impl AssetLocator {
    pub fn new(primary: impl Into<PathBuf>, fallback: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            fallback: fallback.into(),
        }
    }

    pub fn from_config(config: &AssetConfig) -> Self {
        Self::new(&config.primary_dir, &config.fallback_dir)
    }

    /// Find `name` in the primary directory, retrying once in the fallback.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, AssetError> {
        let primary = self.primary.join(name);
        if primary.exists() {
            return Ok(primary);
        }

        let fallback = self.fallback.join(name);
        log::warn!(
            "Asset '{}' not found at {}, retrying {}",
            name,
            primary.display(),
            fallback.display()
        );
        if fallback.exists() {
            return Ok(fallback);
        }

        Err(AssetError::NotFound {
            name: name.to_string(),
            tried: vec![primary, fallback],
        })
    }

    /// Load and parse a `.obj` or `.stl` model.
    pub fn load_geometry(&self, name: &str) -> Result<RawGeometry, AssetError> {
        let path = self.resolve(name)?;
        let geometry = RawGeometry::load(&path).map_err(|source| AssetError::Geometry {
            path: path.clone(),
            source,
        })?;
        let (min, max) = geometry.bounds();
        log::debug!(
            "Loaded mesh {} ({} vertices, {} triangles, bounds {:?}..{:?})",
            path.display(),
            geometry.vertices.len(),
            geometry.indices.len() / 3,
            min,
            max
        );
        Ok(geometry)
    }

    /// Load an image file as RGBA8.
    pub fn load_image(&self, name: &str) -> Result<RgbaImage, AssetError> {
        let path = self.resolve(name)?;
        let image = decode_image(&path)?;
        log::debug!(
            "Loaded image {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        Ok(image)
    }

    /// Load a cube map, either from an uncompressed RGBA8 `.dds` file or from a
    /// directory holding one image per face (`px`, `nx`, `py`, `ny`, `pz`, `nz`).
    pub fn load_cube_faces(&self, name: &str) -> Result<CubeFaces, AssetError> {
        let path = self.resolve(name)?;
        let faces = if path.is_dir() {
            cube_from_directory(&path)?
        } else {
            let extension = extension_of(&path);
            match extension.as_str() {
                "dds" => cube_from_dds(&path)?,
                _ => return Err(AssetError::UnsupportedFormat { path, extension }),
            }
        };
        log::debug!(
            "Loaded cube map {} ({}x{} per face)",
            path.display(),
            faces.size,
            faces.size
        );
        Ok(faces)
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

fn decode_image(path: &Path) -> Result<RgbaImage, AssetError> {
    let extension = extension_of(path);
    if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AssetError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension,
        });
    }
    let image = image::open(path).map_err(|source| AssetError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image.to_rgba8())
}

fn cube_from_directory(dir: &Path) -> Result<CubeFaces, AssetError> {
    let entries = std::fs::read_dir(dir).map_err(|source| AssetError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| IMAGE_EXTENSIONS.contains(&extension_of(p).as_str()))
        .collect();

    let mut size = 0;
    let mut data = Vec::new();
    for face in CUBE_FACE_NAMES {
        let path = files
            .iter()
            .find(|p| p.file_stem().and_then(|s| s.to_str()) == Some(face))
            .ok_or_else(|| AssetError::CubeMap {
                path: dir.to_path_buf(),
                message: format!("missing face '{face}'"),
            })?;
        let image = decode_image(path)?;
        if image.width() != image.height() {
            return Err(AssetError::CubeMap {
                path: path.clone(),
                message: format!("face is {}x{}, expected square", image.width(), image.height()),
            });
        }
        if size == 0 {
            size = image.width();
        } else if image.width() != size {
            return Err(AssetError::CubeMap {
                path: path.clone(),
                message: format!("face is {0}x{0}, expected {1}x{1}", image.width(), size),
            });
        }
        data.extend_from_slice(image.as_raw());
    }

    Ok(CubeFaces { size, data })
}

fn cube_from_dds(path: &Path) -> Result<CubeFaces, AssetError> {
    let cube_error = |message: String| AssetError::CubeMap {
        path: path.to_path_buf(),
        message,
    };

    let file = std::fs::File::open(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let dds = ddsfile::Dds::read(&mut std::io::BufReader::new(file))
        .map_err(|e| cube_error(format!("{e:?}")))?;

    let width = dds.get_width();
    let height = dds.get_height();
    if width == 0 || width != height {
        return Err(cube_error(format!("faces are {width}x{height}, expected square")));
    }

    let swap_red_blue = match (dds.get_dxgi_format(), dds.get_d3d_format()) {
        (Some(ddsfile::DxgiFormat::R8G8B8A8_UNorm | ddsfile::DxgiFormat::R8G8B8A8_UNorm_sRGB), _) => {
            false
        }
        (Some(ddsfile::DxgiFormat::B8G8R8A8_UNorm | ddsfile::DxgiFormat::B8G8R8A8_UNorm_sRGB), _) => {
            true
        }
        (None, Some(ddsfile::D3DFormat::A8B8G8R8)) => false,
        (None, Some(ddsfile::D3DFormat::A8R8G8B8)) => true,
        (dxgi, d3d) => {
            return Err(cube_error(format!(
                "unsupported pixel format (dxgi {dxgi:?}, d3d {d3d:?}); only uncompressed RGBA8 is read"
            )));
        }
    };

    let mut data = split_cube_layers(&dds.data, width).map_err(cube_error)?;
    if swap_red_blue {
        for pixel in data.chunks_exact_mut(4) {
            pixel.swap(0, 2);
        }
    }

    Ok(CubeFaces { size: width, data })
}

/// Take the top mip of each of the six faces stored back to back in `data`.
///
/// Each face may be followed by its mip chain, so the per-face stride is one sixth
/// of the payload.
fn split_cube_layers(data: &[u8], size: u32) -> Result<Vec<u8>, String> {
    let face_bytes = CubeFaces::face_bytes(size);
    if data.len() % 6 != 0 || data.len() / 6 < face_bytes {
        return Err(format!(
            "payload of {} bytes does not hold six {size}x{size} RGBA8 faces",
            data.len()
        ));
    }
    let stride = data.len() / 6;
    Ok(data
        .chunks_exact(stride)
        .flat_map(|face| &face[..face_bytes])
        .copied()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("skybounce-assets-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn resolve_prefers_primary() {
        let root = scratch_dir("primary");
        std::fs::create_dir_all(root.join("a")).unwrap();
        std::fs::create_dir_all(root.join("b")).unwrap();
        std::fs::write(root.join("a/model.obj"), "x").unwrap();
        std::fs::write(root.join("b/model.obj"), "x").unwrap();

        let locator = AssetLocator::new(root.join("a"), root.join("b"));
        assert_eq!(locator.resolve("model.obj").unwrap(), root.join("a/model.obj"));
    }

    #[test]
    fn resolve_retries_fallback_once() {
        let root = scratch_dir("fallback");
        std::fs::create_dir_all(root.join("b")).unwrap();
        std::fs::write(root.join("b/model.obj"), "x").unwrap();

        let locator = AssetLocator::new(root.join("a"), root.join("b"));
        assert_eq!(locator.resolve("model.obj").unwrap(), root.join("b/model.obj"));
    }

    #[test]
    fn missing_asset_lists_both_paths() {
        let root = scratch_dir("missing");
        let locator = AssetLocator::new(root.join("a"), root.join("b"));
        match locator.resolve("nope.png") {
            Err(AssetError::NotFound { name, tried }) => {
                assert_eq!(name, "nope.png");
                assert_eq!(tried, vec![root.join("a/nope.png"), root.join("b/nope.png")]);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn geometry_errors_carry_the_path() {
        let root = scratch_dir("badobj");
        std::fs::write(root.join("broken.obj"), "v 0 0\n").unwrap();
        let locator = AssetLocator::new(&root, &root);
        let err = locator.load_geometry("broken.obj").unwrap_err();
        assert!(matches!(err, AssetError::Geometry { path, .. } if path == root.join("broken.obj")));
    }

    #[test]
    fn cube_directory_loads_six_faces_in_order() {
        let root = scratch_dir("cube");
        let sky = root.join("sky");
        std::fs::create_dir_all(&sky).unwrap();
        for (i, face) in CUBE_FACE_NAMES.iter().enumerate() {
            let image = RgbaImage::from_pixel(2, 2, image::Rgba([i as u8, 0, 0, 255]));
            image.save(sky.join(format!("{face}.png"))).unwrap();
        }

        let locator = AssetLocator::new(&root, &root);
        let faces = locator.load_cube_faces("sky").unwrap();
        assert_eq!(faces.size, 2);
        assert_eq!(faces.data.len(), 6 * 2 * 2 * 4);
        for i in 0..6 {
            assert_eq!(faces.data[i * 16], i as u8);
        }
    }

    #[test]
    fn cube_directory_missing_face_is_reported() {
        let root = scratch_dir("cube-missing");
        let sky = root.join("sky");
        std::fs::create_dir_all(&sky).unwrap();
        RgbaImage::new(2, 2).save(sky.join("px.png")).unwrap();

        let locator = AssetLocator::new(&root, &root);
        let err = locator.load_cube_faces("sky").unwrap_err();
        assert!(matches!(err, AssetError::CubeMap { message, .. } if message.contains("nx")));
    }

    #[test]
    fn cube_layers_skip_mip_tails() {
        // 1x1 faces each followed by 4 bytes of padding standing in for a mip tail.
        let mut data = Vec::new();
        for i in 0..6u8 {
            data.extend_from_slice(&[i, i, i, i]);
            data.extend_from_slice(&[0xEE; 4]);
        }
        let faces = split_cube_layers(&data, 1).unwrap();
        assert_eq!(faces, vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5]);
    }

    #[test]
    fn short_cube_payload_is_rejected() {
        assert!(split_cube_layers(&[0; 12], 1).is_err());
    }

    #[test]
    fn unsupported_image_extension() {
        let root = scratch_dir("ext");
        std::fs::write(root.join("tex.bmpx"), "x").unwrap();
        let locator = AssetLocator::new(&root, &root);
        assert!(matches!(
            locator.load_image("tex.bmpx"),
            Err(AssetError::UnsupportedFormat { extension, .. }) if extension == "bmpx"
        ));
    }
}
