//! Model file parsing into CPU-side geometry.
//!
//! Supports Wavefront OBJ (parsed here) and STL (through `stl_io`). Source files are
//! assumed to be authored right-handed; loading mirrors them into the left-handed
//! world the game renders in by negating z and reversing triangle winding, so front
//! faces wind clockwise on screen. Texture `v` coordinates are flipped to put the
//! origin at the top-left, as wgpu samples.

use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;

use glam::{Vec2, Vec3};
use thiserror::Error;

use crate::mesh::Vertex;

/// Errors that can occur when loading geometry.
#[derive(Error, Debug)]
pub enum GeometryError {
    /// File could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File format could not be determined from extension.
    #[error("Unknown geometry format: '{0}'")]
    UnknownFormat(String),

    /// A line of the file could not be parsed.
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// The file parsed but contained no triangles.
    #[error("Geometry contains no triangles")]
    Empty,
}

impl GeometryError {
    fn parse(line: usize, message: impl Into<String>) -> Self {
        GeometryError::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Raw geometry data before GPU upload.
#[derive(Clone, Debug)]
pub struct RawGeometry {
    pub vertices: Vec<Vertex>,
    /// Triangle list indices.
    pub indices: Vec<u32>,
}

impl RawGeometry {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Load a model file, choosing the parser from the extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GeometryError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "obj" => Self::from_obj_str(&std::fs::read_to_string(path)?),
            "stl" => {
                let file = std::fs::File::open(path)?;
                Self::from_stl(&mut std::io::BufReader::new(file))
            }
            _ => Err(GeometryError::UnknownFormat(ext)),
        }
    }

    /// Parse Wavefront OBJ text.
    ///
    /// Reads `v`, `vt`, `vn` and `f` records; everything else is ignored. Faces with
    /// more than three corners are fan-triangulated and negative indices count back
    /// from the end of the list read so far. Missing normals are rebuilt from the faces.
    pub fn from_obj_str(text: &str) -> Result<Self, GeometryError> {
        let mut positions: Vec<Vec3> = Vec::new();
        let mut uvs: Vec<Vec2> = Vec::new();
        let mut normals: Vec<Vec3> = Vec::new();

        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        let mut lookup: HashMap<(usize, Option<usize>, Option<usize>), u32> = HashMap::new();
        let mut missing_normals = false;

        for (number, raw_line) in text.lines().enumerate() {
            let line = number + 1;
            let content = raw_line.split('#').next().unwrap_or("").trim();
            let mut parts = content.split_whitespace();
            let Some(keyword) = parts.next() else {
                continue;
            };

            match keyword {
                "v" => {
                    let [x, y, z] = parse_floats::<3>(&mut parts, line)?;
                    positions.push(Vec3::new(x, y, -z));
                }
                "vt" => {
                    let [u, v] = parse_floats::<2>(&mut parts, line)?;
                    uvs.push(Vec2::new(u, 1.0 - v));
                }
                "vn" => {
                    let [x, y, z] = parse_floats::<3>(&mut parts, line)?;
                    normals.push(Vec3::new(x, y, -z));
                }
                "f" => {
                    let mut corners = Vec::with_capacity(4);
                    for token in parts {
                        let key = parse_corner(token, line, &positions, &uvs, &normals)?;
                        missing_normals |= key.2.is_none();
                        let index = match lookup.get(&key) {
                            Some(&index) => index,
                            None => {
                                let (p, t, n) = key;
                                let index = vertices.len() as u32;
                                vertices.push(Vertex::new(
                                    positions[p].into(),
                                    n.map(|n| normals[n]).unwrap_or(Vec3::ZERO).into(),
                                    t.map(|t| uvs[t]).unwrap_or(Vec2::ZERO).into(),
                                ));
                                lookup.insert(key, index);
                                index
                            }
                        };
                        corners.push(index);
                    }

                    if corners.len() < 3 {
                        return Err(GeometryError::parse(line, "face needs at least 3 corners"));
                    }
                    // Reversed fan keeps faces front-facing after the z mirror.
                    for i in 1..corners.len() - 1 {
                        indices.extend_from_slice(&[corners[0], corners[i + 1], corners[i]]);
                    }
                }
                _ => {}
            }
        }

        if indices.is_empty() {
            return Err(GeometryError::Empty);
        }

        let mut geometry = Self::new(vertices, indices);
        if missing_normals {
            geometry.recalculate_normals();
        }
        geometry.compute_tangents();
        Ok(geometry)
    }

    /// Parse a binary or ASCII STL stream. STL carries no texture coordinates.
    pub fn from_stl<R: Read + Seek>(reader: &mut R) -> Result<Self, GeometryError> {
        let stl = stl_io::read_stl(reader).map_err(|e| GeometryError::parse(0, e.to_string()))?;

        let mut vertices = Vec::with_capacity(stl.faces.len() * 3);
        let mut indices = Vec::with_capacity(stl.faces.len() * 3);

        for face in &stl.faces {
            let [nx, ny, nz]: [f32; 3] = face.normal.into();
            let normal = [nx, ny, -nz];
            let base = vertices.len() as u32;
            for &vertex_idx in &face.vertices {
                let v: [f32; 3] = stl.vertices[vertex_idx].into();
                vertices.push(Vertex::new([v[0], v[1], -v[2]], normal, [0.0, 0.0]));
            }
            indices.extend_from_slice(&[base, base + 2, base + 1]);
        }

        if indices.is_empty() {
            return Err(GeometryError::Empty);
        }

        let mut geometry = Self::new(vertices, indices);
        geometry.compute_tangents();
        Ok(geometry)
    }

    /// Axis-aligned bounding box as `(min, max)`.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);

        for v in &self.vertices {
            let p = Vec3::from(v.position);
            min = min.min(p);
            max = max.max(p);
        }

        (min, max)
    }

    fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|tri| [tri[0] as usize, tri[1] as usize, tri[2] as usize])
    }

    /// Rebuild smooth vertex normals by area-weighted averaging of face normals.
    pub fn recalculate_normals(&mut self) {
        let mut accum = vec![Vec3::ZERO; self.vertices.len()];

        for [i0, i1, i2] in self.triangles() {
            let p0 = Vec3::from(self.vertices[i0].position);
            let p1 = Vec3::from(self.vertices[i1].position);
            let p2 = Vec3::from(self.vertices[i2].position);
            let face_normal = (p1 - p0).cross(p2 - p0);
            for i in [i0, i1, i2] {
                accum[i] += face_normal;
            }
        }

        for (v, n) in self.vertices.iter_mut().zip(accum) {
            v.normal = n.normalize_or_zero().into();
        }
    }

    /// Compute per-vertex tangents from UV gradients for normal mapping.
    ///
    /// Tangents are orthogonalized against the normal. Vertices without usable UVs
    /// get an arbitrary tangent perpendicular to the normal.
    pub fn compute_tangents(&mut self) {
        let mut accum = vec![Vec3::ZERO; self.vertices.len()];

        for [i0, i1, i2] in self.triangles() {
            let (v0, v1, v2) = (&self.vertices[i0], &self.vertices[i1], &self.vertices[i2]);
            let e1 = Vec3::from(v1.position) - Vec3::from(v0.position);
            let e2 = Vec3::from(v2.position) - Vec3::from(v0.position);
            let d1 = Vec2::from(v1.uv) - Vec2::from(v0.uv);
            let d2 = Vec2::from(v2.uv) - Vec2::from(v0.uv);

            let det = d1.x * d2.y - d2.x * d1.y;
            if det.abs() < f32::EPSILON {
                continue;
            }
            let tangent = (e1 * d2.y - e2 * d1.y) / det;
            for i in [i0, i1, i2] {
                accum[i] += tangent;
            }
        }

        for (v, t) in self.vertices.iter_mut().zip(accum) {
            let n = Vec3::from(v.normal);
            let ortho = (t - n * n.dot(t)).normalize_or_zero();
            let tangent = if ortho != Vec3::ZERO {
                ortho
            } else if n.is_normalized() {
                n.any_orthonormal_vector()
            } else {
                Vec3::X
            };
            v.tangent = tangent.into();
        }
    }
}

fn parse_floats<'a, const N: usize>(
    parts: &mut impl Iterator<Item = &'a str>,
    line: usize,
) -> Result<[f32; N], GeometryError> {
    let mut out = [0.0; N];
    for slot in out.iter_mut() {
        let token = parts
            .next()
            .ok_or_else(|| GeometryError::parse(line, format!("expected {N} numbers")))?;
        *slot = token
            .parse()
            .map_err(|_| GeometryError::parse(line, format!("invalid number '{token}'")))?;
    }
    Ok(out)
}

/// Resolve a 1-based (or negative, relative) OBJ index into a 0-based one.
fn resolve_index(token: &str, len: usize, line: usize) -> Result<usize, GeometryError> {
    let value: i64 = token
        .parse()
        .map_err(|_| GeometryError::parse(line, format!("invalid index '{token}'")))?;
    let resolved = match value {
        v if v > 0 => v - 1,
        v if v < 0 => len as i64 + v,
        _ => return Err(GeometryError::parse(line, "index 0 is not valid")),
    };
    if resolved < 0 || resolved as usize >= len {
        return Err(GeometryError::parse(
            line,
            format!("index {value} out of range ({len} available)"),
        ));
    }
    Ok(resolved as usize)
}

fn parse_corner(
    token: &str,
    line: usize,
    positions: &[Vec3],
    uvs: &[Vec2],
    normals: &[Vec3],
) -> Result<(usize, Option<usize>, Option<usize>), GeometryError> {
    let mut fields = token.split('/');
    let position = resolve_index(fields.next().unwrap_or(""), positions.len(), line)?;
    let uv = match fields.next() {
        Some(t) if !t.is_empty() => Some(resolve_index(t, uvs.len(), line)?),
        _ => None,
    };
    let normal = match fields.next() {
        Some(t) if !t.is_empty() => Some(resolve_index(t, normals.len(), line)?),
        _ => None,
    };
    Ok((position, uv, normal))
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
# unit quad facing +z
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn quad_is_fan_triangulated_and_shared() {
        let geom = RawGeometry::from_obj_str(QUAD).unwrap();
        assert_eq!(geom.vertices.len(), 4);
        assert_eq!(geom.indices, vec![0, 2, 1, 0, 3, 2]);
    }

    #[test]
    fn obj_is_mirrored_into_left_handed_space() {
        let geom = RawGeometry::from_obj_str("v 0 0 1\nv 1 0 1\nv 0 1 1\nvn 0 0 1\nf 1//1 2//1 3//1\n")
            .unwrap();
        assert_eq!(geom.vertices[0].position, [0.0, 0.0, -1.0]);
        assert_eq!(geom.vertices[0].normal, [0.0, 0.0, -1.0]);
    }

    #[test]
    fn uv_v_is_flipped() {
        let geom = RawGeometry::from_obj_str(QUAD).unwrap();
        assert_eq!(geom.vertices[0].uv, [0.0, 1.0]);
        assert_eq!(geom.vertices[2].uv, [1.0, 0.0]);
    }

    #[test]
    fn negative_indices_count_from_end() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let geom = RawGeometry::from_obj_str(text).unwrap();
        assert_eq!(geom.vertices[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(geom.indices.len(), 3);
    }

    #[test]
    fn missing_normals_are_rebuilt_outward() {
        // Counter-clockwise from +z in the source, so the outward normal is +z,
        // which becomes -z after mirroring.
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let geom = RawGeometry::from_obj_str(text).unwrap();
        for v in &geom.vertices {
            assert!((Vec3::from(v.normal) - Vec3::NEG_Z).length() < 1e-5);
        }
    }

    #[test]
    fn tangents_follow_u_direction() {
        let geom = RawGeometry::from_obj_str(QUAD).unwrap();
        for v in &geom.vertices {
            let t = Vec3::from(v.tangent);
            assert!((t - Vec3::X).length() < 1e-5, "tangent {t:?}");
        }
    }

    #[test]
    fn out_of_range_index_reports_line() {
        let err = RawGeometry::from_obj_str("v 0 0 0\n\nf 1 2 3\n").unwrap_err();
        assert!(matches!(err, GeometryError::Parse { line: 3, .. }));
    }

    #[test]
    fn bad_number_is_a_parse_error() {
        let err = RawGeometry::from_obj_str("v 0 zero 0\n").unwrap_err();
        assert!(matches!(err, GeometryError::Parse { line: 1, .. }));
    }

    #[test]
    fn file_without_faces_is_empty() {
        let err = RawGeometry::from_obj_str("v 0 0 0\n").unwrap_err();
        assert!(matches!(err, GeometryError::Empty));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = RawGeometry::load("model.fbx").unwrap_err();
        assert!(matches!(err, GeometryError::UnknownFormat(ext) if ext == "fbx"));
    }

    #[test]
    fn bounds_cover_all_vertices() {
        let geom = RawGeometry::from_obj_str(QUAD).unwrap();
        let (min, max) = geom.bounds();
        assert_eq!(min, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(max, Vec3::new(1.0, 1.0, 0.0));
    }
}
