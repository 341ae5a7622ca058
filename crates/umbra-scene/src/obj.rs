//! Wavefront OBJ loading.
//!
//! Supports `v`, `vt`, `vn`, and polygonal `f` records (fan triangulated),
//! including negative (relative) indices. Groups, objects, and materials are
//! ignored: a file becomes one mesh. Texture v is flipped so that image row 0
//! is the top of the texture. Missing normals are generated by averaging face
//! normals.

use std::collections::HashMap;
use std::path::Path;

use glam::{Vec2, Vec3};

use crate::mesh::{MeshData, Vertex};

#[derive(Debug, thiserror::Error)]
pub enum ObjError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("line {line}: {kind} index {index} out of range")]
    IndexOutOfRange {
        line: usize,
        kind: &'static str,
        index: i64,
    },

    #[error("no faces in mesh")]
    Empty,
}

/// Reads and parses an OBJ file. The mesh is named after the file stem.
pub fn load_obj(path: &Path) -> Result<MeshData, ObjError> {
    let content = std::fs::read_to_string(path).map_err(|source| ObjError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mesh".to_string());
    let mesh = parse_obj(&name, &content)?;
    log::debug!(
        "Loaded {} ({} vertices, {} triangles)",
        path.display(),
        mesh.vertices.len(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

/// Position, uv, normal indices (0-based) of one face corner.
type Corner = (usize, Option<usize>, Option<usize>);

pub fn parse_obj(name: &str, content: &str) -> Result<MeshData, ObjError> {
    let mut positions: Vec<Vec3> = Vec::new();
    let mut uvs: Vec<Vec2> = Vec::new();
    let mut normals: Vec<Vec3> = Vec::new();

    let mut vertices: Vec<Vertex> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();
    let mut cache: HashMap<Corner, u32> = HashMap::new();
    let mut needs_normals = false;

    for (line_idx, raw) in content.lines().enumerate() {
        let line_no = line_idx + 1;
        let line = raw.split('#').next().unwrap_or("").trim();
        let mut parts = line.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };

        match tag {
            "v" => positions.push(Vec3::from_array(parse_floats::<3>(parts, line_no)?)),
            "vn" => normals.push(Vec3::from_array(parse_floats::<3>(parts, line_no)?)),
            "vt" => {
                let [u, v] = parse_floats::<2>(parts, line_no)?;
                uvs.push(Vec2::new(u, 1.0 - v));
            }
            "f" => {
                let corners = parts
                    .map(|token| {
                        parse_corner(token, line_no, positions.len(), uvs.len(), normals.len())
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if corners.len() < 3 {
                    return Err(ObjError::Parse {
                        line: line_no,
                        message: format!("face has {} vertices", corners.len()),
                    });
                }

                let mut emit = |corner: Corner| -> u32 {
                    *cache.entry(corner).or_insert_with(|| {
                        let (p, t, n) = corner;
                        let uv = t.map_or(Vec2::ZERO, |t| uvs[t]);
                        let normal = n.map_or(Vec3::ZERO, |n| normals[n]);
                        if n.is_none() {
                            needs_normals = true;
                        }
                        vertices.push(Vertex::new(positions[p], normal, uv));
                        (vertices.len() - 1) as u32
                    })
                };

                let first = emit(corners[0]);
                for pair in corners[1..].windows(2) {
                    let b = emit(pair[0]);
                    let c = emit(pair[1]);
                    indices.extend_from_slice(&[first, b, c]);
                }
            }
            _ => {}
        }
    }

    if indices.is_empty() {
        return Err(ObjError::Empty);
    }
    if needs_normals {
        generate_normals(&mut vertices, &indices);
    }
    Ok(MeshData::new(name, vertices, indices).with_tangents())
}

fn parse_floats<'a, const N: usize>(
    mut parts: impl Iterator<Item = &'a str>,
    line: usize,
) -> Result<[f32; N], ObjError> {
    let mut out = [0.0; N];
    for slot in &mut out {
        let token = parts.next().ok_or_else(|| ObjError::Parse {
            line,
            message: format!("expected {N} numbers"),
        })?;
        *slot = token.parse().map_err(|_| ObjError::Parse {
            line,
            message: format!("invalid number {token:?}"),
        })?;
    }
    Ok(out)
}

/// Parses `v`, `v/vt`, `v//vn`, or `v/vt/vn`.
fn parse_corner(
    token: &str,
    line: usize,
    n_pos: usize,
    n_uv: usize,
    n_norm: usize,
) -> Result<Corner, ObjError> {
    let mut fields = token.split('/');
    let p = resolve(fields.next(), line, "position", n_pos)?.ok_or_else(|| ObjError::Parse {
        line,
        message: format!("missing position index in {token:?}"),
    })?;
    let t = resolve(fields.next(), line, "uv", n_uv)?;
    let n = resolve(fields.next(), line, "normal", n_norm)?;
    Ok((p, t, n))
}

/// 1-based or negative OBJ index to a 0-based one. Empty field → `None`.
fn resolve(
    field: Option<&str>,
    line: usize,
    kind: &'static str,
    count: usize,
) -> Result<Option<usize>, ObjError> {
    let Some(field) = field.filter(|f| !f.is_empty()) else {
        return Ok(None);
    };
    let index: i64 = field.parse().map_err(|_| ObjError::Parse {
        line,
        message: format!("invalid {kind} index {field:?}"),
    })?;
    let resolved = if index > 0 {
        index - 1
    } else {
        count as i64 + index
    };
    if index == 0 || resolved < 0 || resolved >= count as i64 {
        return Err(ObjError::IndexOutOfRange { line, kind, index });
    }
    Ok(Some(resolved as usize))
}

fn generate_normals(vertices: &mut [Vertex], indices: &[u32]) {
    let mut accum = vec![Vec3::ZERO; vertices.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let pa = Vec3::from_array(vertices[a].position);
        let face = (Vec3::from_array(vertices[b].position) - pa)
            .cross(Vec3::from_array(vertices[c].position) - pa);
        for i in [a, b, c] {
            accum[i] += face;
        }
    }
    for (vertex, n) in vertices.iter_mut().zip(accum) {
        if Vec3::from_array(vertex.normal) == Vec3::ZERO {
            vertex.normal = n.normalize_or(Vec3::Y).to_array();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
# unit quad
v -1 0 1
v 1 0 1
v 1 0 -1
v -1 0 -1
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 1 0
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn test_quad_fan_triangulated() {
        let mesh = parse_obj("quad", QUAD).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.vertices[0].normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_v_is_flipped() {
        let mesh = parse_obj("quad", QUAD).unwrap();
        assert_eq!(mesh.vertices[0].uv, [0.0, 1.0]);
        assert_eq!(mesh.vertices[2].uv, [1.0, 0.0]);
    }

    #[test]
    fn test_negative_indices_and_shared_corners() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nf -4 -3 -2\nf 2 4 3\n";
        let mesh = parse_obj("tris", src).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2, 1, 3, 2]);
        assert_eq!(mesh.vertices.len(), 4);
    }

    #[test]
    fn test_missing_normals_generated() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = parse_obj("tri", src).unwrap();
        for v in &mesh.vertices {
            assert_eq!(v.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn test_out_of_range_index() {
        let src = "v 0 0 0\nv 1 0 0\nf 1 2 3\n";
        let err = parse_obj("bad", src).unwrap_err();
        assert!(matches!(
            err,
            ObjError::IndexOutOfRange { line: 3, kind: "position", index: 3 }
        ));
    }

    #[test]
    fn test_bad_number_reports_line() {
        let err = parse_obj("bad", "v 0 0 0\nv 1 x 0\n").unwrap_err();
        assert!(matches!(err, ObjError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_empty_file() {
        assert!(matches!(parse_obj("none", "# nothing\n"), Err(ObjError::Empty)));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quad.obj");
        std::fs::write(&path, QUAD).unwrap();
        let mesh = load_obj(&path).unwrap();
        assert_eq!(mesh.name, "quad");
        assert_eq!(mesh.triangle_count(), 2);

        let missing = load_obj(&dir.path().join("nope.obj"));
        assert!(matches!(missing, Err(ObjError::Io { .. })));
    }
}
