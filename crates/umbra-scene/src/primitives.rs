//! Procedural meshes used when no OBJ assets are available.
//!
//! All closed shapes are centred on the origin and wound counter-clockwise
//! when seen from outside.

use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};

use crate::mesh::{MeshData, Vertex};

/// Axis-aligned cube with half extent 0.5.
pub fn cube() -> MeshData {
    // (normal, u axis, v-up axis) with u × v = normal
    const FACES: [(Vec3, Vec3, Vec3); 6] = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in FACES {
        let base = vertices.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let position = (normal + u * su + v * sv) * 0.5;
            let uv = Vec2::new((su + 1.0) * 0.5, 1.0 - (sv + 1.0) * 0.5);
            vertices.push(Vertex::new(position, normal, uv));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    MeshData::new("cube", vertices, indices).with_tangents()
}

/// UV sphere of radius 0.5.
pub fn sphere(slices: u32, stacks: u32) -> MeshData {
    let slices = slices.max(3);
    let stacks = stacks.max(2);
    let mut vertices = Vec::new();
    for i in 0..=stacks {
        let phi = PI * i as f32 / stacks as f32;
        for j in 0..=slices {
            let theta = TAU * j as f32 / slices as f32;
            let normal = Vec3::new(phi.sin() * theta.sin(), phi.cos(), phi.sin() * theta.cos());
            let uv = Vec2::new(j as f32 / slices as f32, i as f32 / stacks as f32);
            vertices.push(Vertex::new(normal * 0.5, normal, uv));
        }
    }

    let row = slices + 1;
    let mut indices = Vec::new();
    for i in 0..stacks {
        for j in 0..slices {
            let a = i * row + j;
            let b = a + row;
            let c = b + 1;
            let d = a + 1;
            if i != stacks - 1 {
                indices.extend_from_slice(&[a, b, c]);
            }
            if i != 0 {
                indices.extend_from_slice(&[a, c, d]);
            }
        }
    }
    MeshData::new("sphere", vertices, indices).with_tangents()
}

/// Capped cylinder along Y: radius 0.5, height 1.
pub fn cylinder(slices: u32) -> MeshData {
    let slices = slices.max(3);
    let radius = 0.5;
    let half = 0.5;
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    // Side: top ring then bottom ring, seam duplicated for uv continuity.
    for (y, v) in [(half, 0.0), (-half, 1.0)] {
        for j in 0..=slices {
            let theta = TAU * j as f32 / slices as f32;
            let normal = Vec3::new(theta.sin(), 0.0, theta.cos());
            let position = normal * radius + Vec3::Y * y;
            vertices.push(Vertex::new(position, normal, Vec2::new(j as f32 / slices as f32, v)));
        }
    }
    let row = slices + 1;
    for j in 0..slices {
        let (a, d) = (j, j + 1);
        let (b, c) = (j + row, j + row + 1);
        indices.extend_from_slice(&[a, b, c, a, c, d]);
    }

    for (y, normal) in [(half, Vec3::Y), (-half, Vec3::NEG_Y)] {
        let center = vertices.len() as u32;
        vertices.push(Vertex::new(Vec3::Y * y, normal, Vec2::splat(0.5)));
        for j in 0..=slices {
            let theta = TAU * j as f32 / slices as f32;
            let (s, c) = theta.sin_cos();
            let position = Vec3::new(s * radius, y, c * radius);
            let uv = Vec2::new(0.5 + s * 0.5, 0.5 - c * 0.5);
            vertices.push(Vertex::new(position, normal, uv));
        }
        for j in 0..slices {
            let (p, q) = (center + 1 + j, center + 2 + j);
            if normal.y > 0.0 {
                indices.extend_from_slice(&[center, p, q]);
            } else {
                indices.extend_from_slice(&[center, q, p]);
            }
        }
    }
    MeshData::new("cylinder", vertices, indices).with_tangents()
}

/// Torus around Y with ring radius `major` and tube radius `minor`.
pub fn torus(major: f32, minor: f32, ring_segments: u32, tube_segments: u32) -> MeshData {
    let ring_segments = ring_segments.max(3);
    let tube_segments = tube_segments.max(3);
    let mut vertices = Vec::new();
    for i in 0..=tube_segments {
        let psi = TAU * i as f32 / tube_segments as f32;
        for j in 0..=ring_segments {
            let theta = TAU * j as f32 / ring_segments as f32;
            let normal = Vec3::new(psi.cos() * theta.sin(), psi.sin(), psi.cos() * theta.cos());
            let center = Vec3::new(theta.sin(), 0.0, theta.cos()) * major;
            let uv = Vec2::new(
                j as f32 / ring_segments as f32,
                1.0 - i as f32 / tube_segments as f32,
            );
            vertices.push(Vertex::new(center + normal * minor, normal, uv));
        }
    }

    let row = ring_segments + 1;
    let mut indices = Vec::new();
    for i in 0..tube_segments {
        for j in 0..ring_segments {
            let b = i * row + j;
            let c = b + 1;
            let a = b + row;
            let d = a + 1;
            indices.extend_from_slice(&[a, b, c, a, c, d]);
        }
    }
    MeshData::new("torus", vertices, indices).with_tangents()
}

/// A tube of radius `tube` swept along a helix around Y, centred vertically.
pub fn helix(radius: f32, tube: f32, height: f32, turns: f32, segments: u32, sides: u32) -> MeshData {
    let segments = segments.max(2);
    let sides = sides.max(3);
    let sweep = TAU * turns;
    let rise = height / sweep;

    let mut vertices = Vec::new();
    for i in 0..=segments {
        let t = sweep * i as f32 / segments as f32;
        let (s, c) = t.sin_cos();
        let spine = Vec3::new(radius * s, rise * t - height * 0.5, radius * c);
        let tangent = Vec3::new(radius * c, rise, -radius * s).normalize_or(Vec3::Y);
        let outward = Vec3::new(s, 0.0, c);
        let binormal = tangent.cross(outward);
        for j in 0..=sides {
            let psi = TAU * j as f32 / sides as f32;
            let normal = outward * psi.cos() + binormal * psi.sin();
            let uv = Vec2::new(i as f32 / segments as f32, j as f32 / sides as f32);
            vertices.push(Vertex::new(spine + normal * tube, normal, uv));
        }
    }

    let row = sides + 1;
    let mut indices = Vec::new();
    for i in 0..segments {
        for j in 0..sides {
            let a = i * row + j;
            let b = a + 1;
            let c = a + row + 1;
            let d = a + row;
            indices.extend_from_slice(&[a, b, c, a, c, d]);
        }
    }
    MeshData::new("helix", vertices, indices).with_tangents()
}

/// Single-sided quad in the XZ plane spanning ±1, facing +Y.
pub fn quad() -> MeshData {
    let n = Vec3::Y;
    let vertices = vec![
        Vertex::new(Vec3::new(-1.0, 0.0, 1.0), n, Vec2::new(0.0, 1.0)),
        Vertex::new(Vec3::new(1.0, 0.0, 1.0), n, Vec2::new(1.0, 1.0)),
        Vertex::new(Vec3::new(1.0, 0.0, -1.0), n, Vec2::new(1.0, 0.0)),
        Vertex::new(Vec3::new(-1.0, 0.0, -1.0), n, Vec2::new(0.0, 0.0)),
    ];
    MeshData::new("quad", vertices, vec![0, 1, 2, 0, 2, 3]).with_tangents()
}

/// [`quad`] plus a back face with flipped normals, visible from both sides
/// under back-face culling.
pub fn quad_double_sided() -> MeshData {
    let front = quad();
    let mut vertices = front.vertices.clone();
    for v in &front.vertices {
        let mut back = *v;
        back.normal = (-Vec3::from_array(v.normal)).to_array();
        vertices.push(back);
    }
    let mut indices = front.indices.clone();
    indices.extend(front.indices.chunks_exact(3).flat_map(|t| [t[0] + 4, t[2] + 4, t[1] + 4]));
    MeshData::new("quad_double_sided", vertices, indices).with_tangents()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every non-degenerate triangle's geometric normal agrees with its
    /// vertex normals, i.e. it is counter-clockwise seen from the side the
    /// normals point to.
    fn assert_outward_ccw(mesh: &MeshData) {
        for tri in mesh.indices.chunks_exact(3) {
            let v = [tri[0], tri[1], tri[2]].map(|i| mesh.vertices[i as usize]);
            let p = v.map(|v| Vec3::from_array(v.position));
            let face = (p[1] - p[0]).cross(p[2] - p[0]);
            if face.length() < 1e-7 {
                continue;
            }
            let n: Vec3 = v.iter().map(|v| Vec3::from_array(v.normal)).sum();
            assert!(
                face.dot(n) > 0.0,
                "{}: triangle {tri:?} is wound clockwise",
                mesh.name
            );
        }
    }

    fn assert_indices_valid(mesh: &MeshData) {
        assert_eq!(mesh.indices.len() % 3, 0);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn test_all_primitives_wound_outward() {
        for mesh in [
            cube(),
            sphere(24, 16),
            cylinder(24),
            torus(0.5, 0.2, 32, 16),
            helix(0.4, 0.1, 2.0, 3.0, 96, 12),
            quad(),
            quad_double_sided(),
        ] {
            assert_indices_valid(&mesh);
            assert_outward_ccw(&mesh);
        }
    }

    #[test]
    fn test_cube_extent() {
        let (lo, hi) = cube().bounds().unwrap();
        assert_eq!(lo, Vec3::splat(-0.5));
        assert_eq!(hi, Vec3::splat(0.5));
        assert_eq!(cube().triangle_count(), 12);
    }

    #[test]
    fn test_closed_shapes_face_away_from_center() {
        for mesh in [cube(), sphere(16, 8), cylinder(16)] {
            for tri in mesh.indices.chunks_exact(3) {
                let p = [tri[0], tri[1], tri[2]]
                    .map(|i| Vec3::from_array(mesh.vertices[i as usize].position));
                let face = (p[1] - p[0]).cross(p[2] - p[0]);
                let centroid = (p[0] + p[1] + p[2]) / 3.0;
                if face.length() > 1e-7 {
                    assert!(face.dot(centroid) > 0.0, "{} faces inward", mesh.name);
                }
            }
        }
    }

    #[test]
    fn test_sphere_radius() {
        for v in &sphere(12, 6).vertices {
            assert!((Vec3::from_array(v.position).length() - 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn test_helix_spans_height() {
        let (lo, hi) = helix(0.4, 0.1, 2.0, 3.0, 96, 12).bounds().unwrap();
        assert!((lo.y + 1.1).abs() < 0.02);
        assert!((hi.y - 1.1).abs() < 0.02);
    }

    #[test]
    fn test_double_sided_quad_has_both_faces() {
        let mesh = quad_double_sided();
        assert_eq!(mesh.triangle_count(), 4);
        let downward = mesh.vertices.iter().filter(|v| v.normal[1] < 0.0).count();
        assert_eq!(downward, 4);
    }
}
