//! CPU-side mesh data.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Vertex layout shared by the shadow and lit pipelines. 44 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub tangent: [f32; 3],
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv: uv.to_array(),
            tangent: [0.0; 3],
        }
    }
}

/// Indexed triangle list.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(name: impl Into<String>, vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            vertices,
            indices,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.vertices
            .iter()
            .map(|v| Vec3::from_array(v.position))
            .collect()
    }

    /// Axis-aligned bounds, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut iter = self.vertices.iter().map(|v| Vec3::from_array(v.position));
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))))
    }

    /// Regenerates tangents from positions, normals, and uvs.
    pub fn with_tangents(mut self) -> Self {
        compute_tangents(&mut self.vertices, &self.indices);
        self
    }
}

/// Per-vertex tangents pointing along +u, orthogonalized against the normal.
///
/// Triangles with degenerate uv mapping contribute nothing; vertices that end
/// up with no tangent get an arbitrary vector perpendicular to the normal.
pub fn compute_tangents(vertices: &mut [Vertex], indices: &[u32]) {
    let mut accum = vec![Vec3::ZERO; vertices.len()];

    for tri in indices.chunks_exact(3) {
        let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if i0 >= vertices.len() || i1 >= vertices.len() || i2 >= vertices.len() {
            continue;
        }
        let (v0, v1, v2) = (&vertices[i0], &vertices[i1], &vertices[i2]);
        let p0 = Vec3::from_array(v0.position);
        let e1 = Vec3::from_array(v1.position) - p0;
        let e2 = Vec3::from_array(v2.position) - p0;
        let uv0 = Vec2::from_array(v0.uv);
        let d1 = Vec2::from_array(v1.uv) - uv0;
        let d2 = Vec2::from_array(v2.uv) - uv0;

        let det = d1.x * d2.y - d2.x * d1.y;
        if det.abs() < 1e-12 {
            continue;
        }
        let tangent = (e1 * d2.y - e2 * d1.y) / det;
        for i in [i0, i1, i2] {
            accum[i] += tangent;
        }
    }

    for (vertex, t) in vertices.iter_mut().zip(accum) {
        let n = Vec3::from_array(vertex.normal).normalize_or_zero();
        let ortho = (t - n * n.dot(t)).normalize_or_zero();
        let tangent = if ortho != Vec3::ZERO {
            ortho
        } else if n != Vec3::ZERO {
            n.any_orthonormal_vector()
        } else {
            Vec3::X
        };
        vertex.tangent = tangent.to_array();
    }
}
