//! CPU depth-only rasterizer and comparison sampler.
//!
//! Follows the same rules as the GPU shadow pass: pixel-center sampling with
//! a top-left fill rule, back-face culling on counter-clockwise fronts,
//! depth clipping to `[0, 1]`, rasterizer depth bias, and a `Less` depth test.
//! Sampling mirrors a `Less` comparison sampler with a white border.

use glam::{Mat4, Vec2, Vec3, Vec3Swizzles, Vec4Swizzles};
use umbra_config::ShadowFilter;

use crate::light_space::{LightSpace, ndc_to_shadow_uv};
use crate::shadow::DepthBias;

/// Counters from one draw, used by tests to check the fill rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RasterStats {
    pub triangles_culled: u32,
    /// Pixel centers that fell inside a triangle and inside the depth range.
    pub fragments: u64,
    /// Fragments that passed the depth test.
    pub written: u64,
}

impl std::ops::AddAssign for RasterStats {
    fn add_assign(&mut self, rhs: Self) {
        self.triangles_culled += rhs.triangles_culled;
        self.fragments += rhs.fragments;
        self.written += rhs.written;
    }
}

/// A square depth buffer with shadow-pass draw and comparison-sample operations.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftwareShadowMap {
    resolution: u32,
    depth: Vec<f32>,
}

impl SoftwareShadowMap {
    /// Creates a map cleared to 1.0.
    pub fn new(resolution: u32) -> Self {
        let resolution = resolution.max(1);
        Self {
            resolution,
            depth: vec![1.0; (resolution * resolution) as usize],
        }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Row-major depth values, row 0 at the top (v = 0).
    pub fn depths(&self) -> &[f32] {
        &self.depth
    }

    pub fn clear(&mut self) {
        self.depth.fill(1.0);
    }

    /// Stored depth, or the border value 1.0 outside the map.
    pub fn texel(&self, x: i64, y: i64) -> f32 {
        let res = i64::from(self.resolution);
        if x < 0 || y < 0 || x >= res || y >= res {
            return 1.0;
        }
        self.depth[(y * res + x) as usize]
    }

    /// Rasterizes an indexed triangle list into the map.
    ///
    /// `positions` are object space; `world` and `view_proj` take them to
    /// light clip space.
    pub fn draw_indexed(
        &mut self,
        positions: &[Vec3],
        indices: &[u32],
        world: Mat4,
        view_proj: Mat4,
        bias: DepthBias,
    ) -> RasterStats {
        let mvp = view_proj * world;
        let res = self.resolution as f32;

        let window: Vec<Option<Vec3>> = positions
            .iter()
            .map(|&p| {
                let clip = mvp * p.extend(1.0);
                if clip.w <= 0.0 {
                    return None;
                }
                let ndc = clip.xyz() / clip.w;
                let uv = ndc_to_shadow_uv(ndc.xy());
                Some(Vec3::new(uv.x * res, uv.y * res, ndc.z))
            })
            .collect();

        let mut stats = RasterStats::default();
        for tri in indices.chunks_exact(3) {
            let fetch = |i: u32| window.get(i as usize).copied().flatten();
            let (Some(a), Some(b), Some(c)) = (fetch(tri[0]), fetch(tri[1]), fetch(tri[2])) else {
                continue;
            };
            stats += self.draw_triangle(a, b, c, bias);
        }
        stats
    }

    fn draw_triangle(&mut self, a: Vec3, b: Vec3, c: Vec3, bias: DepthBias) -> RasterStats {
        let mut stats = RasterStats::default();

        // Window y points down, so a counter-clockwise front face in NDC has
        // negative area here.
        let area = edge(a.xy(), b.xy(), c.xy());
        if area >= 0.0 {
            stats.triangles_culled = 1;
            return stats;
        }
        // Reorder to positive area so the fill rule has one orientation.
        let (a, b, c) = (a, c, b);
        let area = -area;

        // Depth plane z = z0 + dzdx * x + dzdy * y.
        let e1 = b - a;
        let e2 = c - a;
        let dzdx = (e1.z * e2.y - e2.z * e1.y) / area;
        let dzdy = (e2.z * e1.x - e1.z * e2.x) / area;
        let max_depth = a.z.max(b.z).max(c.z);
        let offset = bias.offset(max_depth, dzdx.abs().max(dzdy.abs()));

        let res = self.resolution as i64;
        let min_x = (a.x.min(b.x).min(c.x).floor() as i64).clamp(0, res);
        let max_x = (a.x.max(b.x).max(c.x).ceil() as i64).clamp(0, res);
        let min_y = (a.y.min(b.y).min(c.y).floor() as i64).clamp(0, res);
        let max_y = (a.y.max(b.y).max(c.y).ceil() as i64).clamp(0, res);

        let tl0 = is_top_left(b.xy(), c.xy());
        let tl1 = is_top_left(c.xy(), a.xy());
        let tl2 = is_top_left(a.xy(), b.xy());

        for y in min_y..max_y {
            for x in min_x..max_x {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let w0 = edge(b.xy(), c.xy(), p);
                let w1 = edge(c.xy(), a.xy(), p);
                let w2 = edge(a.xy(), b.xy(), p);
                let inside = covers(w0, tl0) && covers(w1, tl1) && covers(w2, tl2);
                if !inside {
                    continue;
                }

                let z = a.z + dzdx * (p.x - a.x) + dzdy * (p.y - a.y);
                if !(0.0..=1.0).contains(&z) {
                    continue;
                }
                stats.fragments += 1;

                let biased = (z + offset).clamp(0.0, 1.0);
                let slot = &mut self.depth[(y * res + x) as usize];
                if biased < *slot {
                    *slot = biased;
                    stats.written += 1;
                }
            }
        }
        stats
    }

    /// Comparison sample at `uv` against `reference`: 1.0 where `reference`
    /// is less than the stored depth.
    pub fn sample_compare(&self, uv: Vec2, reference: f32, filter: ShadowFilter) -> f32 {
        let res = self.resolution as f32;
        let compare = |x: i64, y: i64| -> f32 {
            if reference < self.texel(x, y) { 1.0 } else { 0.0 }
        };

        match filter {
            ShadowFilter::Nearest => {
                let x = (uv.x * res).floor() as i64;
                let y = (uv.y * res).floor() as i64;
                compare(x, y)
            }
            ShadowFilter::Linear => {
                let px = uv.x * res - 0.5;
                let py = uv.y * res - 0.5;
                let x0 = px.floor();
                let y0 = py.floor();
                let fx = px - x0;
                let fy = py - y0;
                let (x0, y0) = (x0 as i64, y0 as i64);
                let top = compare(x0, y0) * (1.0 - fx) + compare(x0 + 1, y0) * fx;
                let bottom = compare(x0, y0 + 1) * (1.0 - fx) + compare(x0 + 1, y0 + 1) * fx;
                top * (1.0 - fy) + bottom * fy
            }
        }
    }

    /// Shadow factor for a world position, as computed by the lit shader:
    /// fully lit outside the light volume, otherwise a comparison sample.
    pub fn shadow_factor(&self, space: &LightSpace, world: Vec3, filter: ShadowFilter) -> f32 {
        let (uv, reference) = space.shadow_coords(world);
        let outside = uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0 || reference > 1.0;
        if outside {
            return 1.0;
        }
        self.sample_compare(uv, reference, filter)
    }
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Top or left edge of a positive-area triangle in y-down window space.
fn is_top_left(a: Vec2, b: Vec2) -> bool {
    let d = b - a;
    (d.y == 0.0 && d.x > 0.0) || d.y < 0.0
}

fn covers(w: f32, top_left: bool) -> bool {
    w > 0.0 || (w == 0.0 && top_left)
}
