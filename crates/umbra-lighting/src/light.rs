//! Directional, point, and spot lights plus their GPU layout.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Maximum number of lights uploaded per frame.
pub const MAX_LIGHTS: usize = 16;

/// Emitter type. Discriminants match the `kind` field read by the lit shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum LightKind {
    Directional = 0,
    Point = 1,
    Spot = 2,
}

impl LightKind {
    /// Lowercase name used by the inspector.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Directional => "directional",
            Self::Point => "point",
            Self::Spot => "spot",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "directional" => Some(Self::Directional),
            "point" => Some(Self::Point),
            "spot" => Some(Self::Spot),
            _ => None,
        }
    }
}

/// A light source.
///
/// Fields are only reachable through accessors. Every setter keeps the
/// invariants: a unit direction, finite position, non-negative range,
/// intensity and color, and `spot_inner <= spot_outer`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    kind: LightKind,
    /// Unit vector pointing from the light toward the scene.
    direction: Vec3,
    position: Vec3,
    /// Distance at which point and spot contributions reach zero.
    range: f32,
    intensity: f32,
    /// Linear RGB.
    color: Vec3,
    /// Full-intensity half angle of a spot cone, radians.
    spot_inner: f32,
    /// Zero-intensity half angle of a spot cone, radians.
    spot_outer: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            kind: LightKind::Directional,
            direction: Vec3::NEG_Y,
            position: Vec3::ZERO,
            range: 10.0,
            intensity: 1.0,
            color: Vec3::ONE,
            spot_inner: 10f32.to_radians(),
            spot_outer: 30f32.to_radians(),
        }
    }
}

impl Light {
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        let mut light = Self {
            kind: LightKind::Directional,
            ..Self::default()
        };
        light.set_color(color);
        light.set_direction(direction);
        light.set_intensity(intensity);
        light
    }

    pub fn point(position: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        let mut light = Self {
            kind: LightKind::Point,
            ..Self::default()
        };
        light.set_position(position);
        light.set_color(color);
        light.set_intensity(intensity);
        light.set_range(range);
        light
    }

    #[allow(clippy::too_many_arguments)]
    pub fn spot(
        position: Vec3,
        direction: Vec3,
        color: Vec3,
        intensity: f32,
        range: f32,
        inner: f32,
        outer: f32,
    ) -> Self {
        let mut light = Self {
            kind: LightKind::Spot,
            ..Self::default()
        };
        light.set_position(position);
        light.set_color(color);
        light.set_direction(direction);
        light.set_intensity(intensity);
        light.set_range(range);
        light.set_spot_angles(inner, outer);
        light
    }

    pub fn kind(&self) -> LightKind {
        self.kind
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn range(&self) -> f32 {
        self.range
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn color(&self) -> Vec3 {
        self.color
    }

    pub fn spot_inner(&self) -> f32 {
        self.spot_inner
    }

    pub fn spot_outer(&self) -> f32 {
        self.spot_outer
    }

    /// Retyping keeps every other parameter, so a spot turned point and back
    /// gets its cone again.
    pub fn set_kind(&mut self, kind: LightKind) {
        self.kind = kind;
    }

    /// Non-finite positions are rejected and the previous one kept.
    pub fn set_position(&mut self, position: Vec3) -> bool {
        if position.is_finite() {
            self.position = position;
            true
        } else {
            false
        }
    }

    /// Negative channels clamp to zero; a non-finite color is rejected.
    pub fn set_color(&mut self, color: Vec3) -> bool {
        if color.is_finite() {
            self.color = color.max(Vec3::ZERO);
            true
        } else {
            false
        }
    }

    /// Normalizes and stores `dir`. A zero or non-finite vector is rejected
    /// and the previous direction kept.
    pub fn set_direction(&mut self, dir: Vec3) -> bool {
        match dir.try_normalize() {
            Some(n) => {
                self.direction = n;
                true
            }
            None => false,
        }
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = if intensity.is_finite() { intensity.max(0.0) } else { 0.0 };
    }

    pub fn set_range(&mut self, range: f32) {
        self.range = if range.is_finite() { range.max(0.0) } else { 0.0 };
    }

    /// Sets cone half angles, raising `outer` to `inner` if needed.
    pub fn set_spot_angles(&mut self, inner: f32, outer: f32) {
        let inner = inner.clamp(0.0, std::f32::consts::FRAC_PI_2);
        self.spot_inner = inner;
        self.spot_outer = outer.clamp(inner, std::f32::consts::FRAC_PI_2);
    }

    /// Whether `direction` is meaningful for this kind.
    pub fn has_direction(&self) -> bool {
        matches!(self.kind, LightKind::Directional | LightKind::Spot)
    }

    /// Cone falloff for a unit vector from the light to a point.
    pub fn spot_factor(&self, to_point: Vec3) -> f32 {
        let cos_angle = self.direction.dot(to_point);
        smoothstep(self.spot_outer.cos(), self.spot_inner.cos(), cos_angle)
    }

    /// Unshadowed radiance scale reaching `point`, ignoring surface orientation.
    pub fn radiance_at(&self, point: Vec3) -> f32 {
        match self.kind {
            LightKind::Directional => self.intensity,
            LightKind::Point => {
                self.intensity * attenuation(point.distance(self.position), self.range)
            }
            LightKind::Spot => {
                let offset = point - self.position;
                let distance = offset.length();
                let to_point = offset.try_normalize().unwrap_or(self.direction);
                self.intensity * attenuation(distance, self.range) * self.spot_factor(to_point)
            }
        }
    }

    pub fn to_uniform(&self) -> LightUniform {
        LightUniform {
            direction: self.direction.to_array(),
            kind: self.kind as u32,
            position: self.position.to_array(),
            range: self.range,
            color: self.color.to_array(),
            intensity: self.intensity,
            spot_cos_inner: self.spot_inner.cos(),
            spot_cos_outer: self.spot_outer.cos(),
            _padding: [0.0; 2],
        }
    }
}

/// Range falloff: `saturate(1 - d²/r²)²`, exactly zero at and beyond `range`.
pub fn attenuation(distance: f32, range: f32) -> f32 {
    if range <= 0.0 || distance >= range {
        return 0.0;
    }
    let t = (1.0 - (distance * distance) / (range * range)).clamp(0.0, 1.0);
    t * t
}

/// Hermite interpolation matching WGSL `smoothstep`.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge0 == edge1 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// One light as laid out in the lit shader's uniform array. 64 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct LightUniform {
    pub direction: [f32; 3],
    pub kind: u32,
    pub position: [f32; 3],
    pub range: f32,
    pub color: [f32; 3],
    pub intensity: f32,
    pub spot_cos_inner: f32,
    pub spot_cos_outer: f32,
    pub _padding: [f32; 2],
}

/// Light array, ambient term, and shadow caster index. 1056 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct LightsUniform {
    /// rgb = ambient color, a unused.
    pub ambient: [f32; 4],
    /// x = light count, y = caster index (`u32::MAX` when none).
    pub counts: [u32; 4],
    pub lights: [LightUniform; MAX_LIGHTS],
}

impl LightsUniform {
    /// Packs up to [`MAX_LIGHTS`] lights. Extra lights are dropped.
    pub fn new(lights: &[Light], ambient: Vec3, caster: Option<usize>) -> Self {
        if lights.len() > MAX_LIGHTS {
            log::warn!(
                "{} lights in scene, only the first {MAX_LIGHTS} are uploaded",
                lights.len()
            );
        }
        let mut uniform = Self::zeroed();
        let count = lights.len().min(MAX_LIGHTS);
        for (slot, light) in uniform.lights.iter_mut().zip(lights) {
            *slot = light.to_uniform();
        }
        uniform.ambient = ambient.extend(1.0).to_array();
        let caster = caster.filter(|&i| i < count).map_or(u32::MAX, |i| i as u32);
        uniform.counts = [count as u32, caster, 0, 0];
        uniform
    }
}
