//! Light-space view and projection for the shadow-casting directional light.
//!
//! The light eye sits `backoff` units behind the scene center along the light
//! direction and looks down that direction. A fixed orthographic box maps the
//! shadowed region into clip space with depth in `[0, 1]` (near → 0).

use glam::{Mat4, Vec2, Vec3, Vec3Swizzles, Vec4Swizzles};
use umbra_config::ShadowConfig;

use crate::light::{Light, LightKind};

/// Above this `|dir · Y|` the world up axis is considered parallel to the light.
const PARALLEL_THRESHOLD: f32 = 0.99;

/// Orthographic volume and eye placement for the light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightProjection {
    pub width: f32,
    pub height: f32,
    pub near: f32,
    pub far: f32,
    pub backoff: f32,
    pub center: Vec3,
}

impl Default for LightProjection {
    fn default() -> Self {
        Self {
            width: 15.0,
            height: 15.0,
            near: 1.0,
            far: 100.0,
            backoff: 20.0,
            center: Vec3::ZERO,
        }
    }
}

impl LightProjection {
    pub fn from_config(config: &ShadowConfig) -> Self {
        Self {
            width: config.projection_size,
            height: config.projection_size,
            near: config.near,
            far: config.far,
            backoff: config.backoff,
            center: Vec3::from_array(config.center),
        }
    }

    pub fn matrix(&self) -> Mat4 {
        let hw = self.width * 0.5;
        let hh = self.height * 0.5;
        Mat4::orthographic_rh(-hw, hw, -hh, hh, self.near, self.far)
    }
}

/// Up vector for the light view. Falls back to +Z when the light is
/// (anti)parallel to world up, where `look_to` would otherwise divide by zero.
pub fn light_up_vector(direction: Vec3) -> Vec3 {
    if direction.y.abs() > PARALLEL_THRESHOLD {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

/// Maps NDC xy to shadow map texture coordinates (v grows downward).
pub fn ndc_to_shadow_uv(ndc: Vec2) -> Vec2 {
    Vec2::new(ndc.x * 0.5 + 0.5, -ndc.y * 0.5 + 0.5)
}

/// Light view and projection for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSpace {
    pub eye: Vec3,
    pub direction: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
}

impl LightSpace {
    /// Builds the light matrices for `direction`. Returns `None` for a zero or
    /// non-finite direction.
    pub fn new(direction: Vec3, projection: &LightProjection) -> Option<Self> {
        let direction = direction.try_normalize()?;
        let eye = projection.center - direction * projection.backoff;
        let view = Mat4::look_to_rh(eye, direction, light_up_vector(direction));
        Some(Self {
            eye,
            direction,
            view,
            projection: projection.matrix(),
        })
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// World position to light NDC (x, y in [-1, 1], z in [0, 1] inside the volume).
    pub fn to_ndc(&self, world: Vec3) -> Vec3 {
        let clip = self.view_projection() * world.extend(1.0);
        clip.xyz() / clip.w
    }

    /// World position to shadow map uv plus the reference depth.
    pub fn shadow_coords(&self, world: Vec3) -> (Vec2, f32) {
        let ndc = self.to_ndc(world);
        (ndc_to_shadow_uv(ndc.xy()), ndc.z)
    }
}

/// The light whose contribution is attenuated by the shadow map this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCaster {
    /// Index into the scene's light list.
    pub index: usize,
    pub space: LightSpace,
}

/// Picks the first directional light as the caster.
///
/// Point and spot lights never cast. With no directional light the frame is
/// rendered without shadows.
pub fn select_shadow_caster(
    lights: &[Light],
    projection: &LightProjection,
) -> Option<ShadowCaster> {
    lights
        .iter()
        .enumerate()
        .filter(|(_, light)| light.kind() == LightKind::Directional)
        .find_map(|(index, light)| {
            LightSpace::new(light.direction(), projection).map(|space| ShadowCaster { index, space })
        })
}

/// Logs caster availability changes once per transition instead of every frame.
#[derive(Debug, Default)]
pub struct CasterWatch {
    last: Option<Option<usize>>,
}

impl CasterWatch {
    /// Records this frame's caster. Returns `true` when it changed.
    pub fn observe(&mut self, caster: Option<usize>) -> bool {
        if self.last == Some(caster) {
            return false;
        }
        match caster {
            Some(index) => log::info!("Shadow caster: light {index}"),
            None => log::warn!("No directional light in scene, shadow casting skipped"),
        }
        self.last = Some(caster);
        true
    }
}
