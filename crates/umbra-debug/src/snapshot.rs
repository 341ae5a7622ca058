//! Plain serializable copies of scene state, published once per frame.
//!
//! These mirror the scene types with arrays instead of glam vectors so this
//! crate stays independent of the renderer.

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LightSnapshot {
    pub kind: String,
    pub direction: [f32; 3],
    pub position: [f32; 3],
    pub range: f32,
    pub intensity: f32,
    pub color: [f32; 3],
    pub spot_inner: f32,
    pub spot_outer: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntitySnapshot {
    pub name: String,
    pub mesh: String,
    pub material: String,
    pub position: [f32; 3],
    /// Pitch, yaw, roll in radians.
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
    pub casts_shadows: bool,
    pub tint: [f32; 4],
    pub roughness: f32,
    pub metalness: f32,
    pub uv_scale: [f32; 2],
    pub uv_offset: [f32; 2],
    pub vertex_count: usize,
    pub index_count: usize,
    pub triangle_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CameraSnapshot {
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShadowSnapshot {
    pub enabled: bool,
    /// Index into the light list, `None` when no directional light exists.
    pub caster: Option<usize>,
    pub resolution: u32,
    pub filter: String,
    pub depth_bias: i32,
    pub slope_bias: f32,
    pub bias_clamp: f32,
    pub projection_size: [f32; 2],
    pub near: f32,
    pub far: f32,
    pub backoff: f32,
    /// Column-major light view-projection of the current caster.
    pub light_view_proj: Option<[[f32; 4]; 4]>,
    pub overlay_visible: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderSnapshot {
    pub clear_color: [f32; 3],
    pub sky_visible: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SceneSnapshot {
    pub active_camera: usize,
    pub cameras: Vec<CameraSnapshot>,
    pub entities: Vec<EntitySnapshot>,
    pub lights: Vec<LightSnapshot>,
    pub ambient: [f32; 3],
    pub shadow: ShadowSnapshot,
    pub render: RenderSnapshot,
}
