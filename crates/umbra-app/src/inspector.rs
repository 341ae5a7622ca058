//! Bridge between the scene and the HTTP inspector.
//!
//! Once per frame, after the fixed updates and before any render commands are
//! recorded, queued edits are applied to the scene (read-modify-write) and a
//! fresh snapshot is published. The render thread never waits on the server.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use glam::{Vec2, Vec3, Vec4};
use tracing::{debug, info, warn};
use umbra_config::{Config, ShadowFilter};
use umbra_debug::{
    CameraEdit, CameraSnapshot, DebugServer, DebugState, Edit, EntityEdit, EntitySnapshot,
    LightEdit, LightSnapshot, RenderEdit, RenderSnapshot, SceneSnapshot, ShadowEdit,
    ShadowSnapshot, create_debug_server, debug_port, encode_depth_png,
};
use umbra_lighting::{LightKind, ShadowCaster, ShadowSettings};
use umbra_scene::SceneContext;

use crate::renderer::RenderControls;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("{target} does not exist")]
    NotFound { target: String },

    #[error("unknown light kind {0:?}")]
    UnknownLightKind(String),

    #[error("unknown shadow filter {0:?}")]
    UnknownFilter(String),

    #[error("light direction must be non-zero and finite")]
    DegenerateDirection,

    #[error("{field} must be finite")]
    NotFinite { field: &'static str },
}

fn finite(field: &'static str, value: f32) -> Result<f32, EditError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EditError::NotFinite { field })
    }
}

fn finite2(field: &'static str, v: [f32; 2]) -> Result<Vec2, EditError> {
    let v = Vec2::from_array(v);
    if v.is_finite() {
        Ok(v)
    } else {
        Err(EditError::NotFinite { field })
    }
}

fn finite3(field: &'static str, v: [f32; 3]) -> Result<Vec3, EditError> {
    let v = Vec3::from_array(v);
    if v.is_finite() {
        Ok(v)
    } else {
        Err(EditError::NotFinite { field })
    }
}

/// Applies one inspector edit. An edit either applies completely or not at
/// all.
pub fn apply_edit(
    scene: &mut SceneContext,
    controls: &mut RenderControls,
    edit: Edit,
) -> Result<(), EditError> {
    match edit {
        Edit::Light { index, edit } => apply_light_edit(scene, index, edit),
        Edit::Entity { index, edit } => apply_entity_edit(scene, index, edit),
        Edit::Camera(edit) => apply_camera_edit(scene, edit),
        Edit::Shadow(edit) => apply_shadow_edit(controls, edit),
        Edit::Render(edit) => apply_render_edit(controls, edit),
    }
}

fn apply_light_edit(scene: &mut SceneContext, index: usize, edit: LightEdit) -> Result<(), EditError> {
    let kind = edit
        .kind
        .map(|name| LightKind::parse(&name).ok_or(EditError::UnknownLightKind(name)))
        .transpose()?;
    let direction = edit.direction.map(|d| finite3("direction", d)).transpose()?;
    if direction.is_some_and(|d| d.length_squared() == 0.0) {
        return Err(EditError::DegenerateDirection);
    }
    let position = edit.position.map(|p| finite3("position", p)).transpose()?;
    let color = edit.color.map(|c| finite3("color", c)).transpose()?;

    let light = scene.lights.get_mut(index).ok_or_else(|| EditError::NotFound {
        target: format!("light {index}"),
    })?;
    if let Some(kind) = kind {
        light.set_kind(kind);
    }
    if let Some(direction) = direction {
        light.set_direction(direction);
    }
    if let Some(position) = position {
        light.set_position(position);
    }
    if let Some(range) = edit.range {
        light.set_range(range);
    }
    if let Some(intensity) = edit.intensity {
        light.set_intensity(intensity);
    }
    if let Some(color) = color {
        light.set_color(color);
    }
    if edit.spot_inner.is_some() || edit.spot_outer.is_some() {
        light.set_spot_angles(
            edit.spot_inner.unwrap_or(light.spot_inner()),
            edit.spot_outer.unwrap_or(light.spot_outer()),
        );
    }
    Ok(())
}

fn apply_entity_edit(scene: &mut SceneContext, index: usize, edit: EntityEdit) -> Result<(), EditError> {
    let position = edit.position.map(|p| finite3("position", p)).transpose()?;
    let rotation = edit.rotation.map(|r| finite3("rotation", r)).transpose()?;
    let scale = edit.scale.map(|s| finite3("scale", s)).transpose()?;
    let tint = edit.tint.map(Vec4::from_array);
    if tint.is_some_and(|t| !t.is_finite()) {
        return Err(EditError::NotFinite { field: "tint" });
    }
    let uv_scale = edit.uv_scale.map(|s| finite2("uv_scale", s)).transpose()?;
    let uv_offset = edit.uv_offset.map(|o| finite2("uv_offset", o)).transpose()?;

    let entity = scene.entities.get_mut(index).ok_or_else(|| EditError::NotFound {
        target: format!("entity {index}"),
    })?;
    if let Some(position) = position {
        entity.transform.set_position(position);
    }
    if let Some(rotation) = rotation {
        entity.transform.set_rotation(rotation);
    }
    if let Some(scale) = scale {
        entity.transform.set_scale(scale);
    }
    if let Some(casts_shadows) = edit.casts_shadows {
        entity.casts_shadows = casts_shadows;
    }

    // Material parameters live on the shared material.
    let handle = entity.material;
    if let Some(material) = scene.material_mut(handle) {
        if let Some(tint) = tint {
            material.tint = tint;
        }
        if let Some(roughness) = edit.roughness {
            material.set_roughness(roughness);
        }
        if let Some(metalness) = edit.metalness {
            material.set_metalness(metalness);
        }
        if let Some(scale) = uv_scale {
            material.uv_scale = scale;
        }
        if let Some(offset) = uv_offset {
            material.uv_offset = offset;
        }
    }
    Ok(())
}

fn apply_camera_edit(scene: &mut SceneContext, edit: CameraEdit) -> Result<(), EditError> {
    let position = edit.position.map(|p| finite3("position", p)).transpose()?;
    let rotation = edit.rotation.map(|r| finite3("rotation", r)).transpose()?;
    let fov_y = edit.fov_y.map(|f| finite("fov_y", f)).transpose()?;

    if let Some(index) = edit.active
        && !scene.select_camera(index)
    {
        return Err(EditError::NotFound {
            target: format!("camera {index}"),
        });
    }
    let Some(camera) = scene.active_camera_mut() else {
        return Err(EditError::NotFound {
            target: "active camera".to_string(),
        });
    };
    if let Some(position) = position {
        camera.transform.set_position(position);
    }
    if let Some(rotation) = rotation {
        camera.transform.set_rotation(rotation);
    }
    if let Some(fov_y) = fov_y {
        camera.fov_y = fov_y.clamp(1f32.to_radians(), 179f32.to_radians());
    }
    Ok(())
}

fn apply_shadow_edit(controls: &mut RenderControls, edit: ShadowEdit) -> Result<(), EditError> {
    let filter = edit
        .filter
        .map(|name| {
            <ShadowFilter as clap::ValueEnum>::from_str(&name, true)
                .map_err(|_| EditError::UnknownFilter(name))
        })
        .transpose()?;
    let slope = edit.slope_bias.map(|s| finite("slope_bias", s)).transpose()?;
    let clamp = edit.bias_clamp.map(|c| finite("bias_clamp", c)).transpose()?;

    if let Some(enabled) = edit.enabled {
        controls.enabled = enabled;
    }
    if let Some(filter) = filter {
        controls.filter = filter;
    }
    if let Some(constant) = edit.depth_bias {
        controls.bias.constant = constant;
    }
    if let Some(slope) = slope {
        controls.bias.slope_scale = slope;
    }
    if let Some(clamp) = clamp {
        controls.bias.clamp = clamp;
    }
    if let Some(overlay) = edit.overlay {
        controls.overlay = overlay;
    }
    Ok(())
}

fn apply_render_edit(controls: &mut RenderControls, edit: RenderEdit) -> Result<(), EditError> {
    let clear_color = edit.clear_color.map(|c| finite3("clear_color", c)).transpose()?;
    if let Some(color) = clear_color {
        controls.clear_color = color.clamp(Vec3::ZERO, Vec3::ONE).to_array();
    }
    if let Some(sky) = edit.sky {
        controls.sky = sky;
    }
    Ok(())
}

/// Copies the scene into the inspector's plain snapshot types.
pub fn snapshot_scene(
    scene: &SceneContext,
    settings: &ShadowSettings,
    controls: &RenderControls,
    caster: Option<&ShadowCaster>,
) -> SceneSnapshot {
    let lights = scene
        .lights
        .iter()
        .map(|l| LightSnapshot {
            kind: l.kind().as_str().to_string(),
            direction: l.direction().to_array(),
            position: l.position().to_array(),
            range: l.range(),
            intensity: l.intensity(),
            color: l.color().to_array(),
            spot_inner: l.spot_inner(),
            spot_outer: l.spot_outer(),
        })
        .collect();

    let entities = scene
        .entities
        .iter()
        .map(|e| {
            let material = scene.material(e.material);
            let mesh = scene.mesh(e.mesh);
            EntitySnapshot {
                name: e.name.clone(),
                mesh: mesh.map(|m| m.name.clone()).unwrap_or_default(),
                material: material.map(|m| m.name.clone()).unwrap_or_default(),
                position: e.transform.position().to_array(),
                rotation: e.transform.rotation().to_array(),
                scale: e.transform.scale().to_array(),
                casts_shadows: e.casts_shadows,
                tint: material.map_or([1.0; 4], |m| m.tint.to_array()),
                roughness: material.map_or(1.0, |m| m.roughness),
                metalness: material.map_or(0.0, |m| m.metalness),
                uv_scale: material.map_or([1.0; 2], |m| m.uv_scale.to_array()),
                uv_offset: material.map_or([0.0; 2], |m| m.uv_offset.to_array()),
                vertex_count: mesh.map_or(0, |m| m.vertices.len()),
                index_count: mesh.map_or(0, |m| m.indices.len()),
                triangle_count: mesh.map_or(0, |m| m.triangle_count()),
            }
        })
        .collect();

    let cameras = scene
        .cameras()
        .iter()
        .map(|c| CameraSnapshot {
            position: c.position().to_array(),
            rotation: c.transform.rotation().to_array(),
            fov_y: c.fov_y,
            near: c.near,
            far: c.far,
        })
        .collect();

    let projection = &settings.projection;
    SceneSnapshot {
        active_camera: scene.active_camera_index(),
        cameras,
        entities,
        lights,
        ambient: scene.ambient.to_array(),
        shadow: ShadowSnapshot {
            enabled: controls.enabled,
            caster: caster.map(|c| c.index),
            resolution: settings.resolution,
            filter: format!("{:?}", controls.filter).to_lowercase(),
            depth_bias: controls.bias.constant,
            slope_bias: controls.bias.slope_scale,
            bias_clamp: controls.bias.clamp,
            projection_size: [projection.width, projection.height],
            near: projection.near,
            far: projection.far,
            backoff: projection.backoff,
            light_view_proj: caster.map(|c| c.space.view_projection().to_cols_array_2d()),
            overlay_visible: controls.overlay,
        },
        render: RenderSnapshot {
            clear_color: controls.clear_color,
            sky_visible: controls.sky,
        },
    }
}

/// Frame metrics published alongside the snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameMetrics {
    pub frame_count: u64,
    pub frame_time: f64,
    pub window_size: (u32, u32),
    pub shadow_draws: usize,
}

/// Owns the inspector server and the state shared with it.
pub struct Inspector {
    state: Arc<Mutex<DebugState>>,
    server: Option<DebugServer>,
    start_time: Instant,
}

impl Inspector {
    /// Starts the server when enabled in config and running a debug build.
    pub fn start(config: &Config) -> Self {
        let state = Arc::new(Mutex::new(DebugState::default()));
        let server = if config.debug.inspector {
            create_debug_server(debug_port()).and_then(|mut server| {
                match server.start(state.clone()) {
                    Ok(()) => Some(server),
                    Err(e) => {
                        warn!("Failed to start debug inspector: {e}");
                        None
                    }
                }
            })
        } else {
            None
        };
        Self {
            state,
            server,
            start_time: Instant::now(),
        }
    }

    /// Inspector without a server, for headless use.
    pub fn detached() -> Self {
        Self {
            state: Arc::new(Mutex::new(DebugState::default())),
            server: None,
            start_time: Instant::now(),
        }
    }

    pub fn port(&self) -> Option<u16> {
        self.server.as_ref().map(DebugServer::actual_port)
    }

    pub fn state(&self) -> Arc<Mutex<DebugState>> {
        self.state.clone()
    }

    /// Applies every queued edit. Returns how many applied.
    pub fn apply_pending(&self, scene: &mut SceneContext, controls: &mut RenderControls) -> usize {
        let edits = match self.state.lock() {
            Ok(mut state) => state.drain_edits(),
            Err(_) => return 0,
        };
        let mut applied = 0;
        for edit in edits {
            let target = edit.target();
            match apply_edit(scene, controls, edit) {
                Ok(()) => {
                    debug!(%target, "Inspector edit applied");
                    applied += 1;
                }
                Err(e) => warn!(%target, "Inspector edit rejected: {e}"),
            }
        }
        applied
    }

    pub fn publish(&self, metrics: FrameMetrics, snapshot: SceneSnapshot) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.frame_count = metrics.frame_count;
        state.frame_time_ms = metrics.frame_time * 1000.0;
        state.fps = if metrics.frame_time > 0.0 {
            1.0 / metrics.frame_time
        } else {
            0.0
        };
        state.entity_count = snapshot.entities.len() as u32;
        state.light_count = snapshot.lights.len() as u32;
        state.shadow_draws = metrics.shadow_draws as u32;
        (state.window_width, state.window_height) = metrics.window_size;
        state.uptime_seconds = self.start_time.elapsed().as_secs_f64();
        state.scene = snapshot;
    }

    pub fn quit_requested(&self) -> bool {
        self.state.lock().map(|s| s.quit_requested).unwrap_or(false)
    }

    /// Takes a pending shadow map capture request.
    pub fn take_capture_request(&self) -> bool {
        match self.state.lock() {
            Ok(mut state) => std::mem::take(&mut state.shadow_map_requested),
            Err(_) => false,
        }
    }

    /// Encodes a depth readback and hands it to the waiting request.
    pub fn deliver_capture(&self, resolution: u32, depth: &[f32]) {
        match encode_depth_png(resolution, resolution, depth) {
            Ok(png) => {
                if let Ok(mut state) = self.state.lock() {
                    state.shadow_map_png = Some(png);
                }
                info!(resolution, "Shadow map captured");
            }
            Err(e) => warn!("Shadow map capture failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_scene::{DemoOptions, build_demo_scene};

    fn demo() -> (SceneContext, RenderControls) {
        let config = Config::default();
        (
            build_demo_scene(&DemoOptions::default()),
            RenderControls::from_config(&config),
        )
    }

    #[test]
    fn test_light_edit_applies_through_setters() {
        let (mut scene, mut controls) = demo();
        let edit = LightEdit {
            direction: Some([0.0, -2.0, 0.0]),
            intensity: Some(-4.0),
            spot_inner: Some(0.6),
            ..Default::default()
        };
        apply_edit(&mut scene, &mut controls, Edit::Light { index: 4, edit }).unwrap();
        let light = &scene.lights[4];
        assert!((light.direction() - Vec3::NEG_Y).length() < 1e-6);
        assert_eq!(light.intensity(), 0.0);
        assert!(light.spot_inner() <= light.spot_outer());
    }

    #[test]
    fn test_light_color_and_kind_edits_keep_invariants() {
        let (mut scene, mut controls) = demo();
        let edit = LightEdit {
            kind: Some("spot".into()),
            color: Some([2.0, -1.0, 0.25]),
            position: Some([1.0, 4.0, 1.0]),
            ..Default::default()
        };
        apply_edit(&mut scene, &mut controls, Edit::Light { index: 1, edit }).unwrap();
        let light = &scene.lights[1];
        assert_eq!(light.kind(), LightKind::Spot);
        assert_eq!(light.color(), Vec3::new(2.0, 0.0, 0.25));
        assert_eq!(light.position(), Vec3::new(1.0, 4.0, 1.0));
        assert!((light.direction().length() - 1.0).abs() < 1e-6);

        let before = scene.lights[1];
        let bad = LightEdit {
            color: Some([f32::NAN, 0.0, 0.0]),
            intensity: Some(5.0),
            ..Default::default()
        };
        let err = apply_edit(&mut scene, &mut controls, Edit::Light { index: 1, edit: bad }).unwrap_err();
        assert_eq!(err, EditError::NotFinite { field: "color" });
        assert_eq!(scene.lights[1], before);
    }

    #[test]
    fn test_rejected_light_edit_changes_nothing() {
        let (mut scene, mut controls) = demo();
        let before = scene.lights[0];
        let edit = LightEdit {
            intensity: Some(9.0),
            direction: Some([0.0, 0.0, 0.0]),
            ..Default::default()
        };
        let err = apply_edit(&mut scene, &mut controls, Edit::Light { index: 0, edit }).unwrap_err();
        assert_eq!(err, EditError::DegenerateDirection);
        assert_eq!(scene.lights[0], before);

        let edit = LightEdit {
            kind: Some("area".into()),
            ..Default::default()
        };
        let err = apply_edit(&mut scene, &mut controls, Edit::Light { index: 0, edit }).unwrap_err();
        assert_eq!(err, EditError::UnknownLightKind("area".into()));
    }

    #[test]
    fn test_retyping_caster_moves_shadows() {
        let (mut scene, mut controls) = demo();
        let settings = ShadowSettings::default();
        assert_eq!(scene.shadow_caster(&settings.projection).map(|c| c.index), Some(0));

        let edit = LightEdit {
            kind: Some("point".into()),
            ..Default::default()
        };
        apply_edit(&mut scene, &mut controls, Edit::Light { index: 0, edit }).unwrap();
        assert_eq!(scene.shadow_caster(&settings.projection).map(|c| c.index), Some(1));
    }

    #[test]
    fn test_entity_edit_updates_transform_and_material() {
        let (mut scene, mut controls) = demo();
        let edit = EntityEdit {
            position: Some([1.0, 2.0, 3.0]),
            casts_shadows: Some(false),
            roughness: Some(2.0),
            ..Default::default()
        };
        apply_edit(&mut scene, &mut controls, Edit::Entity { index: 0, edit }).unwrap();
        let entity = &scene.entities[0];
        assert_eq!(entity.transform.position(), Vec3::new(1.0, 2.0, 3.0));
        assert!(!entity.casts_shadows);
        assert_eq!(scene.material(entity.material).unwrap().roughness, 1.0);

        let missing = apply_edit(
            &mut scene,
            &mut controls,
            Edit::Entity {
                index: 99,
                edit: EntityEdit::default(),
            },
        );
        assert!(matches!(missing, Err(EditError::NotFound { .. })));
    }

    #[test]
    fn test_entity_uv_edit_reaches_snapshot() {
        let (mut scene, mut controls) = demo();
        let edit = EntityEdit {
            uv_scale: Some([4.0, 2.0]),
            uv_offset: Some([0.5, 0.25]),
            ..Default::default()
        };
        apply_edit(&mut scene, &mut controls, Edit::Entity { index: 0, edit }).unwrap();
        let material = scene.material(scene.entities[0].material).unwrap();
        assert_eq!(material.uv_scale, Vec2::new(4.0, 2.0));
        assert_eq!(material.uv_offset, Vec2::new(0.5, 0.25));

        let snapshot = snapshot_scene(&scene, &ShadowSettings::default(), &controls, None);
        assert_eq!(snapshot.entities[0].uv_scale, [4.0, 2.0]);
        assert_eq!(snapshot.entities[0].uv_offset, [0.5, 0.25]);

        let bad = EntityEdit {
            uv_scale: Some([f32::INFINITY, 1.0]),
            position: Some([9.0, 9.0, 9.0]),
            ..Default::default()
        };
        let err = apply_edit(&mut scene, &mut controls, Edit::Entity { index: 0, edit: bad });
        assert_eq!(err, Err(EditError::NotFinite { field: "uv_scale" }));
        assert_ne!(scene.entities[0].transform.position(), Vec3::splat(9.0));
    }

    #[test]
    fn test_render_edit_sets_clear_color_and_sky() {
        let (mut scene, mut controls) = demo();
        let edit = RenderEdit {
            clear_color: Some([0.1, 2.0, -0.5]),
            sky: Some(false),
        };
        apply_edit(&mut scene, &mut controls, Edit::Render(edit)).unwrap();
        assert_eq!(controls.clear_color, [0.1, 1.0, 0.0]);
        assert!(!controls.sky);

        let snapshot = snapshot_scene(&scene, &ShadowSettings::default(), &controls, None);
        assert_eq!(snapshot.render.clear_color, [0.1, 1.0, 0.0]);
        assert!(!snapshot.render.sky_visible);

        let bad = RenderEdit {
            clear_color: Some([f32::NAN, 0.0, 0.0]),
            sky: Some(true),
        };
        assert!(apply_edit(&mut scene, &mut controls, Edit::Render(bad)).is_err());
        assert!(!controls.sky);
    }

    #[test]
    fn test_camera_edit_switches_then_moves() {
        let (mut scene, mut controls) = demo();
        let edit = CameraEdit {
            active: Some(2),
            position: Some([0.0, 5.0, 0.0]),
            ..Default::default()
        };
        apply_edit(&mut scene, &mut controls, Edit::Camera(edit)).unwrap();
        assert_eq!(scene.active_camera_index(), 2);
        assert_eq!(scene.cameras()[2].position(), Vec3::new(0.0, 5.0, 0.0));

        let bad = CameraEdit {
            active: Some(7),
            ..Default::default()
        };
        assert!(apply_edit(&mut scene, &mut controls, Edit::Camera(bad)).is_err());
        assert_eq!(scene.active_camera_index(), 2);
    }

    #[test]
    fn test_shadow_edit() {
        let (mut scene, mut controls) = demo();
        let edit = ShadowEdit {
            filter: Some("Nearest".into()),
            depth_bias: Some(250),
            slope_bias: Some(2.0),
            overlay: Some(true),
            ..Default::default()
        };
        apply_edit(&mut scene, &mut controls, Edit::Shadow(edit)).unwrap();
        assert_eq!(controls.filter, ShadowFilter::Nearest);
        assert_eq!(controls.bias.constant, 250);
        assert_eq!(controls.bias.slope_scale, 2.0);
        assert!(controls.overlay);

        let bad = ShadowEdit {
            filter: Some("bilinear".into()),
            ..Default::default()
        };
        assert_eq!(
            apply_edit(&mut scene, &mut controls, Edit::Shadow(bad)),
            Err(EditError::UnknownFilter("bilinear".into()))
        );
    }

    #[test]
    fn test_snapshot_reflects_scene() {
        let (scene, controls) = demo();
        let settings = ShadowSettings::default();
        let caster = scene.shadow_caster(&settings.projection);
        let snapshot = snapshot_scene(&scene, &settings, &controls, caster.as_ref());

        assert_eq!(snapshot.lights.len(), scene.lights.len());
        assert_eq!(snapshot.entities.len(), scene.entities.len());
        assert_eq!(snapshot.cameras.len(), 3);
        assert_eq!(snapshot.lights[0].kind, "directional");
        assert_eq!(snapshot.shadow.caster, Some(0));
        assert_eq!(snapshot.shadow.filter, "linear");
        assert!(snapshot.shadow.light_view_proj.is_some());

        let floor = snapshot.entities.iter().find(|e| e.name == "floor").unwrap();
        assert!(!floor.casts_shadows);
        assert_eq!(floor.scale, [15.0, 1.0, 15.0]);
        for entity in &snapshot.entities {
            assert!(entity.vertex_count > 0, "{}", entity.name);
            assert_eq!(entity.index_count, entity.triangle_count * 3);
        }
        assert_eq!(snapshot.render.clear_color, Config::default().render.clear_color);
        assert!(snapshot.render.sky_visible);
    }

    #[test]
    fn test_pending_edits_apply_once() {
        let (mut scene, mut controls) = demo();
        let inspector = Inspector::detached();
        {
            let state = inspector.state();
            let mut state = state.lock().unwrap();
            state.queue_edit(Edit::Light {
                index: 1,
                edit: LightEdit {
                    intensity: Some(3.0),
                    ..Default::default()
                },
            });
            state.queue_edit(Edit::Entity {
                index: 500,
                edit: EntityEdit::default(),
            });
        }
        assert_eq!(inspector.apply_pending(&mut scene, &mut controls), 1);
        assert_eq!(scene.lights[1].intensity(), 3.0);
        assert_eq!(inspector.apply_pending(&mut scene, &mut controls), 0);
    }

    #[test]
    fn test_publish_and_capture() {
        let inspector = Inspector::detached();
        inspector.publish(
            FrameMetrics {
                frame_count: 10,
                frame_time: 0.02,
                window_size: (1280, 720),
                shadow_draws: 7,
            },
            SceneSnapshot::default(),
        );
        {
            let state = inspector.state();
            let mut state = state.lock().unwrap();
            assert_eq!(state.frame_count, 10);
            assert!((state.fps - 50.0).abs() < 1e-9);
            assert_eq!(state.shadow_draws, 7);
            state.shadow_map_requested = true;
        }
        assert!(inspector.take_capture_request());
        assert!(!inspector.take_capture_request());

        inspector.deliver_capture(2, &[0.0, 0.5, 1.0, 1.0]);
        assert!(inspector.state().lock().unwrap().shadow_map_png.is_some());
    }
}
