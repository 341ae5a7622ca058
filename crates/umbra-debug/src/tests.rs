//! Endpoint tests for the debug inspector.

use crate::{DebugServer, DebugState, Edit, EntitySnapshot, LightSnapshot, SceneSnapshot};
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn start_server(state: DebugState) -> (DebugServer, Arc<Mutex<DebugState>>, String) {
    let state = Arc::new(Mutex::new(state));
    let mut server = DebugServer::new(0); // port 0 = OS assigns
    server.start(state.clone()).unwrap();
    // Give server a moment to start
    thread::sleep(Duration::from_millis(100));
    let base = format!("http://127.0.0.1:{}", server.actual_port());
    (server, state, base)
}

fn scene_with_lights(count: usize) -> DebugState {
    DebugState {
        scene: SceneSnapshot {
            lights: vec![
                LightSnapshot {
                    kind: "directional".to_string(),
                    intensity: 1.0,
                    ..Default::default()
                };
                count
            ],
            ..Default::default()
        },
        ..Default::default()
    }
}

fn status_of(result: Result<ureq::Response, ureq::Error>) -> u16 {
    match result {
        Ok(resp) => resp.status(),
        Err(ureq::Error::Status(code, _)) => code,
        Err(e) => panic!("transport error: {e}"),
    }
}

#[test]
fn test_debug_state_default() {
    let state = DebugState::default();
    assert_eq!(state.frame_count, 0);
    assert_eq!(state.fps, 0.0);
    assert_eq!(state.entity_count, 0);
    assert!(!state.quit_requested);
    assert_eq!(state.pending_edits(), 0);
}

#[test]
fn test_debug_port_parsing() {
    assert_eq!(crate::parse_port(None), 9999);
    assert_eq!(crate::parse_port(Some("8123")), 8123);
    assert_eq!(crate::parse_port(Some("not-a-port")), 9999);
}

#[test]
fn test_health_endpoint() {
    let (mut server, _state, base) = start_server(DebugState::default());

    let resp = ureq::get(&format!("{base}/health")).call().unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = serde_json::from_str(&resp.into_string().unwrap()).unwrap();
    assert_eq!(body["status"], "ok");
    server.stop();
    assert!(!server.is_running());
}

#[test]
fn test_metrics_endpoint_returns_valid_json() {
    let (mut server, _state, base) = start_server(DebugState {
        frame_count: 100,
        frame_time_ms: 16.6,
        fps: 60.2,
        entity_count: 5,
        light_count: 4,
        shadow_draws: 4,
        window_width: 1280,
        window_height: 720,
        uptime_seconds: 1.66,
        ..Default::default()
    });

    let resp = ureq::get(&format!("{base}/metrics")).call().unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = serde_json::from_str(&resp.into_string().unwrap()).unwrap();
    assert_eq!(body["frame_count"], 100);
    assert!((body["fps"].as_f64().unwrap() - 60.2).abs() < 0.01);
    assert_eq!(body["entity_count"], 5);
    assert_eq!(body["shadow_draws"], 4);
    assert_eq!(body["window_width"], 1280);
    // Snapshot and capture fields stay out of the metrics payload.
    assert!(body.get("scene").is_none());
    assert!(body.get("shadow_map_png").is_none());
    server.stop();
}

#[test]
fn test_scene_endpoint() {
    let (mut server, _state, base) = start_server(scene_with_lights(2));

    let resp = ureq::get(&format!("{base}/scene")).call().unwrap();
    let body: serde_json::Value = serde_json::from_str(&resp.into_string().unwrap()).unwrap();
    assert_eq!(body["lights"].as_array().unwrap().len(), 2);
    assert_eq!(body["lights"][0]["kind"], "directional");
    assert!(body["shadow"]["caster"].is_null());
    server.stop();
}

#[test]
fn test_light_edit_is_queued_once() {
    let (mut server, state, base) = start_server(scene_with_lights(2));

    let resp = ureq::post(&format!("{base}/lights/1"))
        .set("Content-Type", "application/json")
        .send_string(r#"{"intensity": 3.0, "color": [1.0, 0.5, 0.25]}"#)
        .unwrap();
    let body: serde_json::Value = serde_json::from_str(&resp.into_string().unwrap()).unwrap();
    assert_eq!(body["queued"], true);
    assert_eq!(body["target"], "light 1");

    let edits = state.lock().unwrap().drain_edits();
    assert_eq!(edits.len(), 1);
    match &edits[0] {
        Edit::Light { index, edit } => {
            assert_eq!(*index, 1);
            assert_eq!(edit.intensity, Some(3.0));
            assert_eq!(edit.color, Some([1.0, 0.5, 0.25]));
            assert_eq!(edit.direction, None);
        }
        other => panic!("unexpected edit {other:?}"),
    }
    assert!(state.lock().unwrap().drain_edits().is_empty());
    server.stop();
}

#[test]
fn test_edit_validation() {
    let (mut server, state, base) = start_server(scene_with_lights(1));

    let out_of_range = ureq::post(&format!("{base}/lights/5")).send_string(r#"{"intensity": 1.0}"#);
    assert_eq!(status_of(out_of_range), 404);

    let bad_json = ureq::post(&format!("{base}/entities/0")).send_string("{not json");
    assert_eq!(status_of(bad_json), 400);

    let unknown_field = ureq::post(&format!("{base}/shadow")).send_string(r#"{"bias": 5}"#);
    assert_eq!(status_of(unknown_field), 400);

    assert_eq!(state.lock().unwrap().pending_edits(), 0);

    let ok = ureq::post(&format!("{base}/shadow")).send_string(r#"{"slope_bias": 2.0, "overlay": true}"#);
    assert_eq!(status_of(ok), 200);
    assert_eq!(state.lock().unwrap().pending_edits(), 1);
    server.stop();
}

#[test]
fn test_render_edit_and_entity_uv_edit() {
    let mut state = scene_with_lights(0);
    state.scene.entities = vec![EntitySnapshot::default()];
    let (mut server, state, base) = start_server(state);

    let resp = ureq::post(&format!("{base}/render"))
        .send_string(r#"{"clear_color": [0.0, 0.0, 0.0], "sky": false}"#)
        .unwrap();
    let body: serde_json::Value = serde_json::from_str(&resp.into_string().unwrap()).unwrap();
    assert_eq!(body["target"], "render");

    let bad = ureq::post(&format!("{base}/render")).send_string(r#"{"clear": [0, 0, 0]}"#);
    assert_eq!(status_of(bad), 400);

    let ok = ureq::post(&format!("{base}/entities/0")).send_string(r#"{"uv_scale": [2.0, 2.0]}"#);
    assert_eq!(status_of(ok), 200);

    let edits = state.lock().unwrap().drain_edits();
    assert_eq!(edits.len(), 2);
    match &edits[0] {
        Edit::Render(edit) => {
            assert_eq!(edit.clear_color, Some([0.0, 0.0, 0.0]));
            assert_eq!(edit.sky, Some(false));
        }
        other => panic!("unexpected edit {other:?}"),
    }
    assert!(matches!(
        &edits[1],
        Edit::Entity { index: 0, edit } if edit.uv_scale == Some([2.0, 2.0])
    ));
    server.stop();
}

#[test]
fn test_scene_reports_mesh_stats_and_background() {
    let mut state = scene_with_lights(0);
    state.scene.entities = vec![EntitySnapshot {
        name: "floor".to_string(),
        vertex_count: 24,
        index_count: 36,
        triangle_count: 12,
        uv_scale: [4.0, 4.0],
        ..Default::default()
    }];
    state.scene.render.clear_color = [0.4, 0.6, 0.75];
    let (mut server, _state, base) = start_server(state);

    let resp = ureq::get(&format!("{base}/scene")).call().unwrap();
    let body: serde_json::Value = serde_json::from_str(&resp.into_string().unwrap()).unwrap();
    let floor = &body["entities"][0];
    assert_eq!(floor["triangle_count"], 12);
    assert_eq!(floor["vertex_count"], 24);
    assert_eq!(floor["uv_scale"][0], 4.0);
    assert_eq!(body["render"]["clear_color"].as_array().unwrap().len(), 3);
    assert_eq!(body["render"]["sky_visible"], false);
    server.stop();
}

#[test]
fn test_command_quit() {
    let (mut server, state, base) = start_server(DebugState::default());

    let resp = ureq::post(&format!("{base}/command"))
        .set("Content-Type", "application/json")
        .send_string(r#"{"command": "quit"}"#)
        .unwrap();
    let body: serde_json::Value = serde_json::from_str(&resp.into_string().unwrap()).unwrap();
    assert_eq!(body["executed"], true);
    assert_eq!(body["command"], "quit");
    assert!(state.lock().unwrap().quit_requested);

    let resp = ureq::post(&format!("{base}/command"))
        .send_string(r#"{"command": "dance"}"#)
        .unwrap();
    let body: serde_json::Value = serde_json::from_str(&resp.into_string().unwrap()).unwrap();
    assert_eq!(body["executed"], false);
    server.stop();
}

#[test]
fn test_shadow_map_png_delivered_by_render_loop() {
    let (mut server, state, base) = start_server(DebugState::default());

    // Stand-in for the render loop answering the capture request.
    let responder = {
        let state = state.clone();
        thread::spawn(move || {
            for _ in 0..100 {
                {
                    let mut guard = state.lock().unwrap();
                    if guard.shadow_map_requested {
                        guard.shadow_map_requested = false;
                        guard.shadow_map_png = Some(crate::encode_depth_png(2, 2, &[0.0, 0.5, 0.5, 1.0]).unwrap());
                        return true;
                    }
                }
                thread::sleep(Duration::from_millis(10));
            }
            false
        })
    };

    let resp = ureq::get(&format!("{base}/shadow-map.png")).call().unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.header("Content-Type").unwrap(), "image/png");
    let mut bytes = Vec::new();
    resp.into_reader().read_to_end(&mut bytes).unwrap();
    assert_eq!(&bytes[0..4], &[0x89, 0x50, 0x4E, 0x47]);
    assert!(responder.join().unwrap());
    server.stop();
}

#[test]
fn test_unknown_endpoint_returns_404() {
    let (mut server, _state, base) = start_server(DebugState::default());
    let resp = ureq::get(&format!("{base}/nonexistent")).call();
    assert_eq!(status_of(resp), 404);
    server.stop();
}
