//! HTTP scene inspector for Umbra.
//!
//! Serves frame metrics and scene snapshots, the shadow map as a PNG, and
//! accepts edits to lights, entities, the active camera, shadow settings and
//! the background.
//! The server only runs in debug builds.

pub mod capture;
pub mod edit;
pub mod server;
pub mod snapshot;

pub use capture::{CaptureError, encode_depth_png};
pub use edit::{CameraEdit, Edit, EntityEdit, LightEdit, RenderEdit, ShadowEdit};
pub use server::{DebugServer, DebugServerError};
pub use snapshot::{
    CameraSnapshot, EntitySnapshot, LightSnapshot, RenderSnapshot, SceneSnapshot, ShadowSnapshot,
};

#[cfg(test)]
mod tests;

/// Environment variable overriding the inspector port.
pub const DEBUG_PORT_ENV: &str = "UMBRA_DEBUG_PORT";

pub const DEFAULT_DEBUG_PORT: u16 = 9999;

/// State shared between the render loop and the debug server.
///
/// The render loop publishes metrics and a scene snapshot every frame and
/// drains queued edits; the server reads snapshots and queues edits.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DebugState {
    pub frame_count: u64,
    pub frame_time_ms: f64,
    pub fps: f64,
    pub entity_count: u32,
    pub light_count: u32,
    /// Draws issued by the last shadow pass.
    pub shadow_draws: u32,
    pub window_width: u32,
    pub window_height: u32,
    pub uptime_seconds: f64,
    pub quit_requested: bool,
    #[serde(skip)]
    pub scene: SceneSnapshot,
    /// Set by the server; the render loop answers with `shadow_map_png`.
    #[serde(skip)]
    pub shadow_map_requested: bool,
    #[serde(skip)]
    pub shadow_map_png: Option<Vec<u8>>,
    #[serde(skip)]
    pending_edits: Vec<Edit>,
}

impl DebugState {
    pub fn queue_edit(&mut self, edit: Edit) {
        self.pending_edits.push(edit);
    }

    /// Takes every queued edit, oldest first.
    pub fn drain_edits(&mut self) -> Vec<Edit> {
        std::mem::take(&mut self.pending_edits)
    }

    pub fn pending_edits(&self) -> usize {
        self.pending_edits.len()
    }
}

/// Creates a debug server in debug builds, returns None in release builds.
pub fn create_debug_server(port: u16) -> Option<DebugServer> {
    if cfg!(debug_assertions) {
        Some(DebugServer::new(port))
    } else {
        None
    }
}

/// Port from `UMBRA_DEBUG_PORT`, else 9999.
pub fn debug_port() -> u16 {
    parse_port(std::env::var(DEBUG_PORT_ENV).ok().as_deref())
}

fn parse_port(value: Option<&str>) -> u16 {
    value
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(DEFAULT_DEBUG_PORT)
}
