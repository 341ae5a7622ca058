//! Window creation and event handling via winit.
//!
//! [`App`] implements winit's [`ApplicationHandler`]. Each redraw gathers
//! input, runs the fixed-rate camera update, applies inspector edits, renders,
//! then publishes metrics and a fresh scene snapshot.

use std::sync::Arc;

use glam::{Vec2, Vec3};
use tracing::{error, info, instrument, warn};
use umbra_config::Config;
use umbra_input::{ControlSettings, FrameControls, KeyboardState, MouseState};
use umbra_render::{RenderContext, SurfaceError, init_render_context_blocking};
use umbra_scene::{DemoOptions, SceneContext, build_demo_scene};
use winit::application::ApplicationHandler;
use winit::error::EventLoopError;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Fullscreen, Window, WindowAttributes, WindowId};

use crate::game_loop::GameLoop;
use crate::inspector::{FrameMetrics, Inspector, snapshot_scene};
use crate::renderer::{FrameReport, SceneRenderer};

/// Returns [`WindowAttributes`] based on the given configuration.
pub fn window_attributes_from_config(config: &Config) -> WindowAttributes {
    let attrs = WindowAttributes::default()
        .with_title(config.window.title.clone())
        .with_inner_size(winit::dpi::LogicalSize::new(
            config.window.width as f64,
            config.window.height as f64,
        ));
    if config.window.fullscreen {
        attrs.with_fullscreen(Some(Fullscreen::Borderless(None)))
    } else {
        attrs
    }
}

/// GPU-side state, created once the event loop resumes.
struct Graphics {
    window: Arc<Window>,
    gpu: RenderContext,
    renderer: SceneRenderer,
}

pub struct App {
    config: Config,
    scene: SceneContext,
    graphics: Option<Graphics>,
    game_loop: GameLoop,
    keyboard: KeyboardState,
    mouse: MouseState,
    controls: ControlSettings,
    inspector: Inspector,
    last_report: FrameReport,
}

impl App {
    pub fn new(config: Config) -> Self {
        let scene = build_demo_scene(&DemoOptions::from_config(&config));
        let inspector = Inspector::start(&config);
        if let Some(port) = inspector.port() {
            info!("Debug inspector listening on 127.0.0.1:{port}");
        }
        Self {
            controls: ControlSettings {
                mouse_sensitivity: config.input.mouse_sensitivity,
                invert_y: config.input.invert_y,
            },
            config,
            scene,
            graphics: None,
            game_loop: GameLoop::new(),
            keyboard: KeyboardState::new(),
            mouse: MouseState::new(),
            inspector,
            last_report: FrameReport::default(),
        }
    }

    pub fn scene(&self) -> &SceneContext {
        &self.scene
    }

    fn init_graphics(&mut self, event_loop: &ActiveEventLoop) -> Option<Graphics> {
        let window = match event_loop.create_window(window_attributes_from_config(&self.config)) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("Window creation failed: {e}");
                return None;
            }
        };
        let gpu = match init_render_context_blocking(window.clone(), self.config.window.vsync) {
            Ok(gpu) => gpu,
            Err(e) => {
                error!("GPU initialization failed: {e}");
                return None;
            }
        };
        let (width, height) = gpu.size();
        self.scene.set_aspect_ratio(width, height);

        let renderer = match SceneRenderer::new(&gpu, &self.scene, &self.config) {
            Ok(renderer) => renderer,
            Err(e) => {
                error!("Renderer initialization failed: {e}");
                return None;
            }
        };
        info!(width, height, "Renderer ready");
        Some(Graphics {
            window,
            gpu,
            renderer,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let Some(g) = &mut self.graphics {
            g.gpu.resize(width, height);
            g.renderer.resize(&g.gpu.device, width, height);
        }
        self.scene.set_aspect_ratio(width, height);
        info!("Window resized to {width}x{height}");
    }

    /// Runs one frame. Returns false when the app should exit.
    fn redraw(&mut self) -> bool {
        let Some(g) = &mut self.graphics else {
            return true;
        };

        if self.inspector.quit_requested() {
            info!("Quit requested via debug inspector");
            return false;
        }

        let input = FrameControls::gather(&self.keyboard, &self.mouse, &self.controls);
        if input.quit {
            info!("Escape pressed, shutting down");
            return false;
        }
        if let Some(index) = input.select_camera {
            if self.scene.select_camera(index) {
                info!(index, "Camera selected");
            } else {
                warn!(index, "No such camera");
            }
        }
        if input.toggle_overlay {
            g.renderer.toggle_overlay();
        }

        // Look is a per-frame drag; movement integrates at the fixed rate.
        let speed = if input.fast {
            self.config.camera.fast_multiplier
        } else {
            1.0
        };
        if let Some(camera) = self.scene.active_camera_mut() {
            camera.fly(Vec3::ZERO, input.look, 1.0, 0.0);
        }
        let scene = &mut self.scene;
        let timing = self.game_loop.tick(|dt| {
            if let Some(camera) = scene.active_camera_mut() {
                camera.fly(input.movement, Vec2::ZERO, speed, dt as f32);
            }
        });

        let mut controls = g.renderer.controls();
        self.inspector.apply_pending(&mut self.scene, &mut controls);
        g.renderer.apply_controls(&g.gpu.device, controls);

        match g.renderer.render(&g.gpu, &self.scene) {
            Ok(report) => self.last_report = report,
            Err(SurfaceError::Lost) => {
                let (width, height) = g.gpu.size();
                g.gpu.resize(width, height);
            }
            Err(SurfaceError::OutOfMemory) => {
                error!("GPU out of memory");
                return false;
            }
            Err(SurfaceError::Timeout) => warn!("Surface timeout, skipping frame"),
        }

        if self.inspector.take_capture_request() {
            let map = g.renderer.shadow_map();
            match map.read_depth(&g.gpu.device, &g.gpu.queue) {
                Some(depth) => self.inspector.deliver_capture(map.resolution, &depth),
                None => warn!("Shadow map readback failed"),
            }
        }

        let snapshot = snapshot_scene(
            &self.scene,
            g.renderer.settings(),
            &g.renderer.controls(),
            self.last_report.caster.as_ref(),
        );
        self.inspector.publish(
            FrameMetrics {
                frame_count: self.game_loop.frame_count(),
                frame_time: timing.frame_time,
                window_size: g.gpu.size(),
                shadow_draws: self.last_report.shadow_draws,
            },
            snapshot,
        );

        self.keyboard.clear_transients();
        self.mouse.clear_transients();
        g.window.request_redraw();
        true
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.graphics.is_some() {
            return;
        }
        match self.init_graphics(event_loop) {
            Some(graphics) => {
                graphics.window.request_redraw();
                self.graphics = Some(graphics);
            }
            None => event_loop.exit(),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => self.resize(size.width, size.height),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self.graphics.as_ref().map(|g| g.window.inner_size()) {
                    self.resize(size.width, size.height);
                }
            }
            WindowEvent::Focused(false) => self.keyboard.release_all(),
            WindowEvent::KeyboardInput { event, .. } => self.keyboard.process_event(&event),
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse.on_cursor_moved(position.x, position.y);
            }
            WindowEvent::CursorLeft { .. } => self.mouse.on_cursor_left(),
            WindowEvent::MouseInput { state, button, .. } => self.mouse.on_button(button, state),
            WindowEvent::MouseWheel { delta, .. } => self.mouse.on_scroll(delta),
            WindowEvent::RedrawRequested => {
                if !self.redraw() {
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }
}

/// Creates the event loop and runs until the window closes or quit is
/// requested.
#[instrument(skip_all)]
pub fn run(config: Config) -> Result<(), EventLoopError> {
    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_attributes_from_config() {
        let mut config = Config::default();
        config.window.width = 800;
        config.window.height = 600;
        config.window.title = "umbra test".to_string();
        let attrs = window_attributes_from_config(&config);
        assert_eq!(attrs.title, "umbra test");
        assert!(attrs.fullscreen.is_none());

        config.window.fullscreen = true;
        let attrs = window_attributes_from_config(&config);
        assert!(attrs.fullscreen.is_some());
    }
}
