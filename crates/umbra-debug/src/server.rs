//! HTTP debug server implementation.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tiny_http::{Header, Method, Request, Response, Server};

use crate::DebugState;
use crate::edit::{CameraEdit, Edit, EntityEdit, LightEdit, RenderEdit, ShadowEdit};

/// How long `/shadow-map.png` waits for the render loop to deliver a capture.
pub const CAPTURE_TIMEOUT: Duration = Duration::from_secs(2);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum DebugServerError {
    #[error("Failed to bind to port {port}: {error}")]
    BindError { port: u16, error: String },
    #[error("Server thread panicked")]
    ThreadPanic,
    #[error("Debug state lock poisoned")]
    StatePoisoned,
}

/// HTTP server for the debug API.
/// Runs on a background thread so the render loop never waits on it.
pub struct DebugServer {
    port: u16,
    actual_port: Option<u16>,
    handle: Option<JoinHandle<()>>,
    shutdown_flag: Arc<AtomicBool>,
}

#[derive(Debug, PartialEq, Eq)]
enum Route {
    Health,
    Metrics,
    Scene,
    ShadowMap,
    Light(usize),
    Entity(usize),
    Camera,
    Shadow,
    Render,
    Command,
    NotFound,
}

fn route(method: &Method, url: &str) -> Route {
    let path = url.split('?').next().unwrap_or(url).trim_end_matches('/');
    match (method, path) {
        (Method::Get, "/health") => Route::Health,
        (Method::Get, "/metrics") => Route::Metrics,
        (Method::Get, "/scene") => Route::Scene,
        (Method::Get, "/shadow-map.png") => Route::ShadowMap,
        (Method::Post, "/camera") => Route::Camera,
        (Method::Post, "/shadow") => Route::Shadow,
        (Method::Post, "/render") => Route::Render,
        (Method::Post, "/command") => Route::Command,
        (Method::Post, path) => {
            let indexed = |prefix: &str| path.strip_prefix(prefix).and_then(|i| i.parse().ok());
            if let Some(index) = indexed("/lights/") {
                Route::Light(index)
            } else if let Some(index) = indexed("/entities/") {
                Route::Entity(index)
            } else {
                Route::NotFound
            }
        }
        _ => Route::NotFound,
    }
}

#[derive(Deserialize)]
struct Command {
    command: String,
}

#[derive(Serialize)]
struct CommandResponse {
    executed: bool,
    command: String,
}

#[derive(Serialize)]
struct EditResponse {
    queued: bool,
    target: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    uptime_seconds: f64,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type HttpResponse = Response<Cursor<Vec<u8>>>;

fn with_content_type(response: HttpResponse, content_type: &str) -> HttpResponse {
    match Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

fn json_response<T: Serialize>(value: &T) -> Result<HttpResponse, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    Ok(with_content_type(
        Response::from_string(json),
        "application/json",
    ))
}

fn error_response(status: u16, message: impl Into<String>) -> Result<HttpResponse, serde_json::Error> {
    Ok(json_response(&ErrorResponse {
        error: message.into(),
    })?
    .with_status_code(status))
}

fn lock(state: &Mutex<DebugState>) -> Result<MutexGuard<'_, DebugState>, DebugServerError> {
    state.lock().map_err(|_| DebugServerError::StatePoisoned)
}

impl DebugServer {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            actual_port: None,
            handle: None,
            shutdown_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn start(&mut self, state: Arc<Mutex<DebugState>>) -> Result<(), DebugServerError> {
        let server = Server::http(format!("127.0.0.1:{}", self.port)).map_err(|e| {
            DebugServerError::BindError {
                port: self.port,
                error: e.to_string(),
            }
        })?;

        let actual_port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .unwrap_or(self.port);
        self.actual_port = Some(actual_port);
        tracing::info!(port = actual_port, "Debug inspector listening");

        self.shutdown_flag.store(false, Ordering::SeqCst);
        let shutdown_flag = self.shutdown_flag.clone();
        let handle = thread::Builder::new()
            .name("umbra-debug".into())
            .spawn(move || Self::run_server(server, state, shutdown_flag))
            .map_err(|e| DebugServerError::BindError {
                port: actual_port,
                error: e.to_string(),
            })?;

        self.handle = Some(handle);
        Ok(())
    }

    /// Signals the server thread and waits for it to finish its current
    /// request.
    pub fn stop(&mut self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("{}", DebugServerError::ThreadPanic);
        }
    }

    pub fn actual_port(&self) -> u16 {
        self.actual_port.unwrap_or(self.port)
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    fn run_server(server: Server, state: Arc<Mutex<DebugState>>, shutdown_flag: Arc<AtomicBool>) {
        while !shutdown_flag.load(Ordering::SeqCst) {
            match server.recv_timeout(POLL_INTERVAL) {
                Ok(Some(request)) => {
                    if let Err(e) = Self::handle_request(request, &state) {
                        tracing::warn!("Debug server error: {e}");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("Debug server stopped: {e}");
                    break;
                }
            }
        }
        tracing::debug!("Debug server thread exiting");
    }

    fn handle_request(
        mut request: Request,
        state: &Arc<Mutex<DebugState>>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let route = route(request.method(), request.url());
        tracing::debug!(method = %request.method(), url = request.url(), ?route, "request");

        let response = match route {
            Route::Health => {
                let uptime_seconds = lock(state)?.uptime_seconds;
                json_response(&HealthResponse {
                    status: "ok".to_string(),
                    uptime_seconds,
                })?
            }
            Route::Metrics => json_response(&*lock(state)?)?,
            Route::Scene => json_response(&lock(state)?.scene)?,
            Route::ShadowMap => match Self::await_shadow_map(state)? {
                Some(png) => with_content_type(Response::from_data(png), "image/png"),
                None => error_response(503, "shadow map capture timed out")?,
            },
            Route::Light(index) => {
                let body = read_body(&mut request)?;
                Self::queue_indexed(state, &body, index, |s| s.scene.lights.len(), |edit: LightEdit| {
                    Edit::Light { index, edit }
                })?
            }
            Route::Entity(index) => {
                let body = read_body(&mut request)?;
                Self::queue_indexed(state, &body, index, |s| s.scene.entities.len(), |edit: EntityEdit| {
                    Edit::Entity { index, edit }
                })?
            }
            Route::Camera => {
                let body = read_body(&mut request)?;
                match serde_json::from_str::<CameraEdit>(&body) {
                    Ok(edit) => Self::queue(state, Edit::Camera(edit))?,
                    Err(e) => error_response(400, e.to_string())?,
                }
            }
            Route::Shadow => {
                let body = read_body(&mut request)?;
                match serde_json::from_str::<ShadowEdit>(&body) {
                    Ok(edit) => Self::queue(state, Edit::Shadow(edit))?,
                    Err(e) => error_response(400, e.to_string())?,
                }
            }
            Route::Render => {
                let body = read_body(&mut request)?;
                match serde_json::from_str::<RenderEdit>(&body) {
                    Ok(edit) => Self::queue(state, Edit::Render(edit))?,
                    Err(e) => error_response(400, e.to_string())?,
                }
            }
            Route::Command => {
                let body = read_body(&mut request)?;
                match serde_json::from_str::<Command>(&body) {
                    Ok(command) => {
                        let executed = match command.command.as_str() {
                            "quit" => {
                                lock(state)?.quit_requested = true;
                                true
                            }
                            _ => false,
                        };
                        json_response(&CommandResponse {
                            executed,
                            command: command.command,
                        })?
                    }
                    Err(e) => error_response(400, e.to_string())?,
                }
            }
            Route::NotFound => Response::from_string("Not Found").with_status_code(404),
        };

        request.respond(response)?;
        Ok(())
    }

    fn queue(state: &Mutex<DebugState>, edit: Edit) -> Result<HttpResponse, Box<dyn std::error::Error + Send + Sync>> {
        let target = edit.target();
        lock(state)?.queue_edit(edit);
        Ok(json_response(&EditResponse {
            queued: true,
            target,
        })?)
    }

    /// Parses `body` as `T` and queues it if `index` exists in the current
    /// snapshot.
    fn queue_indexed<T: serde::de::DeserializeOwned>(
        state: &Mutex<DebugState>,
        body: &str,
        index: usize,
        len: impl Fn(&DebugState) -> usize,
        make: impl FnOnce(T) -> Edit,
    ) -> Result<HttpResponse, Box<dyn std::error::Error + Send + Sync>> {
        let edit = match serde_json::from_str::<T>(body) {
            Ok(edit) => edit,
            Err(e) => return Ok(error_response(400, e.to_string())?),
        };
        let count = len(&*lock(state)?);
        if index >= count {
            return Ok(error_response(404, format!("index {index} out of range ({count})"))?);
        }
        Self::queue(state, make(edit))
    }

    /// Raises the capture flag and waits for the render loop's PNG.
    fn await_shadow_map(state: &Mutex<DebugState>) -> Result<Option<Vec<u8>>, DebugServerError> {
        {
            let mut guard = lock(state)?;
            guard.shadow_map_png = None;
            guard.shadow_map_requested = true;
        }
        let deadline = Instant::now() + CAPTURE_TIMEOUT;
        while Instant::now() < deadline {
            if let Some(png) = lock(state)?.shadow_map_png.take() {
                return Ok(Some(png));
            }
            thread::sleep(Duration::from_millis(10));
        }
        lock(state)?.shadow_map_requested = false;
        Ok(None)
    }
}

fn read_body(request: &mut Request) -> std::io::Result<String> {
    let mut body = String::new();
    request.as_reader().read_to_string(&mut body)?;
    Ok(body)
}

impl Drop for DebugServer {
    fn drop(&mut self) {
        self.stop();
    }
}
