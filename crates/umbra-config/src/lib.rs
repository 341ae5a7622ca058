//! Configuration for the Umbra renderer.
//!
//! Settings persist to disk as `config.ron` and can be overridden from the
//! command line. Every section is `#[serde(default)]` so older or partial
//! files keep loading.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    CameraConfig, Config, DebugConfig, InputConfig, RenderConfig, SceneConfig, ShadowConfig,
    ShadowFilter, WindowConfig,
};
pub use error::ConfigError;
