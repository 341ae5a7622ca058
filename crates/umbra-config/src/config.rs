//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level renderer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Window settings.
    pub window: WindowConfig,
    /// Main pass settings.
    pub render: RenderConfig,
    /// Shadow map settings.
    pub shadow: ShadowConfig,
    /// Fly camera settings.
    pub camera: CameraConfig,
    /// Scene and asset settings.
    pub scene: SceneConfig,
    /// Input settings.
    pub input: InputConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Window configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// Window width in logical pixels.
    pub width: u32,
    /// Window height in logical pixels.
    pub height: u32,
    /// Start in fullscreen mode.
    pub fullscreen: bool,
    /// Enable vsync (PresentMode::Fifo).
    pub vsync: bool,
    /// Window title.
    pub title: String,
}

/// Main pass configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Background clear color (linear RGB).
    pub clear_color: [f32; 3],
    /// Show the shadow map overlay at startup.
    pub show_shadow_overlay: bool,
    /// Overlay edge length in physical pixels.
    pub overlay_size: u32,
    /// Draw the cube-mapped sky behind the scene.
    pub sky: bool,
}

/// Filtering applied by the comparison sampler.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum ShadowFilter {
    /// Single comparison per fragment. Hard edges.
    Nearest,
    /// 2x2 hardware PCF. Softer edges.
    #[default]
    Linear,
}

/// Shadow map configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShadowConfig {
    /// Disable to skip the shadow pass entirely.
    pub enabled: bool,
    /// Edge length of the square shadow map in texels.
    pub resolution: u32,
    /// Width and height of the light's orthographic volume in world units.
    pub projection_size: f32,
    /// Orthographic near plane.
    pub near: f32,
    /// Orthographic far plane.
    pub far: f32,
    /// Distance the light eye is placed behind the scene center.
    pub backoff: f32,
    /// Point the light looks at.
    pub center: [f32; 3],
    /// Constant depth bias in units of the minimum resolvable depth step.
    pub depth_bias: i32,
    /// Slope-scaled depth bias.
    pub slope_bias: f32,
    /// Maximum bias; 0 disables clamping.
    pub bias_clamp: f32,
    /// Comparison sampler filtering.
    pub filter: ShadowFilter,
}

/// Fly camera configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    /// Movement speed in world units per second.
    pub move_speed: f32,
    /// Radians of rotation per pixel of mouse motion.
    pub look_speed: f32,
    /// Speed multiplier while Shift is held.
    pub fast_multiplier: f32,
}

/// Scene configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SceneConfig {
    /// Directory holding `*.obj` meshes and a `textures/` folder.
    /// Procedural meshes and textures are used when unset or missing.
    pub asset_dir: Option<PathBuf>,
    /// Ambient light color (linear RGB).
    pub ambient: [f32; 3],
}

/// Input configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    /// Mouse sensitivity multiplier.
    pub mouse_sensitivity: f32,
    /// Invert Y axis for camera.
    pub invert_y: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Start the HTTP inspector (debug builds only).
    pub inspector: bool,
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fullscreen: false,
            vsync: true,
            title: "Umbra".to_string(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.4, 0.6, 0.75],
            show_shadow_overlay: false,
            overlay_size: 256,
            sky: true,
        }
    }
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resolution: 2048,
            projection_size: 15.0,
            near: 1.0,
            far: 100.0,
            backoff: 20.0,
            center: [0.0, 0.0, 0.0],
            depth_bias: 1000,
            slope_bias: 1.0,
            bias_clamp: 0.0,
            filter: ShadowFilter::Linear,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            move_speed: 5.0,
            look_speed: 0.004,
            fast_multiplier: 5.0,
        }
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            asset_dir: None,
            ambient: [0.5, 0.5, 0.5],
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            mouse_sensitivity: 1.0,
            invert_y: false,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            inspector: true,
            log_level: "info".to_string(),
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Re-read `config.ron`; returns `Some(new_config)` only if it differs.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
