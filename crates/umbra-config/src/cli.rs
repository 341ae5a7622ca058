//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, ShadowFilter};

/// Umbra command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "umbra", about = "Shadow-mapped forward renderer")]
pub struct CliArgs {
    /// Window width.
    #[arg(long)]
    pub width: Option<u32>,

    /// Window height.
    #[arg(long)]
    pub height: Option<u32>,

    /// Enable or disable vsync.
    #[arg(long)]
    pub vsync: Option<bool>,

    /// Shadow map resolution in texels (square).
    #[arg(long)]
    pub shadow_resolution: Option<u32>,

    /// Shadow comparison filter.
    #[arg(long, value_enum)]
    pub shadow_filter: Option<ShadowFilter>,

    /// Constant depth bias applied in the shadow pass.
    #[arg(long, allow_negative_numbers = true)]
    pub depth_bias: Option<i32>,

    /// Slope-scaled depth bias applied in the shadow pass.
    #[arg(long)]
    pub slope_bias: Option<f32>,

    /// Disable the shadow pass.
    #[arg(long)]
    pub no_shadows: bool,

    /// Directory with OBJ meshes and textures.
    #[arg(long)]
    pub asset_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.window.width = w;
        }
        if let Some(h) = args.height {
            self.window.height = h;
        }
        if let Some(vsync) = args.vsync {
            self.window.vsync = vsync;
        }
        if let Some(res) = args.shadow_resolution {
            self.shadow.resolution = res;
        }
        if let Some(filter) = args.shadow_filter {
            self.shadow.filter = filter;
        }
        if let Some(bias) = args.depth_bias {
            self.shadow.depth_bias = bias;
        }
        if let Some(slope) = args.slope_bias {
            self.shadow.slope_bias = slope;
        }
        if args.no_shadows {
            self.shadow.enabled = false;
        }
        if let Some(ref dir) = args.asset_dir {
            self.scene.asset_dir = Some(dir.clone());
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
