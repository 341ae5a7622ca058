//! The binary entry point for Umbra.

use clap::Parser;
use umbra_app::platform::PlatformDirs;
use umbra_config::{CliArgs, Config};

fn main() {
    let args = CliArgs::parse();

    let dirs = match PlatformDirs::resolve_and_create() {
        Ok(dirs) => dirs,
        Err(e) => {
            eprintln!("Failed to initialize platform directories: {e}");
            std::process::exit(1);
        }
    };
    let config_dir = args.config.clone().unwrap_or_else(|| dirs.config_dir.clone());

    let mut config = match Config::load_or_create(&config_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_dir.display());
            Config::default()
        }
    };
    config.apply_cli_overrides(&args);

    umbra_log::init_logging(Some(&dirs.log_dir), cfg!(debug_assertions), Some(&config));
    tracing::info!(config = %config_dir.display(), logs = %dirs.log_dir.display(), "Umbra starting");

    if let Err(e) = umbra_app::window::run(config) {
        tracing::error!("Event loop failed: {e}");
        std::process::exit(1);
    }
}
