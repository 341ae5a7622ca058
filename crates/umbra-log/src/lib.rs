//! Structured logging for Umbra.
//!
//! Console output via `tracing-subscriber`, plus a JSON log file in debug
//! builds. Library crates that log through the `log` facade are picked up by
//! the subscriber's `tracing-log` bridge.

use std::path::Path;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use umbra_config::Config;

/// Filter used when neither `RUST_LOG` nor the config provides one.
pub const DEFAULT_FILTER: &str = "info,wgpu=warn,naga=warn";

/// Name of the JSON log file written in debug builds.
pub const LOG_FILE_NAME: &str = "umbra.log";

/// Initialize the global tracing subscriber.
///
/// * `log_dir` - directory for the JSON log file (debug builds only)
/// * `debug_build` - enables file logging
/// * `config` - supplies `debug.log_level` when `RUST_LOG` is unset
///
/// ```no_run
/// use umbra_config::Config;
/// use umbra_log::init_logging;
///
/// let config = Config::default();
/// init_logging(None, false, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let filter_str = filter_directives(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join(LOG_FILE_NAME))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        tracing::debug!(dir = %log_dir.display(), "file logging enabled");
        return;
    }

    subscriber.init();
}

/// Resolve the filter directive string from config.
///
/// A bare level such as `"debug"` keeps graphics backends at `warn` so that
/// raising the app's verbosity does not flood the console with wgpu internals.
pub fn filter_directives(config: Option<&Config>) -> String {
    let level = config
        .map(|c| c.debug.log_level.trim())
        .filter(|level| !level.is_empty());

    match level {
        None => DEFAULT_FILTER.to_string(),
        Some(level) if level.contains('=') || level.contains(',') => level.to_string(),
        Some(level) => format!("{level},wgpu=warn,naga=warn"),
    }
}

/// Create an `EnvFilter` with [`DEFAULT_FILTER`].
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}
