//! Platform directory resolution.
//!
//! Config and log locations follow OS conventions (XDG on Linux, Known
//! Folders on Windows, Library on macOS) via `dirs`.

use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("could not determine OS configuration directory")]
    NoConfigDir,

    #[error("platform I/O error: {0}")]
    Io(#[from] io::Error),
}

/// OS-specific directories for Umbra.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDirs {
    /// Holds `config.ron`.
    pub config_dir: PathBuf,
    /// Holds `umbra.log` in debug builds.
    pub log_dir: PathBuf,
}

const APP_NAME: &str = "umbra";

impl PlatformDirs {
    /// Resolves directories without creating them.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::NoConfigDir`] if the OS does not expose a
    /// configuration directory.
    pub fn resolve() -> Result<Self, PlatformError> {
        let config_base = dirs::config_dir().ok_or(PlatformError::NoConfigDir)?;
        let log_base = dirs::data_local_dir().unwrap_or_else(|| config_base.clone());
        Ok(Self {
            config_dir: config_base.join(APP_NAME),
            log_dir: log_base.join(APP_NAME).join("logs"),
        })
    }

    /// Resolves directories and creates them on disk.
    pub fn resolve_and_create() -> Result<Self, PlatformError> {
        let dirs = Self::resolve()?;
        dirs.create_dirs()?;
        Ok(dirs)
    }

    /// Directories rooted under `root`, for tests and portable installs.
    pub fn resolve_with_root(root: &Path) -> Self {
        let app_dir = root.join(APP_NAME);
        Self {
            config_dir: app_dir.join("config"),
            log_dir: app_dir.join("logs"),
        }
    }

    pub fn create_dirs(&self) -> Result<(), PlatformError> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_absolute() {
        let Ok(dirs) = PlatformDirs::resolve() else {
            // Headless environments without HOME have no config dir.
            return;
        };
        assert!(dirs.config_dir.is_absolute());
        assert!(dirs.log_dir.is_absolute());
        assert!(dirs.config_dir.ends_with(APP_NAME));
    }

    #[test]
    fn test_directory_creation() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = PlatformDirs::resolve_with_root(tmp.path());
        dirs.create_dirs().unwrap();
        assert!(dirs.config_dir.is_dir());
        assert!(dirs.log_dir.is_dir());
        // Idempotent.
        dirs.create_dirs().unwrap();
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            PlatformError::NoConfigDir.to_string(),
            "could not determine OS configuration directory"
        );
    }
}
