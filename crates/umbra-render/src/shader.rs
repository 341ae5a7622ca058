//! Shader module registry.
//!
//! Every pipeline's WGSL is embedded in the binary. When a shader directory is
//! configured, a `<name>.wgsl` file found there replaces the embedded source.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use thiserror::Error;

use crate::lit_pipeline::LIT_SHADER_SOURCE;
use crate::overlay::OVERLAY_SHADER_SOURCE;
use crate::shadow_pipeline::SHADOW_SHADER_SOURCE;
use crate::sky::SKY_SHADER_SOURCE;

pub const SHADOW_SHADER: &str = "shadow";
pub const LIT_SHADER: &str = "lit";
pub const OVERLAY_SHADER: &str = "overlay";
pub const SKY_SHADER: &str = "sky";

/// Embedded sources, registered by [`ShaderLibrary::with_builtins`].
pub const BUILTIN_SHADERS: [(&str, &str); 4] = [
    (SHADOW_SHADER, SHADOW_SHADER_SOURCE),
    (LIT_SHADER, LIT_SHADER_SOURCE),
    (OVERLAY_SHADER, OVERLAY_SHADER_SOURCE),
    (SKY_SHADER, SKY_SHADER_SOURCE),
];

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("shader '{name}' has an empty source")]
    EmptySource { name: String },

    #[error("failed to read shader file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("shader '{name}' not found in library")]
    NotLoaded { name: String },
}

#[derive(Default)]
pub struct ShaderLibrary {
    modules: HashMap<String, Arc<wgpu::ShaderModule>>,
    shader_dir: Option<PathBuf>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory searched for `<name>.wgsl` overrides.
    pub fn with_shader_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shader_dir = Some(dir.into());
        self
    }

    /// Registers every embedded shader, preferring files from the shader directory.
    pub fn with_builtins(mut self, device: &wgpu::Device) -> Result<Self, ShaderError> {
        for (name, source) in BUILTIN_SHADERS {
            match self.override_path(name) {
                Some(path) => self.load_from_file(device, name, &path)?,
                None => self.load_from_source(device, name, source)?,
            };
        }
        Ok(self)
    }

    fn override_path(&self, name: &str) -> Option<PathBuf> {
        let path = self.shader_dir.as_ref()?.join(format!("{name}.wgsl"));
        path.is_file().then_some(path)
    }

    pub fn load_from_source(
        &mut self,
        device: &wgpu::Device,
        name: &str,
        source: &str,
    ) -> Result<Arc<wgpu::ShaderModule>, ShaderError> {
        if source.trim().is_empty() {
            return Err(ShaderError::EmptySource {
                name: name.to_string(),
            });
        }
        debug!("Compiling shader '{name}'");

        let module = Arc::new(device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        }));
        if self.modules.insert(name.to_string(), module.clone()).is_some() {
            info!("Replaced shader '{name}'");
        }
        Ok(module)
    }

    pub fn load_from_file(
        &mut self,
        device: &wgpu::Device,
        name: &str,
        path: &Path,
    ) -> Result<Arc<wgpu::ShaderModule>, ShaderError> {
        let source = std::fs::read_to_string(path).map_err(|source| ShaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loading shader '{name}' from {}", path.display());
        self.load_from_source(device, name, &source)
    }

    pub fn get(&self, name: &str) -> Result<Arc<wgpu::ShaderModule>, ShaderError> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| ShaderError::NotLoaded {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_device() -> Option<wgpu::Device> {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions::default())
                .await
                .ok()?;
            let (device, _queue) = adapter
                .request_device(&wgpu::DeviceDescriptor::default())
                .await
                .ok()?;
            Some(device)
        })
    }

    #[test]
    fn test_builtin_entry_points_present() {
        assert!(SHADOW_SHADER_SOURCE.contains("fn vs_shadow"));
        assert!(!SHADOW_SHADER_SOURCE.contains("@fragment"));
        assert!(LIT_SHADER_SOURCE.contains("fn vs_main"));
        assert!(LIT_SHADER_SOURCE.contains("fn fs_main"));
        assert!(LIT_SHADER_SOURCE.contains("textureSampleCompareLevel"));
        assert!(OVERLAY_SHADER_SOURCE.contains("textureLoad"));
        assert!(SKY_SHADER_SOURCE.contains("textureSample("));
    }

    #[test]
    fn test_missing_shader_is_error() {
        let library = ShaderLibrary::new();
        assert!(library.is_empty());
        assert!(matches!(
            library.get("lit"),
            Err(ShaderError::NotLoaded { name }) if name == "lit"
        ));
    }

    #[test]
    fn test_empty_source_rejected() {
        let Some(device) = create_test_device() else {
            return;
        };
        let mut library = ShaderLibrary::new();
        let result = library.load_from_source(&device, "blank", "  \n");
        assert!(matches!(result, Err(ShaderError::EmptySource { .. })));
        assert!(library.is_empty());
    }

    #[test]
    fn test_builtins_registered() {
        let Some(device) = create_test_device() else {
            return;
        };
        let library = ShaderLibrary::new().with_builtins(&device).unwrap();
        assert_eq!(library.len(), BUILTIN_SHADERS.len());
        for (name, _) in BUILTIN_SHADERS {
            assert!(library.get(name).is_ok());
        }
    }

    #[test]
    fn test_shader_dir_override() {
        let Some(device) = create_test_device() else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("shadow.wgsl"), SHADOW_SHADER_SOURCE).unwrap();
        let library = ShaderLibrary::new()
            .with_shader_dir(dir.path())
            .with_builtins(&device)
            .unwrap();
        assert!(library.contains(SHADOW_SHADER));
        assert_eq!(library.override_path(SHADOW_SHADER), Some(dir.path().join("shadow.wgsl")));
        assert_eq!(library.override_path(LIT_SHADER), None);
    }
}
