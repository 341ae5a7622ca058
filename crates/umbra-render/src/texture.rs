//! Material textures: loading, procedural fallbacks, and GPU upload.
//!
//! A texture named `bronze_albedo` is looked up as
//! `<asset_dir>/textures/bronze_albedo.png` (then `.jpg`). If no file exists a
//! procedural texture of the same name is generated, and unknown names fall
//! back to plain white.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use umbra_scene::SamplerKind;

/// Edge length of generated textures.
pub const PROCEDURAL_SIZE: u32 = 64;

const FILE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("texture data size ({actual}) does not match expected ({expected}) for {width}x{height}")]
    DataSizeMismatch {
        actual: usize,
        expected: usize,
        width: u32,
        height: u32,
    },

    #[error("texture dimensions must be non-zero, got {width}x{height}")]
    ZeroDimensions { width: u32, height: u32 },

    #[error("sky face '{face}' is {width}x{height}, expected {expected}x{expected}")]
    CubeFace {
        face: &'static str,
        width: u32,
        height: u32,
        expected: u32,
    },
}

/// How texel values are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// sRGB-encoded color, decoded on sample.
    Color,
    /// Linear data such as normals, roughness, or metalness.
    Data,
}

impl TextureKind {
    pub fn format(self) -> wgpu::TextureFormat {
        match self {
            Self::Color => wgpu::TextureFormat::Rgba8UnormSrgb,
            Self::Data => wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}

/// Tightly packed RGBA8 pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct TexturePixels {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TexturePixels {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::ZeroDimensions { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(TextureError::DataSizeMismatch {
                actual: rgba.len(),
                expected,
                width,
                height,
            });
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn solid(color: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            rgba: color.to_vec(),
        }
    }

    fn generate(size: u32, texel: impl Fn(u32, u32) -> [u8; 4]) -> Self {
        let mut rgba = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                rgba.extend_from_slice(&texel(x, y));
            }
        }
        Self {
            width: size,
            height: size,
            rgba,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]]
    }
}

/// Reads `<asset_dir>/textures/<name>.{png,jpg,jpeg}`. `Ok(None)` if no file exists.
pub fn load_texture_file(asset_dir: &Path, name: &str) -> Result<Option<TexturePixels>, TextureError> {
    let dir = asset_dir.join("textures");
    let Some(path) = FILE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .find(|p| p.is_file())
    else {
        return Ok(None);
    };

    let image = image::open(&path)
        .map_err(|source| TextureError::Decode {
            path: path.clone(),
            source,
        })?
        .to_rgba8();
    let (width, height) = image.dimensions();
    log::debug!("Loaded texture {} ({width}x{height})", path.display());
    TexturePixels::new(width, height, image.into_raw()).map(Some)
}

/// Generated stand-ins for the demo's texture set.
pub fn procedural_texture(name: &str) -> Option<TexturePixels> {
    let size = PROCEDURAL_SIZE;
    let pixels = match name {
        "bronze_albedo" => TexturePixels::generate(size, |x, y| {
            let grain = (hash(x, y / 16) % 24) as u8;
            [196 + grain / 2, 122 + grain / 3, 52 + grain / 4, 255]
        }),
        "bronze_normal" => TexturePixels::generate(size, |x, _| {
            // Brushed ridges along v.
            let phase = x as f32 / size as f32 * std::f32::consts::TAU * 8.0;
            let nx = phase.sin() * 0.15;
            let nz = (1.0 - nx * nx).sqrt();
            [encode_unorm(nx), 128, encode_unorm(nz), 255]
        }),
        "bronze_roughness" => TexturePixels::generate(size, |x, y| {
            let r = 90 + (hash(x / 2, y) % 40) as u8;
            [r, r, r, 255]
        }),
        "bronze_metal" => TexturePixels::generate(size, |_, _| [255, 255, 255, 255]),
        "ice" => TexturePixels::generate(size, |x, y| {
            let crack = (x + 2 * y) % 23 == 0 || (3 * x + size - y) % 31 == 0;
            if crack {
                [170, 200, 220, 255]
            } else {
                let frost = (hash(x, y) % 20) as u8;
                [225 + frost, 235 + frost / 2, 245, 255]
            }
        }),
        "tiles" => TexturePixels::generate(size, |x, y| {
            let grout = x % 16 == 0 || y % 16 == 0;
            let checker = ((x / 16) + (y / 16)) % 2 == 0;
            match (grout, checker) {
                (true, _) => [60, 60, 60, 255],
                (false, true) => [200, 200, 200, 255],
                (false, false) => [150, 150, 150, 255],
            }
        }),
        _ => return None,
    };
    Some(pixels)
}

/// File, then procedural, then white. Decode errors are logged and treated
/// as a missing file.
pub fn resolve_texture(asset_dir: Option<&Path>, name: &str) -> TexturePixels {
    if let Some(dir) = asset_dir {
        match load_texture_file(dir, name) {
            Ok(Some(pixels)) => return pixels,
            Ok(None) => {}
            Err(e) => log::warn!("{e}, using generated texture"),
        }
    }
    procedural_texture(name).unwrap_or_else(|| {
        log::warn!("No texture named '{name}', using white");
        TexturePixels::solid([255; 4])
    })
}

fn encode_unorm(v: f32) -> u8 {
    ((v * 0.5 + 0.5).clamp(0.0, 1.0) * 255.0).round() as u8
}

fn hash(x: u32, y: u32) -> u32 {
    let mut h = x.wrapping_mul(0x27d4_eb2d) ^ y.wrapping_mul(0x1656_67b1);
    h ^= h >> 15;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^ (h >> 13)
}

/// A sampled texture on the GPU.
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub dimensions: (u32, u32),
}

impl GpuTexture {
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        pixels: &TexturePixels,
        kind: TextureKind,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: pixels.width,
            height: pixels.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: kind.format(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &pixels.rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(pixels.width * 4),
                rows_per_image: None,
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            dimensions: (pixels.width, pixels.height),
        }
    }
}

/// Caches textures by name and owns the material samplers.
pub struct TextureManager {
    textures: HashMap<(String, TextureKind), Arc<GpuTexture>>,
    asset_dir: Option<PathBuf>,
    sampler_linear: wgpu::Sampler,
    sampler_nearest: wgpu::Sampler,
    white: Arc<GpuTexture>,
    flat_normal: Arc<GpuTexture>,
}

impl TextureManager {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, asset_dir: Option<PathBuf>) -> Self {
        let sampler = |label, filter, mipmap_filter| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::Repeat,
                address_mode_v: wgpu::AddressMode::Repeat,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter,
                ..Default::default()
            })
        };
        let sampler_linear = sampler(
            "sampler-linear",
            wgpu::FilterMode::Linear,
            wgpu::MipmapFilterMode::Linear,
        );
        let sampler_nearest = sampler(
            "sampler-nearest",
            wgpu::FilterMode::Nearest,
            wgpu::MipmapFilterMode::Nearest,
        );

        let white = Arc::new(GpuTexture::upload(
            device,
            queue,
            "default-white",
            &TexturePixels::solid([255; 4]),
            TextureKind::Color,
        ));
        let flat_normal = Arc::new(GpuTexture::upload(
            device,
            queue,
            "default-normal",
            &TexturePixels::solid([128, 128, 255, 255]),
            TextureKind::Data,
        ));

        Self {
            textures: HashMap::new(),
            asset_dir,
            sampler_linear,
            sampler_nearest,
            white,
            flat_normal,
        }
    }

    /// Texture `name` as `kind`, loading it on first use.
    pub fn get_or_load(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        name: &str,
        kind: TextureKind,
    ) -> Arc<GpuTexture> {
        let key = (name.to_string(), kind);
        if let Some(existing) = self.textures.get(&key) {
            return Arc::clone(existing);
        }
        let pixels = resolve_texture(self.asset_dir.as_deref(), name);
        let texture = Arc::new(GpuTexture::upload(device, queue, name, &pixels, kind));
        log::info!(
            "Created texture '{name}' ({}x{}, {:?})",
            pixels.width,
            pixels.height,
            kind
        );
        self.textures.insert(key, Arc::clone(&texture));
        texture
    }

    /// Like [`get_or_load`](Self::get_or_load), with `default` for an empty slot.
    pub fn slot(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        name: Option<&str>,
        kind: TextureKind,
        default: DefaultTexture,
    ) -> Arc<GpuTexture> {
        match name {
            Some(name) => self.get_or_load(device, queue, name, kind),
            None => match default {
                DefaultTexture::White => Arc::clone(&self.white),
                DefaultTexture::FlatNormal => Arc::clone(&self.flat_normal),
            },
        }
    }

    pub fn sampler(&self, kind: SamplerKind) -> &wgpu::Sampler {
        match kind {
            SamplerKind::Linear => &self.sampler_linear,
            SamplerKind::Nearest => &self.sampler_nearest,
        }
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

/// Stand-in for a material slot with no texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultTexture {
    White,
    /// Tangent-space +Z.
    FlatNormal,
}
