//! Shadow map GPU resource and depth bias settings.
//!
//! One square depth texture with two views over the same storage: a
//! depth-target view written by the shadow pass and a sampled view read by the
//! main pass through a `Less` comparison sampler.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use umbra_config::{ShadowConfig, ShadowFilter};

use crate::light_space::LightProjection;

/// Depth format of the shadow map.
pub const SHADOW_MAP_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Raised when the shadow map cannot be created. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ShadowMapError {
    #[error("failed to create shadow {resource}: {reason}")]
    ResourceCreation {
        resource: &'static str,
        reason: String,
    },
}

/// Rasterizer depth bias applied while writing the shadow map.
///
/// The stored depth of a triangle is offset by
/// `constant * r + slope_scale * max(|dz/dx|, |dz/dy|)`, where `r` is the
/// smallest representable depth step near the triangle's maximum depth and
/// the slopes are per window pixel. A positive `clamp` caps the result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthBias {
    pub constant: i32,
    pub slope_scale: f32,
    pub clamp: f32,
}

impl Default for DepthBias {
    fn default() -> Self {
        Self {
            constant: 1000,
            slope_scale: 1.0,
            clamp: 0.0,
        }
    }
}

impl DepthBias {
    pub const NONE: Self = Self {
        constant: 0,
        slope_scale: 0.0,
        clamp: 0.0,
    };

    /// Bias for a triangle with the given max depth and max window-space slope.
    pub fn offset(&self, max_depth: f32, max_slope: f32) -> f32 {
        let bias =
            self.constant as f32 * min_resolvable_depth(max_depth) + self.slope_scale * max_slope;
        if self.clamp > 0.0 {
            bias.min(self.clamp)
        } else if self.clamp < 0.0 {
            bias.max(self.clamp)
        } else {
            bias
        }
    }

    pub fn to_wgpu(self) -> wgpu::DepthBiasState {
        wgpu::DepthBiasState {
            constant: self.constant,
            slope_scale: self.slope_scale,
            clamp: self.clamp,
        }
    }
}

/// Smallest positive `f32`, `2^-149`.
const MIN_SUBNORMAL: f32 = f32::from_bits(1);

/// `2^(exponent(max_depth) - 23)`: one unit of constant bias for a float depth target.
///
/// Never zero: depths whose step would fall below the smallest subnormal
/// resolve to `2^-149`.
pub fn min_resolvable_depth(max_depth: f32) -> f32 {
    let z = max_depth.abs();
    if z < f32::MIN_POSITIVE || !z.is_finite() {
        return MIN_SUBNORMAL;
    }
    let exponent = ((z.to_bits() >> 23) & 0xff) as i32 - 127;
    let step = exponent - 23;
    if step < -126 {
        // Below the normal range: build the subnormal bit pattern directly.
        return f32::from_bits(1 << (step + 149).max(0));
    }
    2f32.powi(step)
}

/// Runs `create` inside out-of-memory and validation error scopes.
///
/// wgpu reports creation failures asynchronously through the device. The
/// scopes turn them into a [`ShadowMapError::ResourceCreation`] naming
/// `resource` instead of an uncaptured-error panic.
pub fn create_scoped<T>(
    device: &wgpu::Device,
    resource: &'static str,
    create: impl FnOnce() -> T,
) -> Result<T, ShadowMapError> {
    let validation = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let out_of_memory = device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let value = create();
    // Scopes form a stack: the inner one pops first.
    let oom_error = pollster::block_on(out_of_memory.pop());
    let validation_error = pollster::block_on(validation.pop());
    match oom_error.or(validation_error) {
        Some(err) => Err(ShadowMapError::ResourceCreation {
            resource,
            reason: err.to_string(),
        }),
        None => Ok(value),
    }
}

/// Everything the shadow pass needs to know, resolved from config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSettings {
    pub enabled: bool,
    pub resolution: u32,
    pub bias: DepthBias,
    pub filter: ShadowFilter,
    pub projection: LightProjection,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self::from_config(&ShadowConfig::default())
    }
}

impl ShadowSettings {
    pub fn from_config(config: &ShadowConfig) -> Self {
        Self {
            enabled: config.enabled,
            resolution: config.resolution,
            bias: DepthBias {
                constant: config.depth_bias,
                slope_scale: config.slope_bias,
                clamp: config.bias_clamp,
            },
            filter: config.filter,
            projection: LightProjection::from_config(config),
        }
    }

    /// Checks the settings against device limits before any GPU call.
    pub fn validate(&self, max_texture_dimension: u32) -> Result<(), ShadowMapError> {
        if self.resolution == 0 {
            return Err(ShadowMapError::ResourceCreation {
                resource: "texture",
                reason: "resolution must be non-zero".to_string(),
            });
        }
        if self.resolution > max_texture_dimension {
            return Err(ShadowMapError::ResourceCreation {
                resource: "texture",
                reason: format!(
                    "resolution {} exceeds device limit {max_texture_dimension}",
                    self.resolution
                ),
            });
        }
        if !self.bias.slope_scale.is_finite() || !self.bias.clamp.is_finite() {
            return Err(ShadowMapError::ResourceCreation {
                resource: "rasterizer state",
                reason: "depth bias values must be finite".to_string(),
            });
        }
        let p = &self.projection;
        let extents_ok = p.width > 0.0 && p.height > 0.0 && p.far > p.near && p.near >= 0.0;
        if !extents_ok || !p.backoff.is_finite() {
            return Err(ShadowMapError::ResourceCreation {
                resource: "light projection",
                reason: format!(
                    "invalid volume {}x{} near {} far {}",
                    p.width, p.height, p.near, p.far
                ),
            });
        }
        Ok(())
    }
}

/// Main-pass shadow parameters. 80 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ShadowUniform {
    pub light_view_proj: [[f32; 4]; 4],
    /// x = enabled (0/1), y = texel size, zw unused.
    pub params: [f32; 4],
}

impl ShadowUniform {
    pub fn new(light_view_proj: Mat4, resolution: u32) -> Self {
        Self {
            light_view_proj: light_view_proj.to_cols_array_2d(),
            params: [1.0, 1.0 / resolution.max(1) as f32, 0.0, 0.0],
        }
    }

    /// Every fragment reads as fully lit.
    pub fn disabled() -> Self {
        Self {
            light_view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            params: [0.0; 4],
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.params[0] > 0.5
    }
}

/// The shadow map texture, its two views, and the comparison sampler.
pub struct ShadowMap {
    pub texture: wgpu::Texture,
    /// Depth attachment view for the shadow pass.
    pub depth_view: wgpu::TextureView,
    /// Depth-aspect view for sampling in the main pass.
    pub sample_view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub resolution: u32,
    /// Whether the sampler uses a white border instead of edge clamping.
    pub border_supported: bool,
    /// Whether the adapter can copy depth textures into buffers.
    pub readback_supported: bool,
}

impl ShadowMap {
    /// Creates the texture, views and sampler. `downlevel` comes from
    /// [`wgpu::Adapter::get_downlevel_capabilities`] and decides whether
    /// [`ShadowMap::read_depth`] is available.
    pub fn new(
        device: &wgpu::Device,
        settings: &ShadowSettings,
        downlevel: wgpu::DownlevelFlags,
    ) -> Result<Self, ShadowMapError> {
        settings.validate(device.limits().max_texture_dimension_2d)?;

        let resolution = settings.resolution;
        let readback_supported =
            downlevel.contains(wgpu::DownlevelFlags::DEPTH_TEXTURE_AND_BUFFER_COPIES);
        let mut usage =
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        if readback_supported {
            usage |= wgpu::TextureUsages::COPY_SRC;
        }
        let texture = create_scoped(device, "texture", || {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("shadow-map"),
                size: wgpu::Extent3d {
                    width: resolution,
                    height: resolution,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: SHADOW_MAP_FORMAT,
                usage,
                view_formats: &[],
            })
        })?;

        let (depth_view, sample_view) = create_scoped(device, "texture view", || {
            let depth_view = texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("shadow-map-depth-target"),
                ..Default::default()
            });
            let sample_view = texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("shadow-map-sampled"),
                aspect: wgpu::TextureAspect::DepthOnly,
                ..Default::default()
            });
            (depth_view, sample_view)
        })?;

        let border_supported = device
            .features()
            .contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER);
        let sampler = create_scoped(device, "sampler", || {
            create_comparison_sampler(device, settings.filter, border_supported)
        })?;

        log::info!(
            "Shadow map {resolution}x{resolution} ({:?} filter, border {})",
            settings.filter,
            if border_supported { "white" } else { "clamped" }
        );

        Ok(Self {
            texture,
            depth_view,
            sample_view,
            sampler,
            resolution,
            border_supported,
            readback_supported,
        })
    }

    /// Rebuilds the sampler, e.g. after the filter was changed from the inspector.
    pub fn set_filter(&mut self, device: &wgpu::Device, filter: ShadowFilter) {
        self.sampler = create_comparison_sampler(device, filter, self.border_supported);
    }

    /// Copies the shadow map back to the CPU. Blocks until the GPU is idle.
    ///
    /// Returns `None` when the adapter cannot copy depth textures or the copy
    /// fails validation.
    pub fn read_depth(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Option<Vec<f32>> {
        if !self.readback_supported {
            log::warn!("Shadow map readback unsupported on this adapter");
            return None;
        }
        let res = self.resolution;
        let unpadded = res * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("shadow-map-readback"),
            size: u64::from(padded) * u64::from(res),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let validation = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("shadow-map-readback"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::DepthOnly,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(res),
                },
            },
            wgpu::Extent3d {
                width: res,
                height: res,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));
        if let Some(err) = pollster::block_on(validation.pop()) {
            log::warn!("Shadow map readback rejected: {err}");
            return None;
        }

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        });
        if !matches!(rx.recv(), Ok(Ok(()))) {
            log::warn!("Shadow map readback failed");
            return None;
        }

        let mapped = slice.get_mapped_range();
        let mut depths = Vec::with_capacity((res * res) as usize);
        for row in 0..res {
            let start = (row * padded) as usize;
            let end = start + unpadded as usize;
            depths.extend(
                mapped[start..end]
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            );
        }
        drop(mapped);
        buffer.unmap();
        Some(depths)
    }
}

fn create_comparison_sampler(
    device: &wgpu::Device,
    filter: ShadowFilter,
    border_supported: bool,
) -> wgpu::Sampler {
    let filter_mode = match filter {
        ShadowFilter::Nearest => wgpu::FilterMode::Nearest,
        ShadowFilter::Linear => wgpu::FilterMode::Linear,
    };
    let (address_mode, border_color) = if border_supported {
        (
            wgpu::AddressMode::ClampToBorder,
            Some(wgpu::SamplerBorderColor::OpaqueWhite),
        )
    } else {
        (wgpu::AddressMode::ClampToEdge, None)
    };

    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("shadow-comparison-sampler"),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter_mode,
        min_filter: filter_mode,
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        compare: Some(wgpu::CompareFunction::Less),
        border_color,
        ..Default::default()
    })
}
