//! Cube-mapped sky drawn behind everything else in the main pass.
//!
//! A unit cube is rendered around the camera with the translation stripped
//! from the view matrix. Its depth is pinned to the reverse-Z far plane, so
//! with a `GreaterEqual` test it only lands on pixels no geometry covered.
//!
//! Faces come from `<asset_dir>/textures/sky/{right,left,up,down,front,back}`.
//! Without a complete, square, equally sized set a gradient sky is generated.

use std::path::Path;

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};
use umbra_scene::Camera;
use wgpu::util::DeviceExt;

use crate::buffer::{MeshBuffer, position_only_layout};
use crate::depth::DepthBuffer;
use crate::texture::{TextureError, TexturePixels, load_texture_file};

/// Face file names in cube layer order: +X, -X, +Y, -Y, +Z, -Z.
pub const SKY_FACES: [&str; 6] = ["right", "left", "up", "down", "front", "back"];

/// Edge length of the generated faces.
pub const PROCEDURAL_SKY_SIZE: u32 = 128;

pub const SKY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

// sRGB-encoded gradient stops.
const ZENITH: [f32; 3] = [62.0, 118.0, 196.0];
const HORIZON: [f32; 3] = [186.0, 214.0, 235.0];
const GROUND: [f32; 3] = [92.0, 88.0, 80.0];

pub const SKY_SHADER_SOURCE: &str = r#"
struct Sky {
    view_proj: mat4x4<f32>,
};

@group(0) @binding(0) var<uniform> sky: Sky;
@group(0) @binding(1) var sky_texture: texture_cube<f32>;
@group(0) @binding(2) var sky_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) direction: vec3<f32>,
};

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> VertexOutput {
    let clip = sky.view_proj * vec4<f32>(position, 1.0);
    var out: VertexOutput;
    // Reverse-Z far plane.
    out.position = vec4<f32>(clip.xy, 0.0, clip.w);
    out.direction = position;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    // Cube maps are left-handed: world -Z (forward) reads the front face.
    let dir = in.direction * vec3<f32>(1.0, 1.0, -1.0);
    return vec4<f32>(textureSample(sky_texture, sky_sampler, dir).rgb, 1.0);
}
"#;

/// Depth test of the sky: passes only where the cleared far value survived.
pub const SKY_DEPTH_COMPARE: wgpu::CompareFunction = wgpu::CompareFunction::GreaterEqual;

/// Camera rotation and projection. 64 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct SkyUniform {
    pub view_proj: [[f32; 4]; 4],
}

impl SkyUniform {
    pub fn new(camera: &Camera) -> Self {
        let rotation = Mat4::from_mat3(Mat3::from_mat4(camera.view_matrix()));
        Self {
            view_proj: (camera.projection_matrix() * rotation).to_cols_array_2d(),
        }
    }
}

/// Six square faces of equal size, in [`SKY_FACES`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyFaces {
    pub size: u32,
    pub faces: [TexturePixels; 6],
}

impl SkyFaces {
    /// Horizon-to-zenith gradient above a flat ground color.
    pub fn procedural(size: u32) -> Self {
        let size = size.max(1);
        let faces = std::array::from_fn(|layer| {
            let mut rgba = Vec::with_capacity((size * size * 4) as usize);
            for y in 0..size {
                for x in 0..size {
                    let s = (x as f32 + 0.5) / size as f32 * 2.0 - 1.0;
                    let t = (y as f32 + 0.5) / size as f32 * 2.0 - 1.0;
                    rgba.extend_from_slice(&sky_color(face_direction(layer, s, t).y));
                }
            }
            TexturePixels {
                width: size,
                height: size,
                rgba,
            }
        });
        Self { size, faces }
    }

    /// Loads all six faces from `<asset_dir>/textures/sky/`. `Ok(None)` if any
    /// face file is missing.
    pub fn load(asset_dir: &Path) -> Result<Option<Self>, TextureError> {
        let mut faces: [TexturePixels; 6] = std::array::from_fn(|_| TexturePixels::solid([0; 4]));
        for (slot, face) in faces.iter_mut().zip(SKY_FACES) {
            match load_texture_file(asset_dir, &format!("sky/{face}"))? {
                Some(pixels) => *slot = pixels,
                None => return Ok(None),
            }
        }
        let size = faces[0].width;
        for (face, pixels) in SKY_FACES.into_iter().zip(&faces) {
            if pixels.width != size || pixels.height != size {
                return Err(TextureError::CubeFace {
                    face,
                    width: pixels.width,
                    height: pixels.height,
                    expected: size,
                });
            }
        }
        Ok(Some(Self { size, faces }))
    }

    /// Files when a complete set exists, otherwise the generated gradient.
    pub fn resolve(asset_dir: Option<&Path>) -> Self {
        if let Some(dir) = asset_dir {
            match Self::load(dir) {
                Ok(Some(faces)) => {
                    log::info!("Loaded sky faces ({0}x{0})", faces.size);
                    return faces;
                }
                Ok(None) => log::debug!("No sky faces under {}", dir.display()),
                Err(e) => log::warn!("{e}, using generated sky"),
            }
        }
        Self::procedural(PROCEDURAL_SKY_SIZE)
    }
}

/// Direction through texel `(s, t)` of cube `layer`, both in `[-1, 1]` with
/// `t` pointing down the image.
pub fn face_direction(layer: usize, s: f32, t: f32) -> Vec3 {
    let dir = match layer {
        0 => Vec3::new(1.0, -t, -s),
        1 => Vec3::new(-1.0, -t, s),
        2 => Vec3::new(s, 1.0, t),
        3 => Vec3::new(s, -1.0, -t),
        4 => Vec3::new(s, -t, 1.0),
        _ => Vec3::new(-s, -t, -1.0),
    };
    dir.normalize()
}

fn sky_color(elevation: f32) -> [u8; 4] {
    let (from, to, amount) = if elevation >= 0.0 {
        (HORIZON, ZENITH, elevation.sqrt())
    } else {
        (HORIZON, GROUND, (-elevation * 4.0).min(1.0))
    };
    let channel = |i: usize| (from[i] + (to[i] - from[i]) * amount).round() as u8;
    [channel(0), channel(1), channel(2), 255]
}

pub fn sky_depth_state() -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: DepthBuffer::FORMAT,
        depth_write_enabled: false,
        depth_compare: SKY_DEPTH_COMPARE,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

fn upload_cube(device: &wgpu::Device, queue: &wgpu::Queue, faces: &SkyFaces) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width: faces.size,
        height: faces.size,
        depth_or_array_layers: 6,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("sky-cube"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: SKY_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    for (layer, pixels) in faces.faces.iter().enumerate() {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer as u32,
                },
                aspect: wgpu::TextureAspect::All,
            },
            &pixels.rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(faces.size * 4),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                depth_or_array_layers: 1,
                ..size
            },
        );
    }
    texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some("sky-cube-view"),
        dimension: Some(wgpu::TextureViewDimension::Cube),
        ..Default::default()
    })
}

pub struct SkyPipeline {
    pub pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    cube: MeshBuffer,
    face_size: u32,
    visible: bool,
}

impl SkyPipeline {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        shader: &wgpu::ShaderModule,
        surface_format: wgpu::TextureFormat,
        faces: &SkyFaces,
        visible: bool,
    ) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sky-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<SkyUniform>() as u64,
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sky-pipeline-layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sky-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                buffers: &[position_only_layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            // The camera sits inside the cube.
            primitive: wgpu::PrimitiveState {
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Front),
                ..Default::default()
            },
            depth_stencil: Some(sky_depth_state()),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview_mask: None,
            cache: None,
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sky-uniform"),
            contents: bytemuck::bytes_of(&SkyUniform {
                view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let view = upload_cube(device, queue, faces);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sky-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sky-bind-group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });
        log::info!("Sky cube {0}x{0}", faces.size);

        Self {
            pipeline,
            uniform_buffer,
            bind_group,
            cube: MeshBuffer::from_mesh(device, &umbra_scene::primitives::cube()),
            face_size: faces.size,
            visible,
        }
    }

    pub fn face_size(&self) -> u32 {
        self.face_size
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn prepare(&self, queue: &wgpu::Queue, camera: &Camera) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&SkyUniform::new(camera)));
    }

    /// Must run after opaque geometry so the depth test can reject covered pixels.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        if !self.visible {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        self.cube.bind(pass);
        self.cube.draw(pass);
    }
}
