//! Forward lit pipeline: Cook-Torrance shading for every scene light, with
//! the caster light attenuated by the shadow map.
//!
//! Bind groups:
//! - group 0: frame camera, light array, shadow parameters
//! - group 1: shadow depth texture and comparison sampler
//! - group 2: per-object matrices (dynamic offset)
//! - group 3: material parameters, four textures, and a sampler

use std::num::NonZeroU64;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use umbra_lighting::{LightsUniform, ShadowMap, ShadowUniform};
use umbra_scene::{Camera, Material, Transform};

use crate::buffer::{DynamicUniformBuffer, MeshBuffer, vertex_layout};
use crate::depth::DepthBuffer;
use crate::texture::{DefaultTexture, GpuTexture, TextureKind, TextureManager};

/// Camera matrices for the main pass. 80 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct FrameUniform {
    pub view_proj: [[f32; 4]; 4],
    /// xyz = camera world position.
    pub camera_position: [f32; 4],
}

impl FrameUniform {
    pub fn new(camera: &Camera) -> Self {
        Self {
            view_proj: camera.view_projection_matrix().to_cols_array_2d(),
            camera_position: camera.position().extend(1.0).to_array(),
        }
    }
}

/// World and normal matrices of one draw. 128 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ObjectUniform {
    pub world: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
}

impl ObjectUniform {
    pub fn new(transform: &Transform) -> Self {
        Self::from_matrices(transform.world_matrix(), transform.world_inverse_transpose())
    }

    pub fn from_matrices(world: Mat4, normal_matrix: Mat4) -> Self {
        Self {
            world: world.to_cols_array_2d(),
            normal_matrix: normal_matrix.to_cols_array_2d(),
        }
    }
}

/// Material parameters. 48 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MaterialUniform {
    pub tint: [f32; 4],
    /// x = roughness, y = metalness.
    pub params: [f32; 4],
    /// xy = uv scale, zw = uv offset.
    pub uv_transform: [f32; 4],
}

impl MaterialUniform {
    pub fn new(material: &Material) -> Self {
        Self {
            tint: material.tint.to_array(),
            params: [material.roughness, material.metalness, 0.0, 0.0],
            uv_transform: [
                material.uv_scale.x,
                material.uv_scale.y,
                material.uv_offset.x,
                material.uv_offset.y,
            ],
        }
    }
}

/// A material's uniform buffer and bind group.
pub struct GpuMaterial {
    pub uniform_buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    uniform: MaterialUniform,
    _textures: [Arc<GpuTexture>; 4],
}

impl GpuMaterial {
    /// Re-uploads the parameters if they changed since the last call.
    pub fn update(&mut self, queue: &wgpu::Queue, material: &Material) {
        let uniform = MaterialUniform::new(material);
        if uniform != self.uniform {
            queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniform));
            self.uniform = uniform;
        }
    }
}

/// One main-pass draw.
pub struct LitDraw<'a> {
    pub mesh: &'a MeshBuffer,
    pub material: &'a GpuMaterial,
    pub object: ObjectUniform,
}

pub struct LitPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub frame_bind_group_layout: wgpu::BindGroupLayout,
    pub shadow_bind_group_layout: wgpu::BindGroupLayout,
    pub object_bind_group_layout: wgpu::BindGroupLayout,
    pub material_bind_group_layout: wgpu::BindGroupLayout,
    frame_buffer: wgpu::Buffer,
    lights_buffer: wgpu::Buffer,
    shadow_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    shadow_bind_group: wgpu::BindGroup,
    objects: DynamicUniformBuffer<ObjectUniform>,
    object_bind_group: wgpu::BindGroup,
    scratch: Vec<ObjectUniform>,
}

fn uniform_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    size: u64,
    dynamic: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: NonZeroU64::new(size),
        },
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn uniform_buffer(device: &wgpu::Device, label: &str, size: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl LitPipeline {
    pub fn new(
        device: &wgpu::Device,
        shader: &wgpu::ShaderModule,
        surface_format: wgpu::TextureFormat,
        shadow_map: &ShadowMap,
    ) -> Self {
        let frame_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("lit-frame-bgl"),
                entries: &[
                    uniform_entry(
                        0,
                        wgpu::ShaderStages::VERTEX_FRAGMENT,
                        std::mem::size_of::<FrameUniform>() as u64,
                        false,
                    ),
                    uniform_entry(
                        1,
                        wgpu::ShaderStages::FRAGMENT,
                        std::mem::size_of::<LightsUniform>() as u64,
                        false,
                    ),
                    uniform_entry(
                        2,
                        wgpu::ShaderStages::FRAGMENT,
                        std::mem::size_of::<ShadowUniform>() as u64,
                        false,
                    ),
                ],
            });

        let shadow_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("lit-shadow-bgl"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Depth,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                        count: None,
                    },
                ],
            });

        let object_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("lit-object-bgl"),
                entries: &[uniform_entry(
                    0,
                    wgpu::ShaderStages::VERTEX,
                    std::mem::size_of::<ObjectUniform>() as u64,
                    true,
                )],
            });

        let material_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("lit-material-bgl"),
                entries: &[
                    uniform_entry(
                        0,
                        wgpu::ShaderStages::VERTEX_FRAGMENT,
                        std::mem::size_of::<MaterialUniform>() as u64,
                        false,
                    ),
                    texture_entry(1),
                    texture_entry(2),
                    texture_entry(3),
                    texture_entry(4),
                    wgpu::BindGroupLayoutEntry {
                        binding: 5,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lit-pipeline-layout"),
            bind_group_layouts: &[
                &frame_bind_group_layout,
                &shadow_bind_group_layout,
                &object_bind_group_layout,
                &material_bind_group_layout,
            ],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("lit-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                buffers: &[vertex_layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(DepthBuffer::depth_stencil_state()),
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

        let frame_buffer = uniform_buffer(device, "lit-frame", std::mem::size_of::<FrameUniform>());
        let lights_buffer =
            uniform_buffer(device, "lit-lights", std::mem::size_of::<LightsUniform>());
        let shadow_buffer =
            uniform_buffer(device, "lit-shadow", std::mem::size_of::<ShadowUniform>());

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lit-frame-bind-group"),
            layout: &frame_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lights_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: shadow_buffer.as_entire_binding(),
                },
            ],
        });

        let shadow_bind_group = create_shadow_bind_group(device, &shadow_bind_group_layout, shadow_map);
        let objects = DynamicUniformBuffer::new(device, "lit-objects", 16);
        let object_bind_group = create_object_bind_group(device, &object_bind_group_layout, &objects);

        Self {
            pipeline,
            frame_bind_group_layout,
            shadow_bind_group_layout,
            object_bind_group_layout,
            material_bind_group_layout,
            frame_buffer,
            lights_buffer,
            shadow_buffer,
            frame_bind_group,
            shadow_bind_group,
            objects,
            object_bind_group,
            scratch: Vec::new(),
        }
    }

    /// Rebinds the shadow map after its sampler or texture was replaced.
    pub fn rebind_shadow_map(&mut self, device: &wgpu::Device, shadow_map: &ShadowMap) {
        self.shadow_bind_group =
            create_shadow_bind_group(device, &self.shadow_bind_group_layout, shadow_map);
    }

    pub fn create_material(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        material: &Material,
        textures: &mut TextureManager,
    ) -> GpuMaterial {
        let slots = &material.textures;
        let albedo = textures.slot(
            device,
            queue,
            slots.albedo.as_deref(),
            TextureKind::Color,
            DefaultTexture::White,
        );
        let normal = textures.slot(
            device,
            queue,
            slots.normal.as_deref(),
            TextureKind::Data,
            DefaultTexture::FlatNormal,
        );
        let roughness = textures.slot(
            device,
            queue,
            slots.roughness.as_deref(),
            TextureKind::Data,
            DefaultTexture::White,
        );
        let metalness = textures.slot(
            device,
            queue,
            slots.metalness.as_deref(),
            TextureKind::Data,
            DefaultTexture::White,
        );

        let uniform = MaterialUniform::new(material);
        let uniform_buffer = {
            use wgpu::util::DeviceExt;
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{}-material", material.name)),
                contents: bytemuck::bytes_of(&uniform),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
        };

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{}-material-bind-group", material.name)),
            layout: &self.material_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&albedo.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&roughness.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&metalness.view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(textures.sampler(material.sampler)),
                },
            ],
        });

        GpuMaterial {
            uniform_buffer,
            bind_group,
            uniform,
            _textures: [albedo, normal, roughness, metalness],
        }
    }

    /// Uploads per-frame uniforms and per-draw matrices. Call before the
    /// main pass begins.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        frame: &FrameUniform,
        lights: &LightsUniform,
        shadow: &ShadowUniform,
        draws: &[LitDraw<'_>],
    ) {
        queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(frame));
        queue.write_buffer(&self.lights_buffer, 0, bytemuck::bytes_of(lights));
        queue.write_buffer(&self.shadow_buffer, 0, bytemuck::bytes_of(shadow));

        self.scratch.clear();
        self.scratch.extend(draws.iter().map(|d| d.object));
        if self.objects.write(device, queue, &self.scratch) {
            self.object_bind_group =
                create_object_bind_group(device, &self.object_bind_group_layout, &self.objects);
        }
    }

    /// Records `draws` into an open main pass. `draws` must be the slice
    /// given to [`prepare`](Self::prepare).
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, draws: &[LitDraw<'_>]) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.frame_bind_group, &[]);
        pass.set_bind_group(1, &self.shadow_bind_group, &[]);
        for (i, draw) in draws.iter().enumerate() {
            pass.set_bind_group(2, &self.object_bind_group, &[self.objects.offset(i)]);
            pass.set_bind_group(3, &draw.material.bind_group, &[]);
            draw.mesh.bind(pass);
            draw.mesh.draw(pass);
        }
    }
}

fn create_shadow_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    shadow_map: &ShadowMap,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("lit-shadow-bind-group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&shadow_map.sample_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&shadow_map.sampler),
            },
        ],
    })
}

fn create_object_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    objects: &DynamicUniformBuffer<ObjectUniform>,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("lit-object-bind-group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &objects.buffer,
                offset: 0,
                size: Some(DynamicUniformBuffer::<ObjectUniform>::binding_size()),
            }),
        }],
    })
}

/// Lit shader. Cook-Torrance BRDF (GGX distribution, Schlick Fresnel, Smith
/// geometry) summed over the light array. Only light `counts.y` is multiplied
/// by the shadow factor; ambient and the other lights are unaffected.
pub const LIT_SHADER_SOURCE: &str = r#"
const PI: f32 = 3.14159265359;
const MAX_LIGHTS: u32 = 16u;
const KIND_DIRECTIONAL: u32 = 0u;
const KIND_SPOT: u32 = 2u;

struct Frame {
    view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
};

struct Light {
    direction: vec3<f32>,
    kind: u32,
    position: vec3<f32>,
    range: f32,
    color: vec3<f32>,
    intensity: f32,
    spot_cos_inner: f32,
    spot_cos_outer: f32,
    _padding: vec2<f32>,
};

struct Lights {
    ambient: vec4<f32>,
    // x = light count, y = shadow caster index
    counts: vec4<u32>,
    lights: array<Light, 16>,
};

struct Shadow {
    light_view_proj: mat4x4<f32>,
    // x = enabled, y = texel size
    params: vec4<f32>,
};

struct Object {
    world: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
};

struct Material {
    tint: vec4<f32>,
    // x = roughness, y = metalness
    params: vec4<f32>,
    // xy = scale, zw = offset
    uv_transform: vec4<f32>,
};

@group(0) @binding(0) var<uniform> frame: Frame;
@group(0) @binding(1) var<uniform> lights: Lights;
@group(0) @binding(2) var<uniform> shadow: Shadow;

@group(1) @binding(0) var shadow_map: texture_depth_2d;
@group(1) @binding(1) var shadow_sampler: sampler_comparison;

@group(2) @binding(0) var<uniform> model: Object;

@group(3) @binding(0) var<uniform> material: Material;
@group(3) @binding(1) var albedo_map: texture_2d<f32>;
@group(3) @binding(2) var normal_map: texture_2d<f32>;
@group(3) @binding(3) var roughness_map: texture_2d<f32>;
@group(3) @binding(4) var metal_map: texture_2d<f32>;
@group(3) @binding(5) var material_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) tangent: vec3<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) tangent: vec3<f32>,
    @location(3) uv: vec2<f32>,
};

fn distribution_ggx(n_dot_h: f32, roughness: f32) -> f32 {
    let a = roughness * roughness;
    let a2 = a * a;
    let denom = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    return a2 / (PI * denom * denom);
}

fn geometry_schlick_ggx(n_dot: f32, roughness: f32) -> f32 {
    let r = roughness + 1.0;
    let k = (r * r) / 8.0;
    return n_dot / (n_dot * (1.0 - k) + k);
}

fn geometry_smith(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    return geometry_schlick_ggx(n_dot_v, roughness) * geometry_schlick_ggx(n_dot_l, roughness);
}

fn fresnel_schlick(cos_theta: f32, f0: vec3<f32>) -> vec3<f32> {
    return f0 + (1.0 - f0) * pow(clamp(1.0 - cos_theta, 0.0, 1.0), 5.0);
}

fn evaluate_brdf(
    light_dir: vec3<f32>,
    view_dir: vec3<f32>,
    normal: vec3<f32>,
    albedo: vec3<f32>,
    metallic: f32,
    roughness: f32,
) -> vec3<f32> {
    let half_vec = normalize(view_dir + light_dir);

    let n_dot_l = max(dot(normal, light_dir), 0.0);
    let n_dot_v = max(dot(normal, view_dir), 0.0);
    let n_dot_h = max(dot(normal, half_vec), 0.0);
    let h_dot_v = max(dot(half_vec, view_dir), 0.0);

    let f0 = mix(vec3<f32>(0.04), albedo, metallic);

    let d = distribution_ggx(n_dot_h, roughness);
    let g = geometry_smith(n_dot_v, n_dot_l, roughness);
    let f = fresnel_schlick(h_dot_v, f0);

    let specular = d * g * f / (4.0 * n_dot_v * n_dot_l + 0.0001);
    let k_d = (vec3<f32>(1.0) - f) * (1.0 - metallic);
    let diffuse = k_d * albedo / PI;

    return (diffuse + specular) * n_dot_l;
}

fn range_attenuation(dist: f32, range: f32) -> f32 {
    if range <= 0.0 || dist >= range {
        return 0.0;
    }
    let t = saturate(1.0 - (dist * dist) / (range * range));
    return t * t;
}

// 1.0 = lit. Outside the light volume is always lit.
fn shadow_factor(world_pos: vec3<f32>) -> f32 {
    if shadow.params.x < 0.5 {
        return 1.0;
    }
    let light_pos = shadow.light_view_proj * vec4<f32>(world_pos, 1.0);
    let coord = light_pos.xyz / light_pos.w;
    let uv = vec2<f32>(coord.x * 0.5 + 0.5, -coord.y * 0.5 + 0.5);
    if uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0 || coord.z > 1.0 {
        return 1.0;
    }
    return textureSampleCompareLevel(shadow_map, shadow_sampler, uv, coord.z);
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    let world = model.world * vec4<f32>(in.position, 1.0);
    var out: VertexOutput;
    out.clip_position = frame.view_proj * world;
    out.world_position = world.xyz;
    out.normal = (model.normal_matrix * vec4<f32>(in.normal, 0.0)).xyz;
    out.tangent = (model.world * vec4<f32>(in.tangent, 0.0)).xyz;
    out.uv = in.uv * material.uv_transform.xy + material.uv_transform.zw;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let albedo_sample = textureSample(albedo_map, material_sampler, in.uv);
    let normal_sample = textureSample(normal_map, material_sampler, in.uv).xyz * 2.0 - 1.0;
    let roughness_sample = textureSample(roughness_map, material_sampler, in.uv).r;
    let metal_sample = textureSample(metal_map, material_sampler, in.uv).r;

    let albedo = albedo_sample.rgb * material.tint.rgb;
    let alpha = albedo_sample.a * material.tint.a;
    let roughness = clamp(material.params.x * roughness_sample, 0.04, 1.0);
    let metallic = clamp(material.params.y * metal_sample, 0.0, 1.0);

    let n = normalize(in.normal);
    var normal = n;
    let t_raw = in.tangent - n * dot(n, in.tangent);
    if dot(t_raw, t_raw) > 1e-8 {
        let t = normalize(t_raw);
        let b = cross(n, t);
        normal = normalize(mat3x3<f32>(t, b, n) * normal_sample);
    }

    let view_dir = normalize(frame.camera_position.xyz - in.world_position);
    let lit = shadow_factor(in.world_position);

    var color = lights.ambient.rgb * albedo;
    let count = min(lights.counts.x, MAX_LIGHTS);
    for (var i = 0u; i < count; i++) {
        let light = lights.lights[i];
        var to_light = -light.direction;
        var attenuation = 1.0;
        if light.kind != KIND_DIRECTIONAL {
            let offset = light.position - in.world_position;
            let dist = length(offset);
            to_light = offset / max(dist, 1e-4);
            attenuation = range_attenuation(dist, light.range);
            if light.kind == KIND_SPOT {
                let inner = max(light.spot_cos_inner, light.spot_cos_outer + 1e-4);
                attenuation *= smoothstep(light.spot_cos_outer, inner, dot(-to_light, light.direction));
            }
        }
        var radiance = light.color * light.intensity * attenuation;
        if i == lights.counts.y {
            radiance *= lit;
        }
        color += evaluate_brdf(to_light, view_dir, normal, albedo, metallic, roughness) * radiance;
    }

    return vec4<f32>(color, alpha);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3, Vec4};
    use umbra_lighting::ShadowSettings;

    fn create_test_device() -> Option<(wgpu::Device, wgpu::Queue)> {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions::default())
                .await
                .ok()?;
            adapter
                .request_device(&wgpu::DeviceDescriptor::default())
                .await
                .ok()
        })
    }

    #[test]
    fn test_uniform_sizes_match_wgsl() {
        assert_eq!(std::mem::size_of::<FrameUniform>(), 80);
        assert_eq!(std::mem::size_of::<ObjectUniform>(), 128);
        assert_eq!(std::mem::size_of::<MaterialUniform>(), 48);
        assert_eq!(std::mem::size_of::<LightsUniform>(), 32 + 16 * 64);
        assert_eq!(std::mem::size_of::<ShadowUniform>(), 80);
    }

    #[test]
    fn test_material_uniform_packs_parameters() {
        let material = Material::new("m")
            .with_tint(Vec4::new(0.0, 1.0, 1.0, 1.0))
            .with_roughness(0.25)
            .with_metalness(0.75)
            .with_uv_transform(Vec2::new(4.0, 2.0), Vec2::new(0.5, 0.0));
        let uniform = MaterialUniform::new(&material);
        assert_eq!(uniform.tint, [0.0, 1.0, 1.0, 1.0]);
        assert_eq!(uniform.params[..2], [0.25, 0.75]);
        assert_eq!(uniform.uv_transform, [4.0, 2.0, 0.5, 0.0]);
    }

    #[test]
    fn test_object_uniform_normal_matrix() {
        let transform = Transform::from_position(Vec3::new(1.0, 2.0, 3.0))
            .with_scale(Vec3::new(2.0, 1.0, 1.0));
        let uniform = ObjectUniform::new(&transform);
        assert_eq!(uniform.world[3][..3], [1.0, 2.0, 3.0]);
        assert_eq!(uniform.normal_matrix[0][0], 0.5);
    }

    #[test]
    fn test_only_caster_shadowed_in_shader() {
        assert!(LIT_SHADER_SOURCE.contains("if i == lights.counts.y"));
        assert!(LIT_SHADER_SOURCE.contains("var color = lights.ambient.rgb * albedo"));
    }

    #[test]
    fn test_pipeline_and_material_creation() {
        let Some((device, queue)) = create_test_device() else {
            return;
        };
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lit"),
            source: wgpu::ShaderSource::Wgsl(LIT_SHADER_SOURCE.into()),
        });
        let settings = ShadowSettings {
            resolution: 128,
            ..ShadowSettings::default()
        };
        let shadow_map = ShadowMap::new(&device, &settings, wgpu::DownlevelFlags::empty()).unwrap();
        let mut pipeline = LitPipeline::new(
            &device,
            &shader,
            wgpu::TextureFormat::Bgra8UnormSrgb,
            &shadow_map,
        );
        let mut textures = TextureManager::new(&device, &queue, None);
        let bronze = Material::bronze();
        let mut gpu = pipeline.create_material(&device, &queue, &bronze, &mut textures);
        assert_eq!(textures.len(), 4);

        let mut edited = bronze.clone();
        edited.set_roughness(0.1);
        gpu.update(&queue, &edited);
        assert_eq!(gpu.uniform.params[0], 0.1);

        pipeline.rebind_shadow_map(&device, &shadow_map);
    }
}
