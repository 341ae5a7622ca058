//! Depth-only pipeline that renders shadow casters into the shadow map.
//!
//! Vertices go through `light_view_proj * world`. There is no fragment stage;
//! only biased depth is written. All per-object world matrices share one
//! dynamic-offset uniform buffer.

use std::num::NonZeroU64;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use umbra_lighting::{DepthBias, SHADOW_MAP_FORMAT, ShadowMap, ShadowMapError, create_scoped};

use crate::buffer::{DynamicUniformBuffer, MeshBuffer, position_only_layout};
use crate::pass::begin_depth_only_pass;
use crate::viewport::{Viewport, ViewportTracker};

pub const SHADOW_SHADER_SOURCE: &str = r#"
struct LightMatrix {
    view_proj: mat4x4<f32>,
};

struct Object {
    world: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> light: LightMatrix;

@group(0) @binding(1)
var<uniform> model: Object;

@vertex
fn vs_shadow(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return light.view_proj * model.world * vec4<f32>(position, 1.0);
}
"#;

/// Depth test of the shadow pass: nearer to the light wins.
pub const SHADOW_DEPTH_COMPARE: wgpu::CompareFunction = wgpu::CompareFunction::Less;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ShadowObjectUniform {
    pub world: [[f32; 4]; 4],
}

/// One shadow-casting draw.
pub struct ShadowDraw<'a> {
    pub mesh: &'a MeshBuffer,
    pub world: Mat4,
}

pub struct ShadowPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    shader: Arc<wgpu::ShaderModule>,
    light_buffer: wgpu::Buffer,
    objects: DynamicUniformBuffer<ShadowObjectUniform>,
    bind_group: wgpu::BindGroup,
    bias: DepthBias,
    scratch: Vec<ShadowObjectUniform>,
}

impl ShadowPipeline {
    /// Builds the depth-only pipeline. Failures surface as
    /// [`ShadowMapError::ResourceCreation`] naming the rasterizer state.
    pub fn new(
        device: &wgpu::Device,
        shader: Arc<wgpu::ShaderModule>,
        bias: DepthBias,
    ) -> Result<Self, ShadowMapError> {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(64), // mat4x4<f32>
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(64),
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shadow-pipeline-layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let light_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("shadow-light-matrix"),
            size: 64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let objects = DynamicUniformBuffer::new(device, "shadow-objects", 16);
        let bind_group = create_bind_group(device, &bind_group_layout, &light_buffer, &objects);
        let pipeline = create_scoped(device, "rasterizer state", || {
            create_pipeline(device, &pipeline_layout, &shader, bias)
        })?;

        Ok(Self {
            pipeline,
            bind_group_layout,
            pipeline_layout,
            shader,
            light_buffer,
            objects,
            bind_group,
            bias,
            scratch: Vec::new(),
        })
    }

    pub fn bias(&self) -> DepthBias {
        self.bias
    }

    /// Bias lives in the pipeline's rasterizer state, so changing it rebuilds
    /// the pipeline. On failure the previous pipeline and bias stay active.
    pub fn set_bias(&mut self, device: &wgpu::Device, bias: DepthBias) -> Result<(), ShadowMapError> {
        if bias == self.bias {
            return Ok(());
        }
        log::info!(
            "Shadow depth bias: constant {} slope {} clamp {}",
            bias.constant,
            bias.slope_scale,
            bias.clamp
        );
        self.pipeline = create_scoped(device, "rasterizer state", || {
            create_pipeline(device, &self.pipeline_layout, &self.shader, bias)
        })?;
        self.bias = bias;
        Ok(())
    }

    /// Clears the shadow map and, when a light matrix is given, draws every
    /// caster into it.
    ///
    /// The viewport is set to the shadow map's resolution for the pass and is
    /// back at the main target size when this returns. Returns the number of
    /// draws issued.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        shadow_map: &ShadowMap,
        viewports: &mut ViewportTracker,
        light_view_proj: Option<Mat4>,
        draws: &[ShadowDraw<'_>],
    ) -> usize {
        if let Some(view_proj) = light_view_proj {
            queue.write_buffer(
                &self.light_buffer,
                0,
                bytemuck::bytes_of(&view_proj.to_cols_array_2d()),
            );
            self.scratch.clear();
            self.scratch.extend(draws.iter().map(|d| ShadowObjectUniform {
                world: d.world.to_cols_array_2d(),
            }));
            if self.objects.write(device, queue, &self.scratch) {
                self.bind_group =
                    create_bind_group(device, &self.bind_group_layout, &self.light_buffer, &self.objects);
            }
        }

        let scope = viewports.scoped(Viewport::full(shadow_map.resolution, shadow_map.resolution));
        let mut pass = begin_depth_only_pass(encoder, &shadow_map.depth_view, "shadow-pass");
        scope.viewport().apply(&mut pass);

        if light_view_proj.is_none() {
            return 0;
        }

        pass.set_pipeline(&self.pipeline);
        for (i, draw) in draws.iter().enumerate() {
            pass.set_bind_group(0, &self.bind_group, &[self.objects.offset(i)]);
            draw.mesh.bind(&mut pass);
            draw.mesh.draw(&mut pass);
        }
        draws.len()
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    light_buffer: &wgpu::Buffer,
    objects: &DynamicUniformBuffer<ShadowObjectUniform>,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("shadow-bind-group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: light_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &objects.buffer,
                    offset: 0,
                    size: Some(DynamicUniformBuffer::<ShadowObjectUniform>::binding_size()),
                }),
            },
        ],
    })
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    bias: DepthBias,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("shadow-depth-pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_shadow"),
            buffers: &[position_only_layout()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: shadow_primitive_state(),
        depth_stencil: Some(shadow_depth_state(bias)),
        multisample: wgpu::MultisampleState::default(),
        fragment: None,
        multiview_mask: None,
        cache: None,
    })
}

fn shadow_primitive_state() -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: Some(wgpu::Face::Back),
        unclipped_depth: false,
        polygon_mode: wgpu::PolygonMode::Fill,
        conservative: false,
    }
}

pub fn shadow_depth_state(bias: DepthBias) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: SHADOW_MAP_FORMAT,
        depth_write_enabled: true,
        depth_compare: SHADOW_DEPTH_COMPARE,
        stencil: wgpu::StencilState::default(),
        bias: bias.to_wgpu(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_lighting::{LightProjection, LightSpace, ShadowSettings};

    fn create_test_device() -> Option<(wgpu::Device, wgpu::Queue, wgpu::DownlevelFlags)> {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions::default())
                .await
                .ok()?;
            let downlevel = adapter.get_downlevel_capabilities().flags;
            let (device, queue) = adapter
                .request_device(&wgpu::DeviceDescriptor::default())
                .await
                .ok()?;
            Some((device, queue, downlevel))
        })
    }

    /// Device for tests that read the shadow map back.
    fn create_readback_device() -> Option<(wgpu::Device, wgpu::Queue, wgpu::DownlevelFlags)> {
        create_test_device().filter(|(_, _, downlevel)| {
            downlevel.contains(wgpu::DownlevelFlags::DEPTH_TEXTURE_AND_BUFFER_COPIES)
        })
    }

    fn render_cube(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipeline: &mut ShadowPipeline,
        shadow_map: &ShadowMap,
        cube: &MeshBuffer,
        view_proj: Mat4,
    ) -> usize {
        let mut viewports = ViewportTracker::new(1280, 720);
        let mut encoder = device.create_command_encoder(&Default::default());
        let draws = [ShadowDraw {
            mesh: cube,
            world: Mat4::IDENTITY,
        }];
        let issued = pipeline.render(
            device,
            queue,
            &mut encoder,
            shadow_map,
            &mut viewports,
            Some(view_proj),
            &draws,
        );
        queue.submit([encoder.finish()]);
        assert_eq!(viewports.active().size(), (1280, 720));
        issued
    }

    fn shader(device: &wgpu::Device) -> Arc<wgpu::ShaderModule> {
        Arc::new(device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shadow"),
            source: wgpu::ShaderSource::Wgsl(SHADOW_SHADER_SOURCE.into()),
        }))
    }

    #[test]
    fn test_depth_state_carries_bias() {
        let state = shadow_depth_state(DepthBias::default());
        assert_eq!(state.format, wgpu::TextureFormat::Depth32Float);
        assert_eq!(state.depth_compare, wgpu::CompareFunction::Less);
        assert_eq!(state.bias.constant, 1000);
        assert_eq!(state.bias.slope_scale, 1.0);
        assert_eq!(state.bias.clamp, 0.0);
    }

    #[test]
    fn test_back_faces_culled() {
        let primitive = shadow_primitive_state();
        assert_eq!(primitive.cull_mode, Some(wgpu::Face::Back));
        assert_eq!(primitive.front_face, wgpu::FrontFace::Ccw);
    }

    #[test]
    fn test_object_uniform_size() {
        assert_eq!(std::mem::size_of::<ShadowObjectUniform>(), 64);
    }

    #[test]
    fn test_set_bias_rebuilds_only_on_change() {
        let Some((device, _queue, _)) = create_test_device() else {
            return;
        };
        let mut pipeline =
            ShadowPipeline::new(&device, shader(&device), DepthBias::default()).unwrap();
        pipeline.set_bias(&device, DepthBias::default()).unwrap();
        assert_eq!(pipeline.bias(), DepthBias::default());
        let steeper = DepthBias {
            slope_scale: 2.0,
            ..DepthBias::default()
        };
        pipeline.set_bias(&device, steeper).unwrap();
        assert_eq!(pipeline.bias(), steeper);
    }

    #[test]
    fn test_new_reports_bad_shader_as_creation_error() {
        let Some((device, _queue, _)) = create_test_device() else {
            return;
        };
        // Valid WGSL without the vs_shadow entry point.
        let module = Arc::new(device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("no-entry"),
            source: wgpu::ShaderSource::Wgsl(
                "@vertex fn other() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }"
                    .into(),
            ),
        }));
        let result = ShadowPipeline::new(&device, module, DepthBias::default());
        assert!(matches!(
            result,
            Err(ShadowMapError::ResourceCreation {
                resource: "rasterizer state",
                ..
            })
        ));
    }

    #[test]
    fn test_render_restores_viewport_and_writes_depth() {
        let Some((device, queue, downlevel)) = create_readback_device() else {
            return;
        };
        let settings = ShadowSettings {
            resolution: 256,
            ..ShadowSettings::default()
        };
        let shadow_map = ShadowMap::new(&device, &settings, downlevel).unwrap();
        let mut pipeline = ShadowPipeline::new(&device, shader(&device), settings.bias).unwrap();
        let cube = MeshBuffer::from_mesh(&device, &umbra_scene::primitives::cube());
        let space = LightSpace::new(glam::Vec3::new(0.0, -0.25, 1.0), &LightProjection::default())
            .unwrap();

        let issued = render_cube(
            &device,
            &queue,
            &mut pipeline,
            &shadow_map,
            &cube,
            space.view_projection(),
        );
        assert_eq!(issued, 1);

        let depths = shadow_map.read_depth(&device, &queue).unwrap();
        assert_eq!(depths.len(), 256 * 256);
        assert!(depths.iter().any(|&d| d < 1.0));
        assert!(depths.iter().all(|&d| (0.0..=1.0).contains(&d)));
    }

    #[test]
    fn test_render_without_caster_only_clears() {
        let Some((device, queue, downlevel)) = create_readback_device() else {
            return;
        };
        let settings = ShadowSettings {
            resolution: 64,
            ..ShadowSettings::default()
        };
        let shadow_map = ShadowMap::new(&device, &settings, downlevel).unwrap();
        let mut pipeline = ShadowPipeline::new(&device, shader(&device), settings.bias).unwrap();
        let mut viewports = ViewportTracker::new(800, 600);

        let mut encoder = device.create_command_encoder(&Default::default());
        let issued =
            pipeline.render(&device, &queue, &mut encoder, &shadow_map, &mut viewports, None, &[]);
        queue.submit([encoder.finish()]);
        assert_eq!(issued, 0);
        assert!(viewports.is_main_active());
        let depths = shadow_map.read_depth(&device, &queue).unwrap();
        assert!(depths.iter().all(|&d| d == 1.0));
    }

    #[test]
    fn test_rendering_same_scene_twice_is_bit_identical() {
        let Some((device, queue, downlevel)) = create_readback_device() else {
            return;
        };
        let settings = ShadowSettings {
            resolution: 128,
            ..ShadowSettings::default()
        };
        let shadow_map = ShadowMap::new(&device, &settings, downlevel).unwrap();
        let mut pipeline = ShadowPipeline::new(&device, shader(&device), settings.bias).unwrap();
        let cube = MeshBuffer::from_mesh(&device, &umbra_scene::primitives::cube());
        let space = LightSpace::new(glam::Vec3::new(0.3, -0.5, 0.8), &LightProjection::default())
            .unwrap();

        render_cube(&device, &queue, &mut pipeline, &shadow_map, &cube, space.view_projection());
        let first = shadow_map.read_depth(&device, &queue).unwrap();
        render_cube(&device, &queue, &mut pipeline, &shadow_map, &cube, space.view_projection());
        let second = shadow_map.read_depth(&device, &queue).unwrap();

        assert!(first.iter().any(|&d| d < 1.0));
        let first_bits: Vec<u32> = first.iter().map(|d| d.to_bits()).collect();
        let second_bits: Vec<u32> = second.iter().map(|d| d.to_bits()).collect();
        assert_eq!(first_bits, second_bits);
    }
}
