//! Shadow map preview drawn into a corner of the main pass (toggled with F1).
//!
//! Texels are fetched with `textureLoad` from the sampled view, so no sampler
//! is involved and the depth-target view is never touched.

use umbra_lighting::ShadowMap;

use crate::depth::DepthBuffer;
use crate::viewport::{Viewport, ViewportTracker};

/// Gap between the preview and the window edge, in pixels.
pub const OVERLAY_MARGIN: u32 = 16;

pub const OVERLAY_SHADER_SOURCE: &str = r#"
@group(0) @binding(0) var shadow_map: texture_depth_2d;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) idx: u32) -> VertexOutput {
    // Full-viewport triangle
    let uv = vec2<f32>(f32((idx << 1u) & 2u), f32(idx & 2u));
    var out: VertexOutput;
    out.position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(uv.x, 1.0 - uv.y);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let dims = textureDimensions(shadow_map);
    let texel = min(vec2<u32>(in.uv * vec2<f32>(dims)), dims - vec2<u32>(1u));
    let depth = textureLoad(shadow_map, texel, 0);
    return vec4<f32>(vec3<f32>(depth), 1.0);
}
"#;

/// Top-right square of edge `size`, shrunk to fit the target.
pub fn overlay_viewport(target_width: u32, target_height: u32, size: u32) -> Option<Viewport> {
    let room = target_width
        .min(target_height)
        .saturating_sub(2 * OVERLAY_MARGIN);
    let size = size.min(room);
    if size == 0 {
        return None;
    }
    Some(Viewport {
        x: (target_width - size - OVERLAY_MARGIN) as f32,
        y: OVERLAY_MARGIN as f32,
        ..Viewport::full(size, size)
    })
}

pub struct ShadowOverlay {
    pub pipeline: wgpu::RenderPipeline,
    pub bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    visible: bool,
    size: u32,
}

impl ShadowOverlay {
    pub fn new(
        device: &wgpu::Device,
        shader: &wgpu::ShaderModule,
        surface_format: wgpu::TextureFormat,
        shadow_map: &ShadowMap,
        size: u32,
        visible: bool,
    ) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("overlay-bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Depth,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("overlay-pipeline-layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("overlay-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            // Shares the main pass's depth attachment but ignores it.
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DepthBuffer::FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
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

        let bind_group = create_bind_group(device, &bind_group_layout, shadow_map);

        Self {
            pipeline,
            bind_group_layout,
            bind_group,
            visible,
            size,
        }
    }

    pub fn rebind(&mut self, device: &wgpu::Device, shadow_map: &ShadowMap) {
        self.bind_group = create_bind_group(device, &self.bind_group_layout, shadow_map);
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn toggle(&mut self) -> bool {
        self.visible = !self.visible;
        log::info!("Shadow map overlay {}", if self.visible { "on" } else { "off" });
        self.visible
    }

    /// Draws the preview if visible, leaving the main viewport applied.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, viewports: &mut ViewportTracker) -> bool {
        if !self.visible {
            return false;
        }
        let (width, height) = viewports.main().size();
        let Some(corner) = overlay_viewport(width, height, self.size) else {
            return false;
        };
        {
            let scope = viewports.scoped(corner);
            scope.viewport().apply(pass);
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        viewports.active().apply(pass);
        true
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    shadow_map: &ShadowMap,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("overlay-bind-group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::TextureView(&shadow_map.sample_view),
        }],
    })
}
