//! Render pass helpers and the per-frame command encoder.
//!
//! [`RenderPassBuilder`] configures the color pass, [`begin_depth_only_pass`]
//! opens the shadow pass, and [`FrameEncoder`] owns the frame's encoder and
//! swapchain image until submission.

/// Value the shadow map is cleared to every frame: the far plane.
pub const SHADOW_CLEAR_DEPTH: f32 = 1.0;

/// Builder for the main color pass.
#[derive(Debug, Clone)]
pub struct RenderPassBuilder {
    clear_color: wgpu::Color,
    depth_clear: Option<f32>,
    load_existing: bool,
    label: Option<&'static str>,
}

impl Default for RenderPassBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPassBuilder {
    pub fn new() -> Self {
        Self {
            clear_color: wgpu::Color::BLACK,
            depth_clear: None,
            load_existing: false,
            label: None,
        }
    }

    /// Clear color from a linear RGB triple.
    pub fn clear_rgb(mut self, rgb: [f32; 3]) -> Self {
        self.clear_color = wgpu::Color {
            r: f64::from(rgb[0]),
            g: f64::from(rgb[1]),
            b: f64::from(rgb[2]),
            a: 1.0,
        };
        self
    }

    /// Clears the depth attachment passed to [`begin`](Self::begin) to `value`.
    pub fn depth_clear(mut self, value: f32) -> Self {
        self.depth_clear = Some(value);
        self
    }

    /// Keeps the attachments' contents instead of clearing them, for passes
    /// that follow a separate clear.
    pub fn load_existing(mut self) -> Self {
        self.load_existing = true;
        self
    }

    pub fn label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn begin<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        color_view: &'e wgpu::TextureView,
        depth_view: Option<&'e wgpu::TextureView>,
    ) -> wgpu::RenderPass<'e> {
        let (color_load, depth_load) = if self.load_existing {
            (wgpu::LoadOp::Load, wgpu::LoadOp::Load)
        } else {
            (
                wgpu::LoadOp::Clear(self.clear_color),
                wgpu::LoadOp::Clear(self.depth_clear.unwrap_or(0.0)),
            )
        };
        let depth_stencil_attachment =
            depth_view.map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            });

        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: self.label,
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        })
    }
}

/// Opens a pass with no color attachments that clears `depth_view` to
/// [`SHADOW_CLEAR_DEPTH`] and stores the result.
pub fn begin_depth_only_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    depth_view: &'e wgpu::TextureView,
    label: &'static str,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[],
        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
            view: depth_view,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(SHADOW_CLEAR_DEPTH),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }),
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    })
}

/// Owns one frame's command encoder and swapchain image.
///
/// Dropping an unsubmitted encoder submits and presents, so a frame that
/// bails out halfway still reaches the screen.
pub struct FrameEncoder {
    encoder: Option<wgpu::CommandEncoder>,
    queue: wgpu::Queue,
    surface_texture: Option<wgpu::SurfaceTexture>,
    surface_view: wgpu::TextureView,
}

impl FrameEncoder {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_texture: wgpu::SurfaceTexture,
    ) -> Self {
        let encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame-encoder"),
        });
        let surface_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            encoder: Some(encoder),
            queue: queue.clone(),
            surface_texture: Some(surface_texture),
            surface_view,
        }
    }

    /// The encoder and the swapchain view, or `None` after submission.
    pub fn parts(&mut self) -> Option<(&mut wgpu::CommandEncoder, &wgpu::TextureView)> {
        let encoder = self.encoder.as_mut()?;
        Some((encoder, &self.surface_view))
    }

    /// Submits the recorded commands and presents. Consumes self.
    pub fn submit(mut self) {
        self.finish();
    }

    fn finish(&mut self) -> bool {
        let (Some(encoder), Some(surface_texture)) =
            (self.encoder.take(), self.surface_texture.take())
        else {
            return false;
        };
        self.queue.submit([encoder.finish()]);
        surface_texture.present();
        true
    }
}

impl Drop for FrameEncoder {
    fn drop(&mut self) {
        if self.encoder.is_some() && self.finish() {
            log::warn!("FrameEncoder dropped without submit(), auto-submitted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_rgb() {
        let builder = RenderPassBuilder::new().clear_rgb([0.4, 0.6, 0.75]);
        assert!((builder.clear_color.r - 0.4).abs() < 1e-6);
        assert!((builder.clear_color.b - 0.75).abs() < 1e-6);
        assert_eq!(builder.clear_color.a, 1.0);
    }

    #[test]
    fn test_depth_clear_and_label() {
        let builder = RenderPassBuilder::new();
        assert!(builder.depth_clear.is_none());
        let builder = builder.depth_clear(0.0).label("main-pass");
        assert_eq!(builder.depth_clear, Some(0.0));
        assert_eq!(builder.label, Some("main-pass"));
    }

    #[test]
    fn test_load_existing() {
        assert!(!RenderPassBuilder::new().load_existing);
        assert!(RenderPassBuilder::new().load_existing().load_existing);
    }

    #[test]
    fn test_shadow_clear_is_far_plane() {
        assert_eq!(SHADOW_CLEAR_DEPTH, 1.0);
    }
}
