//! wgpu rendering: surface management, the shadow depth pass, the lit forward
//! pass, the sky, frame stage ordering, and the shadow map overlay.

pub mod buffer;
pub mod depth;
pub mod frame;
pub mod gpu;
pub mod lit_pipeline;
pub mod overlay;
pub mod pass;
pub mod shader;
pub mod shadow_pipeline;
pub mod sky;
pub mod texture;
pub mod viewport;

pub use buffer::{DynamicUniformBuffer, MeshBuffer, upload_meshes};
pub use depth::DepthBuffer;
pub use frame::{FrameOrderError, FrameSequencer, FrameStage, ShadowMapBinding};
pub use gpu::{RenderContext, RenderContextError, SurfaceError, init_render_context_blocking};
pub use lit_pipeline::{FrameUniform, GpuMaterial, LitDraw, LitPipeline, ObjectUniform};
pub use overlay::ShadowOverlay;
pub use pass::{FrameEncoder, RenderPassBuilder, begin_depth_only_pass};
pub use shader::{LIT_SHADER, OVERLAY_SHADER, SHADOW_SHADER, SKY_SHADER, ShaderError, ShaderLibrary};
pub use shadow_pipeline::{ShadowDraw, ShadowPipeline};
pub use sky::{SkyFaces, SkyPipeline};
pub use texture::{GpuTexture, TextureError, TextureKind, TextureManager, TexturePixels};
pub use viewport::{Viewport, ViewportScope, ViewportTracker};
