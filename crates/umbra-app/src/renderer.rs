//! Per-frame orchestration of the shadow and main passes.
//!
//! [`SceneRenderer::render`] walks the frame stages in order:
//!
//! 1. `ClearBuffers`: clear the swapchain image and the main depth buffer
//! 2. `ShadowPass`: clear the shadow map and draw every caster into it at
//!    shadow resolution
//! 3. `RestoreViewport`: the main viewport is active again
//! 4. `MainPass`: lit geometry sampling the shadow map, the sky behind it,
//!    then the overlay
//! 5. `Present`: submit and present
//!
//! Every transition goes through a [`FrameSequencer`], so the shadow map is
//! never a depth target and a sampled texture at the same time.

use tracing::{debug, warn};
use umbra_config::{Config, ShadowFilter};
use umbra_lighting::{
    CasterWatch, DepthBias, LightsUniform, ShadowCaster, ShadowMap, ShadowMapError,
    ShadowSettings, ShadowUniform,
};
use umbra_render::{
    DepthBuffer, FrameEncoder, FrameOrderError, FrameSequencer, FrameStage, FrameUniform,
    GpuMaterial, LIT_SHADER, LitDraw, LitPipeline, MeshBuffer, OVERLAY_SHADER, ObjectUniform,
    RenderContext, RenderPassBuilder, SHADOW_SHADER, SKY_SHADER, ShaderError, ShaderLibrary,
    ShadowDraw, ShadowOverlay, ShadowPipeline, SkyFaces, SkyPipeline, SurfaceError,
    TextureManager, ViewportTracker, upload_meshes,
};
use umbra_scene::SceneContext;

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("shader setup failed: {0}")]
    Shader(#[from] ShaderError),

    #[error("shadow map setup failed: {0}")]
    ShadowMap(#[from] ShadowMapError),
}

/// Render settings that may change while running.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderControls {
    pub enabled: bool,
    pub filter: ShadowFilter,
    pub bias: DepthBias,
    pub overlay: bool,
    /// Linear RGB the color target is cleared to.
    pub clear_color: [f32; 3],
    pub sky: bool,
}

impl RenderControls {
    pub fn from_config(config: &Config) -> Self {
        let settings = ShadowSettings::from_config(&config.shadow);
        Self {
            enabled: settings.enabled,
            filter: settings.filter,
            bias: settings.bias,
            overlay: config.render.show_shadow_overlay,
            clear_color: config.render.clear_color,
            sky: config.render.sky,
        }
    }
}

/// Counts from one rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReport {
    pub caster: Option<ShadowCaster>,
    pub shadow_draws: usize,
    pub main_draws: usize,
}

pub struct SceneRenderer {
    settings: ShadowSettings,
    controls: RenderControls,
    depth: DepthBuffer,
    shadow_map: ShadowMap,
    shadow_pipeline: ShadowPipeline,
    lit_pipeline: LitPipeline,
    overlay: ShadowOverlay,
    sky: SkyPipeline,
    meshes: Vec<MeshBuffer>,
    materials: Vec<GpuMaterial>,
    // Keeps texture uploads shared between materials alive.
    _textures: TextureManager,
    sequencer: FrameSequencer,
    viewports: ViewportTracker,
    caster_watch: CasterWatch,
}

impl SceneRenderer {
    /// Creates every GPU resource the scene needs. Any failure here is fatal:
    /// without the shadow map there is nothing to render.
    pub fn new(gpu: &RenderContext, scene: &SceneContext, config: &Config) -> Result<Self, RendererError> {
        let device = &gpu.device;
        let settings = ShadowSettings::from_config(&config.shadow);
        let controls = RenderControls::from_config(config);

        let mut shaders = ShaderLibrary::new();
        if let Some(dir) = &config.scene.asset_dir {
            shaders = shaders.with_shader_dir(dir.join("shaders"));
        }
        let shaders = shaders.with_builtins(device)?;

        let downlevel = gpu.adapter.get_downlevel_capabilities().flags;
        let shadow_map = ShadowMap::new(device, &settings, downlevel)?;
        let shadow_pipeline =
            ShadowPipeline::new(device, shaders.get(SHADOW_SHADER)?, settings.bias)?;
        let lit_pipeline = LitPipeline::new(
            device,
            &*shaders.get(LIT_SHADER)?,
            gpu.surface_format,
            &shadow_map,
        );
        let overlay = ShadowOverlay::new(
            device,
            &*shaders.get(OVERLAY_SHADER)?,
            gpu.surface_format,
            &shadow_map,
            config.render.overlay_size,
            controls.overlay,
        );
        let sky = SkyPipeline::new(
            device,
            &gpu.queue,
            &*shaders.get(SKY_SHADER)?,
            gpu.surface_format,
            &SkyFaces::resolve(config.scene.asset_dir.as_deref()),
            controls.sky,
        );

        let meshes = upload_meshes(device, scene.meshes());
        let mut textures = TextureManager::new(device, &gpu.queue, config.scene.asset_dir.clone());
        let materials = scene
            .materials()
            .iter()
            .map(|m| lit_pipeline.create_material(device, &gpu.queue, m, &mut textures))
            .collect();
        debug!(
            meshes = scene.meshes().len(),
            materials = scene.materials().len(),
            textures = textures.len(),
            "Scene uploaded"
        );

        let (width, height) = gpu.size();
        Ok(Self {
            settings,
            controls,
            depth: DepthBuffer::new(device, width, height),
            shadow_map,
            shadow_pipeline,
            lit_pipeline,
            overlay,
            sky,
            meshes,
            materials,
            _textures: textures,
            sequencer: FrameSequencer::new(),
            viewports: ViewportTracker::new(width, height),
            caster_watch: CasterWatch::default(),
        })
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.depth.resize(device, width, height);
        self.viewports.resize(width, height);
    }

    pub fn settings(&self) -> &ShadowSettings {
        &self.settings
    }

    pub fn controls(&self) -> RenderControls {
        self.controls
    }

    pub fn shadow_map(&self) -> &ShadowMap {
        &self.shadow_map
    }

    pub fn toggle_overlay(&mut self) -> bool {
        self.controls.overlay = self.overlay.toggle();
        self.controls.overlay
    }

    /// Applies changed controls: a new bias rebuilds the depth pipeline, a
    /// new filter rebuilds the comparison sampler. A bias the device rejects
    /// is logged and the previous one stays active.
    pub fn apply_controls(&mut self, device: &wgpu::Device, mut controls: RenderControls) {
        if controls == self.controls {
            return;
        }
        if controls.bias != self.controls.bias {
            if let Err(e) = self.shadow_pipeline.set_bias(device, controls.bias) {
                warn!("{e}");
                controls.bias = self.shadow_pipeline.bias();
            }
        }
        if controls.filter != self.controls.filter {
            self.shadow_map.set_filter(device, controls.filter);
            self.lit_pipeline.rebind_shadow_map(device, &self.shadow_map);
        }
        if controls.enabled != self.controls.enabled {
            tracing::info!("Shadows {}", if controls.enabled { "enabled" } else { "disabled" });
        }
        self.overlay.set_visible(controls.overlay);
        self.sky.set_visible(controls.sky);
        self.controls = controls;
        self.settings.bias = controls.bias;
        self.settings.filter = controls.filter;
        self.settings.enabled = controls.enabled;
    }

    /// The caster for this frame, or `None` when shadows are off or no
    /// directional light exists.
    pub fn select_caster(&mut self, scene: &SceneContext) -> Option<ShadowCaster> {
        if !self.controls.enabled {
            return None;
        }
        let caster = scene.shadow_caster(&self.settings.projection);
        self.caster_watch.observe(caster.map(|c| c.index));
        caster
    }

    fn enter(&mut self, stage: FrameStage) {
        if let Err(e) = self.sequencer.advance(stage) {
            warn!("{e}");
        }
        debug_assert_eq!(self.sequencer.shadow_map_binding(), stage.shadow_map_binding());
    }

    /// Renders and presents one frame.
    pub fn render(&mut self, gpu: &RenderContext, scene: &SceneContext) -> Result<FrameReport, SurfaceError> {
        let surface_texture = gpu.get_current_texture()?;
        if let Err(e @ FrameOrderError::Abandoned { .. }) = self.sequencer.begin_frame() {
            warn!("{e}");
        }

        let device = &gpu.device;
        let queue = &gpu.queue;

        for (gpu_material, material) in self.materials.iter_mut().zip(scene.materials()) {
            gpu_material.update(queue, material);
        }

        let caster = self.select_caster(scene);
        let light_view_proj = caster.map(|c| c.space.view_projection());

        let mut frame = FrameEncoder::new(device, queue, surface_texture);
        let Some((encoder, color_view)) = frame.parts() else {
            return Ok(FrameReport::default());
        };

        self.enter(FrameStage::ClearBuffers);
        {
            let _clear = RenderPassBuilder::new()
                .clear_rgb(self.controls.clear_color)
                .depth_clear(DepthBuffer::CLEAR_VALUE)
                .label("clear-pass")
                .begin(encoder, color_view, Some(&self.depth.view));
        }

        self.enter(FrameStage::ShadowPass);
        let shadow_draws: Vec<ShadowDraw<'_>> = scene
            .entities
            .iter()
            .filter(|e| e.casts_shadows)
            .filter_map(|e| {
                self.meshes.get(e.mesh.0).map(|mesh| ShadowDraw {
                    mesh,
                    world: e.transform.world_matrix(),
                })
            })
            .collect();
        let shadow_draw_count = self.shadow_pipeline.render(
            device,
            queue,
            encoder,
            &self.shadow_map,
            &mut self.viewports,
            light_view_proj,
            &shadow_draws,
        );

        self.enter(FrameStage::RestoreViewport);
        if !self.viewports.is_main_active() {
            warn!("Main viewport not active after the shadow pass");
        }

        self.enter(FrameStage::MainPass);
        let main_draws = self.main_pass(device, queue, encoder, color_view, scene, caster);

        self.enter(FrameStage::Present);
        frame.submit();

        Ok(FrameReport {
            caster,
            shadow_draws: shadow_draw_count,
            main_draws,
        })
    }

    fn main_pass(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        color_view: &wgpu::TextureView,
        scene: &SceneContext,
        caster: Option<ShadowCaster>,
    ) -> usize {
        let Some(camera) = scene.active_camera() else {
            return 0;
        };

        let draws: Vec<LitDraw<'_>> = scene
            .entities
            .iter()
            .filter_map(|e| {
                Some(LitDraw {
                    mesh: self.meshes.get(e.mesh.0)?,
                    material: self.materials.get(e.material.0)?,
                    object: ObjectUniform::new(&e.transform),
                })
            })
            .collect();

        let lights = LightsUniform::new(&scene.lights, scene.ambient, caster.map(|c| c.index));
        let shadow = match caster {
            Some(c) => ShadowUniform::new(c.space.view_projection(), self.shadow_map.resolution),
            None => ShadowUniform::disabled(),
        };
        self.lit_pipeline
            .prepare(device, queue, &FrameUniform::new(camera), &lights, &shadow, &draws);
        self.sky.prepare(queue, camera);

        let mut pass = RenderPassBuilder::new()
            .load_existing()
            .label("main-pass")
            .begin(encoder, color_view, Some(&self.depth.view));
        self.viewports.main().apply(&mut pass);
        self.lit_pipeline.draw(&mut pass, &draws);
        self.sky.draw(&mut pass);
        self.overlay.draw(&mut pass, &mut self.viewports);
        draws.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controls_follow_config() {
        let mut config = Config::default();
        config.render.clear_color = [0.0, 0.1, 0.2];
        config.render.sky = false;
        config.render.show_shadow_overlay = true;
        config.shadow.filter = ShadowFilter::Nearest;

        let controls = RenderControls::from_config(&config);
        assert_eq!(controls.clear_color, [0.0, 0.1, 0.2]);
        assert!(!controls.sky);
        assert!(controls.overlay);
        assert_eq!(controls.filter, ShadowFilter::Nearest);
        assert_eq!(controls.bias, ShadowSettings::from_config(&config.shadow).bias);
    }
}
