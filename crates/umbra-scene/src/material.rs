//! Surface descriptions consumed by the lit pipeline.

use glam::{Vec2, Vec4};

/// Texture filtering for a material's samplers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SamplerKind {
    #[default]
    Linear,
    Nearest,
}

/// Named texture slots. `None` binds a neutral 1×1 default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialTextures {
    pub albedo: Option<String>,
    pub normal: Option<String>,
    pub roughness: Option<String>,
    pub metalness: Option<String>,
}

impl MaterialTextures {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        [&self.albedo, &self.normal, &self.roughness, &self.metalness]
            .into_iter()
            .filter_map(|slot| slot.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// Linear RGBA multiplier on the albedo texture.
    pub tint: Vec4,
    /// Scalar multiplied with the roughness map.
    pub roughness: f32,
    pub metalness: f32,
    pub uv_scale: Vec2,
    pub uv_offset: Vec2,
    pub textures: MaterialTextures,
    pub sampler: SamplerKind,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            tint: Vec4::ONE,
            roughness: 1.0,
            metalness: 0.0,
            uv_scale: Vec2::ONE,
            uv_offset: Vec2::ZERO,
            textures: MaterialTextures::default(),
            sampler: SamplerKind::Linear,
        }
    }
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_tint(mut self, tint: Vec4) -> Self {
        self.tint = tint;
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.set_roughness(roughness);
        self
    }

    pub fn with_metalness(mut self, metalness: f32) -> Self {
        self.set_metalness(metalness);
        self
    }

    pub fn with_uv_transform(mut self, scale: Vec2, offset: Vec2) -> Self {
        self.uv_scale = scale;
        self.uv_offset = offset;
        self
    }

    pub fn with_textures(mut self, textures: MaterialTextures) -> Self {
        self.textures = textures;
        self
    }

    pub fn with_sampler(mut self, sampler: SamplerKind) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn set_roughness(&mut self, roughness: f32) {
        self.roughness = roughness.clamp(0.0, 1.0);
    }

    pub fn set_metalness(&mut self, metalness: f32) {
        self.metalness = metalness.clamp(0.0, 1.0);
    }

    /// PBR bronze with the full texture set.
    pub fn bronze() -> Self {
        Self::new("bronze").with_metalness(1.0).with_textures(MaterialTextures {
            albedo: Some("bronze_albedo".to_string()),
            normal: Some("bronze_normal".to_string()),
            roughness: Some("bronze_roughness".to_string()),
            metalness: Some("bronze_metal".to_string()),
        })
    }

    /// Untextured rough cyan ice, used for the floor.
    pub fn ice() -> Self {
        Self::new("ice")
            .with_tint(Vec4::new(0.0, 1.0, 1.0, 1.0))
            .with_roughness(1.0)
            .with_textures(MaterialTextures {
                albedo: Some("ice".to_string()),
                ..MaterialTextures::default()
            })
    }

    /// Tiled albedo with a nearest-neighbour sampler.
    pub fn tiles() -> Self {
        Self::new("tiles")
            .with_roughness(0.6)
            .with_uv_transform(Vec2::splat(4.0), Vec2::ZERO)
            .with_sampler(SamplerKind::Nearest)
            .with_textures(MaterialTextures {
                albedo: Some("tiles".to_string()),
                ..MaterialTextures::default()
            })
    }
}
