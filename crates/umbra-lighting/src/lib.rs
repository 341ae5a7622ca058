//! Light records, light-space matrices, and the shadow map.
//!
//! [`software`] is a CPU implementation of the depth-only pass and the
//! comparison sampler. It shares every matrix and bias rule with the GPU path
//! and is what the shadow tests run against when no adapter is present.

mod light;
mod light_space;
mod shadow;
pub mod software;

pub use light::{Light, LightKind, LightUniform, LightsUniform, MAX_LIGHTS, attenuation, smoothstep};
pub use light_space::{
    CasterWatch, LightProjection, LightSpace, ShadowCaster, light_up_vector, ndc_to_shadow_uv,
    select_shadow_caster,
};
pub use shadow::{
    DepthBias, SHADOW_MAP_FORMAT, ShadowMap, ShadowMapError, ShadowSettings, ShadowUniform,
    create_scoped, min_resolvable_depth,
};
