//! Edits posted to the inspector. Queued by the server thread and applied by
//! the render thread once per frame.
//!
//! Every field is optional; absent fields leave the current value alone.

use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LightEdit {
    pub kind: Option<String>,
    pub direction: Option<[f32; 3]>,
    pub position: Option<[f32; 3]>,
    pub range: Option<f32>,
    pub intensity: Option<f32>,
    pub color: Option<[f32; 3]>,
    pub spot_inner: Option<f32>,
    pub spot_outer: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntityEdit {
    pub position: Option<[f32; 3]>,
    pub rotation: Option<[f32; 3]>,
    pub scale: Option<[f32; 3]>,
    pub casts_shadows: Option<bool>,
    pub tint: Option<[f32; 4]>,
    pub roughness: Option<f32>,
    pub metalness: Option<f32>,
    /// Texture coordinate scale of the entity's material.
    pub uv_scale: Option<[f32; 2]>,
    pub uv_offset: Option<[f32; 2]>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraEdit {
    /// Switches the active camera before the other fields apply.
    pub active: Option<usize>,
    pub position: Option<[f32; 3]>,
    pub rotation: Option<[f32; 3]>,
    pub fov_y: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShadowEdit {
    pub enabled: Option<bool>,
    pub filter: Option<String>,
    pub depth_bias: Option<i32>,
    pub slope_bias: Option<f32>,
    pub bias_clamp: Option<f32>,
    pub overlay: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderEdit {
    /// Linear RGB behind the scene when the sky is hidden.
    pub clear_color: Option<[f32; 3]>,
    pub sky: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    Light { index: usize, edit: LightEdit },
    Entity { index: usize, edit: EntityEdit },
    Camera(CameraEdit),
    Shadow(ShadowEdit),
    Render(RenderEdit),
}

impl Edit {
    pub fn target(&self) -> String {
        match self {
            Self::Light { index, .. } => format!("light {index}"),
            Self::Entity { index, .. } => format!("entity {index}"),
            Self::Camera(_) => "camera".to_string(),
            Self::Shadow(_) => "shadow".to_string(),
            Self::Render(_) => "render".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_light_edit() {
        let edit: LightEdit = serde_json::from_str(r#"{"intensity": 2.5}"#).unwrap();
        assert_eq!(edit.intensity, Some(2.5));
        assert_eq!(edit.direction, None);
        assert_eq!(edit.kind, None);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(serde_json::from_str::<EntityEdit>(r#"{"colour": [1, 0, 0, 1]}"#).is_err());
        assert!(serde_json::from_str::<ShadowEdit>(r#"{"depth_bias": "high"}"#).is_err());
    }

    #[test]
    fn test_edit_targets() {
        let edit = Edit::Light {
            index: 2,
            edit: LightEdit::default(),
        };
        assert_eq!(edit.target(), "light 2");
        assert_eq!(Edit::Shadow(ShadowEdit::default()).target(), "shadow");
        assert_eq!(Edit::Render(RenderEdit::default()).target(), "render");
    }

    #[test]
    fn test_uv_and_render_edits_parse() {
        let edit: EntityEdit =
            serde_json::from_str(r#"{"uv_scale": [4, 2], "uv_offset": [0.5, 0]}"#).unwrap();
        assert_eq!(edit.uv_scale, Some([4.0, 2.0]));
        assert_eq!(edit.uv_offset, Some([0.5, 0.0]));

        let edit: RenderEdit = serde_json::from_str(r#"{"clear_color": [0.1, 0.2, 0.3]}"#).unwrap();
        assert_eq!(edit.clear_color, Some([0.1, 0.2, 0.3]));
        assert_eq!(edit.sky, None);
        assert!(serde_json::from_str::<RenderEdit>(r#"{"clear_color": [1, 2]}"#).is_err());
    }
}
