//! The scene context: arenas of meshes and materials, the entity list, lights,
//! and cameras.

use glam::Vec3;
use umbra_lighting::software::{RasterStats, SoftwareShadowMap};
use umbra_lighting::{DepthBias, Light, LightProjection, ShadowCaster, select_shadow_caster};

use crate::camera::Camera;
use crate::material::Material;
use crate::mesh::MeshData;
use crate::transform::Transform;

/// Index into [`SceneContext::meshes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub usize);

/// Index into [`SceneContext::materials`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub name: String,
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
    pub transform: Transform,
    /// Receivers such as the floor are drawn in the main pass only.
    pub casts_shadows: bool,
}

impl Entity {
    pub fn new(
        name: impl Into<String>,
        mesh: MeshHandle,
        material: MaterialHandle,
        transform: Transform,
    ) -> Self {
        Self {
            name: name.into(),
            mesh,
            material,
            transform,
            casts_shadows: true,
        }
    }

    pub fn receiver_only(mut self) -> Self {
        self.casts_shadows = false;
        self
    }
}

/// Everything the renderer draws in a frame.
#[derive(Debug, Clone, Default)]
pub struct SceneContext {
    meshes: Vec<MeshData>,
    materials: Vec<Material>,
    pub entities: Vec<Entity>,
    pub lights: Vec<Light>,
    cameras: Vec<Camera>,
    active_camera: usize,
    pub ambient: Vec3,
}

impl SceneContext {
    pub fn new(ambient: Vec3) -> Self {
        Self {
            ambient,
            ..Self::default()
        }
    }

    pub fn add_mesh(&mut self, mesh: MeshData) -> MeshHandle {
        self.meshes.push(mesh);
        MeshHandle(self.meshes.len() - 1)
    }

    pub fn add_material(&mut self, material: Material) -> MaterialHandle {
        self.materials.push(material);
        MaterialHandle(self.materials.len() - 1)
    }

    pub fn add_entity(&mut self, entity: Entity) -> usize {
        self.entities.push(entity);
        self.entities.len() - 1
    }

    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    /// The first camera added becomes active.
    pub fn add_camera(&mut self, camera: Camera) -> usize {
        self.cameras.push(camera);
        self.cameras.len() - 1
    }

    pub fn mesh(&self, handle: MeshHandle) -> Option<&MeshData> {
        self.meshes.get(handle.0)
    }

    pub fn meshes(&self) -> &[MeshData] {
        &self.meshes
    }

    pub fn material(&self, handle: MaterialHandle) -> Option<&Material> {
        self.materials.get(handle.0)
    }

    pub fn material_mut(&mut self, handle: MaterialHandle) -> Option<&mut Material> {
        self.materials.get_mut(handle.0)
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    pub fn active_camera_index(&self) -> usize {
        self.active_camera
    }

    pub fn active_camera(&self) -> Option<&Camera> {
        self.cameras.get(self.active_camera)
    }

    pub fn active_camera_mut(&mut self) -> Option<&mut Camera> {
        self.cameras.get_mut(self.active_camera)
    }

    /// Returns `false` and keeps the current camera if `index` is out of range.
    pub fn select_camera(&mut self, index: usize) -> bool {
        if index < self.cameras.len() {
            if index != self.active_camera {
                log::info!("Active camera: {index}");
            }
            self.active_camera = index;
            true
        } else {
            false
        }
    }

    /// Applies a new render-target size to every camera.
    pub fn set_aspect_ratio(&mut self, width: u32, height: u32) {
        for camera in &mut self.cameras {
            camera.set_aspect_ratio(width as f32, height as f32);
        }
    }

    pub fn shadow_caster(&self, projection: &LightProjection) -> Option<ShadowCaster> {
        select_shadow_caster(&self.lights, projection)
    }

    /// Entities drawn in the depth-only pass, with their meshes.
    pub fn shadow_casters(&self) -> impl Iterator<Item = (&Entity, &MeshData)> {
        self.entities
            .iter()
            .filter(|e| e.casts_shadows)
            .filter_map(|e| self.mesh(e.mesh).map(|mesh| (e, mesh)))
    }

    /// Runs the depth-only pass on the CPU: clears `map`, then draws every
    /// shadow caster with the given light matrix and bias.
    pub fn rasterize_shadow_map(
        &self,
        map: &mut SoftwareShadowMap,
        light_view_proj: glam::Mat4,
        bias: DepthBias,
    ) -> RasterStats {
        map.clear();
        let mut stats = RasterStats::default();
        for (entity, mesh) in self.shadow_casters() {
            stats += map.draw_indexed(
                &mesh.positions(),
                &mesh.indices,
                entity.transform.world_matrix(),
                light_view_proj,
                bias,
            );
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives;

    fn scene_with_floor() -> SceneContext {
        let mut scene = SceneContext::new(Vec3::splat(0.5));
        let cube = scene.add_mesh(primitives::cube());
        let quad = scene.add_mesh(primitives::quad_double_sided());
        let mat = scene.add_material(Material::default());
        scene.add_entity(Entity::new("cube", cube, mat, Transform::default()));
        scene.add_entity(
            Entity::new(
                "floor",
                quad,
                mat,
                Transform::from_position(Vec3::new(0.0, -3.0, 0.0))
                    .with_scale(Vec3::new(15.0, 1.0, 15.0)),
            )
            .receiver_only(),
        );
        scene
    }

    #[test]
    fn test_handles_share_meshes() {
        let mut scene = scene_with_floor();
        let cube = scene.entities[0].mesh;
        let mat = scene.entities[0].material;
        scene.add_entity(Entity::new("cube2", cube, mat, Transform::default()));
        assert_eq!(scene.meshes().len(), 2);
        assert_eq!(scene.mesh(scene.entities[2].mesh).unwrap().name, "cube");
    }

    #[test]
    fn test_receivers_excluded_from_casters() {
        let scene = scene_with_floor();
        let names: Vec<_> = scene.shadow_casters().map(|(e, _)| e.name.as_str()).collect();
        assert_eq!(names, ["cube"]);
    }

    #[test]
    fn test_camera_selection() {
        let mut scene = SceneContext::default();
        assert!(scene.active_camera().is_none());
        scene.add_camera(Camera::default());
        scene.add_camera(Camera::new(Vec3::ONE, 1.0, 60.0));
        assert_eq!(scene.active_camera_index(), 0);
        assert!(scene.select_camera(1));
        assert_eq!(scene.active_camera().unwrap().position(), Vec3::ONE);
        assert!(!scene.select_camera(5));
        assert_eq!(scene.active_camera_index(), 1);
    }

    #[test]
    fn test_aspect_applies_to_all_cameras() {
        let mut scene = SceneContext::default();
        scene.add_camera(Camera::default());
        scene.add_camera(Camera::default());
        scene.set_aspect_ratio(1000, 500);
        assert!(scene.cameras().iter().all(|c| c.aspect_ratio == 2.0));
    }

    #[test]
    fn test_no_caster_without_directional_light() {
        let mut scene = scene_with_floor();
        scene.add_light(Light::point(Vec3::Y, Vec3::ONE, 1.0, 10.0));
        assert!(scene.shadow_caster(&LightProjection::default()).is_none());
        scene.add_light(Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0));
        assert_eq!(scene.shadow_caster(&LightProjection::default()).unwrap().index, 1);
    }

    #[test]
    fn test_rasterize_clears_previous_contents() {
        let mut scene = scene_with_floor();
        scene.add_light(Light::directional(Vec3::new(0.0, -0.25, 1.0), Vec3::ONE, 5.0));
        let caster = scene.shadow_caster(&LightProjection::default()).unwrap();
        let mut map = SoftwareShadowMap::new(128);
        let view_proj = caster.space.view_projection();
        let first = scene.rasterize_shadow_map(&mut map, view_proj, DepthBias::default());
        assert!(first.written > 0);

        scene.entities.clear();
        scene.rasterize_shadow_map(&mut map, view_proj, DepthBias::default());
        assert!(map.depths().iter().all(|&d| d == 1.0));
    }
}
