//! The demo scene: a row of bronze meshes over an ice floor, five lights, and
//! three cameras.

use std::path::{Path, PathBuf};

use glam::Vec3;
use umbra_config::Config;
use umbra_lighting::Light;

use crate::camera::Camera;
use crate::material::Material;
use crate::mesh::MeshData;
use crate::obj::load_obj;
use crate::primitives;
use crate::scene::{Entity, SceneContext};
use crate::transform::Transform;

/// Height of the mesh row.
const ROW_Y: f32 = -1.5;

#[derive(Debug, Clone)]
pub struct DemoOptions {
    /// Directory searched for `<mesh>.obj`; primitives are used for any
    /// mesh not found there.
    pub asset_dir: Option<PathBuf>,
    pub ambient: Vec3,
    pub aspect_ratio: f32,
    pub move_speed: f32,
    pub look_speed: f32,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            asset_dir: None,
            ambient: Vec3::splat(0.5),
            aspect_ratio: 16.0 / 9.0,
            move_speed: 5.0,
            look_speed: 0.004,
        }
    }
}

impl DemoOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            asset_dir: config.scene.asset_dir.clone(),
            ambient: Vec3::from_array(config.scene.ambient),
            aspect_ratio: config.window.width as f32 / config.window.height.max(1) as f32,
            move_speed: config.camera.move_speed,
            look_speed: config.camera.look_speed,
        }
    }
}

pub fn build_demo_scene(options: &DemoOptions) -> SceneContext {
    let mut scene = SceneContext::new(options.ambient);
    let asset_dir = options.asset_dir.as_deref();

    let bronze = scene.add_material(Material::bronze());
    let ice = scene.add_material(Material::ice());
    scene.add_material(Material::tiles());

    let row: [(&str, fn() -> MeshData, Vec3); 7] = [
        ("cube", primitives::cube, Vec3::new(-2.5, ROW_Y, 0.0)),
        ("cylinder", || primitives::cylinder(32), Vec3::new(2.5, ROW_Y, 0.0)),
        (
            "helix",
            || primitives::helix(0.4, 0.1, 2.0, 3.0, 192, 12),
            Vec3::new(0.0, ROW_Y - 1.0, 0.0),
        ),
        ("quad", primitives::quad, Vec3::new(7.5, ROW_Y, 0.0)),
        ("quad_double_sided", primitives::quad_double_sided, Vec3::new(-7.5, ROW_Y, 0.0)),
        ("sphere", || primitives::sphere(32, 16), Vec3::new(5.0, ROW_Y - 1.3, 0.0)),
        ("torus", || primitives::torus(0.5, 0.2, 48, 24), Vec3::new(-5.0, ROW_Y, 0.0)),
    ];
    for (name, generate, position) in row {
        let mesh = scene.add_mesh(load_mesh(asset_dir, name, generate));
        scene.add_entity(Entity::new(name, mesh, bronze, Transform::from_position(position)));
    }

    let floor = scene.add_mesh(load_mesh(
        asset_dir,
        "quad_double_sided",
        primitives::quad_double_sided,
    ));
    scene.add_entity(
        Entity::new(
            "floor",
            floor,
            ice,
            Transform::from_position(Vec3::new(0.0, -3.0, 0.0))
                .with_scale(Vec3::new(15.0, 1.0, 15.0)),
        )
        .receiver_only(),
    );

    scene.add_light(Light::directional(Vec3::new(0.0, -0.25, 1.0), Vec3::ONE, 5.0));
    scene.add_light(Light::directional(Vec3::NEG_X, Vec3::new(0.4, 0.9, 0.7), 1.0));
    scene.add_light(Light::point(Vec3::new(3.0, 3.0, 0.0), Vec3::Y, 1.0, 100.0));
    scene.add_light(Light::directional(Vec3::NEG_Z, Vec3::splat(0.5), 1.0));
    scene.add_light(Light::spot(
        Vec3::new(7.5, 1.0, 0.0),
        Vec3::NEG_Y,
        Vec3::ONE,
        1.0,
        4.0,
        10f32.to_radians(),
        30f32.to_radians(),
    ));

    for (position, fov) in [
        (Vec3::new(0.0, 0.0, -2.0), 45.0),
        (Vec3::new(-1.0, 0.0, -1.0), 60.0),
        (Vec3::new(3.0, 2.0, -2.0), 90.0),
    ] {
        let mut camera = Camera::new(position, options.aspect_ratio, fov);
        camera.move_speed = options.move_speed;
        camera.look_speed = options.look_speed;
        scene.add_camera(camera);
    }

    log::info!(
        "Demo scene: {} entities, {} meshes, {} lights",
        scene.entities.len(),
        scene.meshes().len(),
        scene.lights.len()
    );
    scene
}

fn load_mesh(asset_dir: Option<&Path>, name: &str, generate: fn() -> MeshData) -> MeshData {
    let Some(dir) = asset_dir else {
        return generate();
    };
    let path = dir.join(format!("{name}.obj"));
    if !path.exists() {
        return generate();
    }
    match load_obj(&path) {
        Ok(mut mesh) => {
            mesh.name = name.to_string();
            mesh
        }
        Err(e) => {
            log::warn!("Falling back to generated {name}: {e}");
            generate()
        }
    }
}
