//! End-to-end shadow-map behaviour on scene geometry, using the CPU reference
//! rasterizer with the same light matrices the renderer uploads.

use glam::Vec3;
use umbra_config::ShadowFilter;
use umbra_lighting::software::SoftwareShadowMap;
use umbra_lighting::{DepthBias, Light, LightProjection, LightSpace};
use umbra_scene::{
    DemoOptions, Entity, Material, SceneContext, Transform, build_demo_scene, primitives,
};

const LIGHT_DIR: Vec3 = Vec3::new(0.0, -0.25, 1.0);
const FLOOR_Y: f32 = -3.0;

fn floor_transform() -> Transform {
    Transform::from_position(Vec3::new(0.0, FLOOR_Y, 0.0)).with_scale(Vec3::new(15.0, 1.0, 15.0))
}

/// One cube at the origin over a receiver-only floor, lit by one directional light.
fn cube_over_floor() -> SceneContext {
    let mut scene = SceneContext::new(Vec3::splat(0.5));
    let mat = scene.add_material(Material::default());
    let cube = scene.add_mesh(primitives::cube());
    let floor = scene.add_mesh(primitives::quad_double_sided());
    scene.add_entity(Entity::new("cube", cube, mat, Transform::default()));
    scene.add_entity(Entity::new("floor", floor, mat, floor_transform()).receiver_only());
    scene.add_light(Light::directional(LIGHT_DIR, Vec3::ONE, 5.0));
    scene
}

fn render(
    scene: &SceneContext,
    resolution: u32,
    bias: DepthBias,
) -> (SoftwareShadowMap, LightSpace) {
    let caster = scene
        .shadow_caster(&LightProjection::default())
        .expect("scene has a directional light");
    let mut map = SoftwareShadowMap::new(resolution);
    scene.rasterize_shadow_map(&mut map, caster.space.view_projection(), bias);
    (map, caster.space)
}

#[test]
fn test_receiver_under_cube_footprint_is_shadowed() {
    let scene = cube_over_floor();
    let (map, space) = render(&scene, 2048, DepthBias::default());

    // The light ray through the cube centre meets the floor 12 units further
    // along +Z (a drop of 3 at a 1:4 slope).
    let footprint_center = Vec3::new(0.0, FLOOR_Y, 12.0);
    let ray = LIGHT_DIR.normalize();
    let hit = ray * (FLOOR_Y / ray.y);
    assert!((hit - footprint_center).length() < 1e-4, "{hit:?}");

    for filter in [ShadowFilter::Nearest, ShadowFilter::Linear] {
        assert_eq!(map.shadow_factor(&space, footprint_center, filter), 0.0);

        // Far corners are outside the orthographic volume.
        for (x, z) in [(-15.0, -15.0), (15.0, -15.0), (-15.0, 15.0), (15.0, 15.0)] {
            let corner = Vec3::new(x, FLOOR_Y, z);
            assert_eq!(map.shadow_factor(&space, corner, filter), 1.0, "corner {corner:?}");
        }

        // Inside the volume but outside the footprint.
        assert_eq!(map.shadow_factor(&space, Vec3::new(5.0, FLOOR_Y, 5.0), filter), 1.0);
        // Straight below the cube the light arrives unobstructed.
        assert_eq!(map.shadow_factor(&space, Vec3::new(0.0, FLOOR_Y, 0.0), filter), 1.0);
    }
}

#[test]
fn test_points_in_front_of_and_behind_occluder() {
    let scene = cube_over_floor();
    let (map, space) = render(&scene, 1024, DepthBias::default());
    let ray = LIGHT_DIR.normalize();

    let behind = ray * 3.0;
    let in_front = -ray * 3.0;
    let beside = Vec3::new(3.0, 0.0, 0.0);
    assert_eq!(map.shadow_factor(&space, behind, ShadowFilter::Linear), 0.0);
    assert_eq!(map.shadow_factor(&space, in_front, ShadowFilter::Linear), 1.0);
    assert_eq!(map.shadow_factor(&space, beside, ShadowFilter::Linear), 1.0);
}

/// The floor as both caster and receiver: it is tilted against the light, so
/// without bias half its samples compare against a nearer texel centre.
fn self_shadowing_floor() -> SceneContext {
    let mut scene = SceneContext::new(Vec3::ZERO);
    let mat = scene.add_material(Material::default());
    let floor = scene.add_mesh(primitives::quad_double_sided());
    scene.add_entity(Entity::new("floor", floor, mat, floor_transform()));
    scene.add_light(Light::directional(LIGHT_DIR, Vec3::ONE, 1.0));
    scene
}

fn acne_count(scene: &SceneContext, bias: DepthBias) -> usize {
    let (map, space) = render(scene, 512, bias);
    let mut count = 0;
    for i in 0..29 {
        for k in 0..57 {
            let x = -7.0 + 0.5 * i as f32 + 0.13;
            let z = -14.0 + 0.5 * k as f32 + 0.07;
            let p = Vec3::new(x, FLOOR_Y, z);
            if map.shadow_factor(&space, p, ShadowFilter::Nearest) < 1.0 {
                count += 1;
            }
        }
    }
    count
}

#[test]
fn test_unbiased_floor_self_shadows() {
    let acne = acne_count(&self_shadowing_floor(), DepthBias::NONE);
    assert!(acne > 0);
}

#[test]
fn test_slope_bias_monotonically_removes_acne() {
    let scene = self_shadowing_floor();
    let counts: Vec<usize> = [0.0, 0.125, 0.25, 0.5, 1.0]
        .into_iter()
        .map(|slope_scale| {
            acne_count(
                &scene,
                DepthBias {
                    constant: 0,
                    slope_scale,
                    clamp: 0.0,
                },
            )
        })
        .collect();

    assert!(counts[0] > 0, "{counts:?}");
    assert!(counts.windows(2).all(|w| w[1] <= w[0]), "{counts:?}");
    assert_eq!(*counts.last().unwrap(), 0, "{counts:?}");
    assert_eq!(acne_count(&scene, DepthBias::default()), 0);
}

#[test]
fn test_default_bias_keeps_near_contact_shadow() {
    // A thin caster 0.1 above the receiver.
    let mut scene = SceneContext::new(Vec3::ZERO);
    let mat = scene.add_material(Material::default());
    let quad = scene.add_mesh(primitives::quad());
    let floor = scene.add_mesh(primitives::quad_double_sided());
    let gap = 0.1;
    scene.add_entity(Entity::new(
        "card",
        quad,
        mat,
        Transform::from_position(Vec3::new(0.0, FLOOR_Y + gap, 0.0)).with_scale(Vec3::splat(2.0)),
    ));
    scene.add_entity(Entity::new("floor", floor, mat, floor_transform()).receiver_only());
    scene.add_light(Light::directional(LIGHT_DIR, Vec3::ONE, 1.0));

    // Where the ray through the card centre lands on the floor.
    let ray = LIGHT_DIR.normalize();
    let receiver = Vec3::new(0.0, FLOOR_Y + gap, 0.0) + ray * (gap / -ray.y);
    assert!((receiver.y - FLOOR_Y).abs() < 1e-5);

    let (map, space) = render(&scene, 2048, DepthBias::default());
    assert_eq!(map.shadow_factor(&space, receiver, ShadowFilter::Linear), 0.0);

    // An excessive slope bias detaches the shadow.
    let (map, space) = render(
        &scene,
        2048,
        DepthBias {
            slope_scale: 20.0,
            ..DepthBias::default()
        },
    );
    assert_eq!(map.shadow_factor(&space, receiver, ShadowFilter::Linear), 1.0);
}

#[test]
fn test_demo_scene_renders_identically_twice() {
    let scene = build_demo_scene(&DemoOptions::default());
    let caster = scene.shadow_caster(&LightProjection::default()).unwrap();
    let view_proj = caster.space.view_projection();

    let mut first = SoftwareShadowMap::new(512);
    let stats_a = scene.rasterize_shadow_map(&mut first, view_proj, DepthBias::default());
    let mut second = first.clone();
    let stats_b = scene.rasterize_shadow_map(&mut second, view_proj, DepthBias::default());

    assert!(stats_a.written > 0);
    assert_eq!(stats_a, stats_b);
    let bits = |m: &SoftwareShadowMap| m.depths().iter().map(|d| d.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&first), bits(&second));
}

#[test]
fn test_removing_directional_lights_disables_caster() {
    let mut scene = build_demo_scene(&DemoOptions::default());
    scene.lights.retain(|l| l.kind() != umbra_lighting::LightKind::Directional);
    assert!(scene.shadow_caster(&LightProjection::default()).is_none());
}
