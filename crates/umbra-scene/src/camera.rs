//! Perspective fly camera.

use glam::{Mat4, Vec2, Vec3};

use crate::transform::Transform;

/// Pitch limit: straight up or down.
const MAX_PITCH: f32 = std::f32::consts::FRAC_PI_2;

/// A camera looking down its transform's local +Z.
///
/// The projection is reverse-Z (near plane at depth 1, far plane at 0).
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub transform: Transform,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    /// Width / height.
    pub aspect_ratio: f32,
    /// World units per second.
    pub move_speed: f32,
    /// Radians per pixel of mouse drag.
    pub look_speed: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            transform: Transform::default(),
            fov_y: 45f32.to_radians(),
            near: 0.1,
            far: 1000.0,
            aspect_ratio: 16.0 / 9.0,
            move_speed: 5.0,
            look_speed: 0.004,
        }
    }
}

impl Camera {
    pub fn new(position: Vec3, aspect_ratio: f32, fov_degrees: f32) -> Self {
        Self {
            transform: Transform::from_position(position),
            fov_y: fov_degrees.to_radians(),
            aspect_ratio,
            ..Self::default()
        }
    }

    pub fn position(&self) -> Vec3 {
        self.transform.position()
    }

    pub fn forward(&self) -> Vec3 {
        self.transform.forward()
    }

    pub fn up(&self) -> Vec3 {
        self.transform.up()
    }

    /// Screen-right direction.
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up())
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position(), self.forward(), self.up())
    }

    pub fn projection_matrix(&self) -> Mat4 {
        // near/far swapped for reverse-Z
        Mat4::perspective_rh(self.fov_y, self.aspect_ratio, self.far, self.near)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Ignored for a zero-height target (minimized window).
    pub fn set_aspect_ratio(&mut self, width: f32, height: f32) {
        if width > 0.0 && height > 0.0 {
            self.aspect_ratio = width / height;
        }
    }

    /// Applies one frame of fly controls.
    ///
    /// `movement` is x = screen right, y = world up, z = forward. `look` is a
    /// mouse drag in pixels: x yaws, y pitches (down looks down).
    pub fn fly(&mut self, movement: Vec3, look: Vec2, speed_multiplier: f32, dt: f32) {
        if look != Vec2::ZERO {
            let mut rot = self.transform.rotation();
            rot.y -= look.x * self.look_speed;
            rot.x = (rot.x + look.y * self.look_speed).clamp(-MAX_PITCH, MAX_PITCH);
            self.transform.set_rotation(rot);
        }

        if movement != Vec3::ZERO {
            let step = self.move_speed * speed_multiplier * dt;
            let offset =
                self.right() * movement.x + self.forward() * movement.z + Vec3::Y * movement.y;
            self.transform.move_absolute(offset * step);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_camera_looks_down_pos_z() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, -2.0), 16.0 / 9.0, 45.0);
        assert!((camera.forward() - Vec3::Z).length() < 1e-6);
        // An object in front of the camera lands inside the clip volume.
        let clip = camera.view_projection_matrix().project_point3(Vec3::ZERO);
        assert!(clip.x.abs() < 1e-5 && clip.y.abs() < 1e-5);
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }

    #[test]
    fn test_reverse_z_planes() {
        let camera = Camera::default();
        let proj = camera.projection_matrix();
        let near = proj.project_point3(Vec3::new(0.0, 0.0, -camera.near));
        let far = proj.project_point3(Vec3::new(0.0, 0.0, -camera.far));
        assert!((near.z - 1.0).abs() < 1e-5);
        assert!(far.z.abs() < 1e-5);
    }

    #[test]
    fn test_right_is_screen_right() {
        let camera = Camera::default();
        let p = camera.view_projection_matrix().project_point3(camera.right() + Vec3::Z * 5.0);
        assert!(p.x > 0.0);
    }

    #[test]
    fn test_pitch_clamped() {
        let mut camera = Camera::default();
        camera.fly(Vec3::ZERO, Vec2::new(0.0, 1.0e6), 1.0, 0.016);
        assert!((camera.transform.rotation().x - MAX_PITCH).abs() < 1e-6);
        camera.fly(Vec3::ZERO, Vec2::new(0.0, -1.0e7), 1.0, 0.016);
        assert!((camera.transform.rotation().x + MAX_PITCH).abs() < 1e-6);
        assert!(camera.view_matrix().is_finite());
    }

    #[test]
    fn test_fly_moves_forward_and_up() {
        let mut camera = Camera::default();
        camera.move_speed = 2.0;
        camera.fly(Vec3::new(0.0, 1.0, 1.0), Vec2::ZERO, 1.0, 0.5);
        assert!((camera.position() - Vec3::new(0.0, 1.0, 1.0)).length() < 1e-5);

        camera.fly(Vec3::new(0.0, 0.0, 1.0), Vec2::ZERO, 5.0, 0.1);
        assert!((camera.position().z - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_drag_right_turns_right() {
        let mut camera = Camera::default();
        let right_before = camera.right();
        camera.fly(Vec3::ZERO, Vec2::new(100.0, 0.0), 1.0, 0.016);
        assert!(camera.forward().dot(right_before) > 0.0);
    }

    #[test]
    fn test_aspect_ignores_zero_height() {
        let mut camera = Camera::default();
        camera.set_aspect_ratio(1280.0, 0.0);
        assert!((camera.aspect_ratio - 16.0 / 9.0).abs() < 1e-6);
        camera.set_aspect_ratio(800.0, 800.0);
        assert_eq!(camera.aspect_ratio, 1.0);
    }
}
