//! Position, rotation, and scale of an object.

use glam::{EulerRot, Mat4, Quat, Vec3};

/// Rotation is stored as Euler angles in radians: x = pitch, y = yaw, z = roll.
/// The world matrix is `T * R * S` with `R = Ry(yaw) * Rx(pitch) * Rz(roll)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    position: Vec3,
    rotation: Vec3,
    scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_rotation(mut self, pitch_yaw_roll: Vec3) -> Self {
        self.rotation = pitch_yaw_roll;
        self
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// (pitch, yaw, roll) in radians.
    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_rotation(&mut self, pitch_yaw_roll: Vec3) {
        self.rotation = pitch_yaw_roll;
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
    }

    /// Moves along world axes.
    pub fn move_absolute(&mut self, offset: Vec3) {
        self.position += offset;
    }

    /// Moves along the object's local axes.
    pub fn move_relative(&mut self, offset: Vec3) {
        self.position += self.quat() * offset;
    }

    pub fn rotate(&mut self, delta_pitch_yaw_roll: Vec3) {
        self.rotation += delta_pitch_yaw_roll;
    }

    /// Component-wise multiply of the current scale.
    pub fn scale_by(&mut self, factor: Vec3) {
        self.scale *= factor;
    }

    pub fn quat(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.rotation.y, self.rotation.x, self.rotation.z)
    }

    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.quat(), self.position)
    }

    /// Inverse-transpose of the world matrix, for transforming normals.
    pub fn world_inverse_transpose(&self) -> Mat4 {
        self.world_matrix().inverse().transpose()
    }

    /// Local +Z in world space.
    pub fn forward(&self) -> Vec3 {
        self.quat() * Vec3::Z
    }

    /// Local +X in world space.
    pub fn right(&self) -> Vec3 {
        self.quat() * Vec3::X
    }

    /// Local +Y in world space.
    pub fn up(&self) -> Vec3 {
        self.quat() * Vec3::Y
    }
}
