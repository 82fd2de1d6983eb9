//! Mesh placement with a constant spin.
//!
//! The model matrix at time `t` is
//! `translate(position) * rotate(spin_axis, t * spin_rate) * scale`.
//!
//! # Example
//!
//! ```
//! use bento_scene::Transform;
//! use glam::Vec3;
//!
//! let transform = Transform::new()
//!     .with_position(Vec3::new(1.0, 0.0, 0.0))
//!     .with_spin_degrees(90.0);
//!
//! // After one second the mesh has turned a quarter revolution.
//! let model = transform.model_matrix(1.0);
//! assert!((model.w_axis.truncate() - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-6);
//! ```

use glam::{Mat4, Quat, Vec3};

/// Axis every mesh spins around unless told otherwise: normalize(0.5, 0, 1).
pub const DEFAULT_SPIN_AXIS: Vec3 = Vec3::new(0.447_213_6, 0.0, 0.894_427_2);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub scale: Vec3,
    /// Unit rotation axis
    pub spin_axis: Vec3,
    /// Angular rate in radians per second
    pub spin_rate: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            spin_axis: DEFAULT_SPIN_AXIS,
            spin_rate: 0.0,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Sets the spin axis. A zero vector keeps the current axis.
    pub fn with_spin_axis(mut self, axis: Vec3) -> Self {
        if let Some(axis) = axis.try_normalize() {
            self.spin_axis = axis;
        }
        self
    }

    pub fn with_spin_degrees(mut self, degrees_per_sec: f32) -> Self {
        self.spin_rate = degrees_per_sec.to_radians();
        self
    }

    /// Rotation angle in radians after `elapsed` seconds.
    #[inline]
    pub fn angle_at(&self, elapsed: f32) -> f32 {
        elapsed * self.spin_rate
    }

    pub fn model_matrix(&self, elapsed: f32) -> Mat4 {
        let rotation = Quat::from_axis_angle(self.spin_axis, self.angle_at(elapsed));
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}
