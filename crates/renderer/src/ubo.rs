//! Uniform buffer layouts shared with `shaders/shader.vert`.
//!
//! Both structs are `#[repr(C)]` and `Pod` so they can be written into a
//! mapped buffer with `bytemuck::bytes_of`. Matrices are column-major, which
//! matches std140 for `mat4`.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use bento_scene::Camera;

/// Frame-global camera data, bound at set 0, binding 0.
///
/// # Memory Layout
///
/// - Offset 0: view matrix (64 bytes)
/// - Offset 64: projection matrix (64 bytes)
/// - Total size: 128 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GlobalUbo {
    /// World to view space.
    pub view: Mat4,
    /// View to clip space, Y already flipped for Vulkan.
    pub proj: Mat4,
}

impl GlobalUbo {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn from_camera(camera: &Camera) -> Self {
        Self {
            view: camera.view_matrix(),
            proj: camera.projection_matrix(),
        }
    }
}

/// Per-mesh transform, bound at set 1, binding 0.
///
/// - Offset 0: model matrix (64 bytes)
/// - Total size: 64 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ObjectUbo {
    /// Object to world space.
    pub model: Mat4,
}

impl ObjectUbo {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(model: Mat4) -> Self {
        Self { model }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_global_ubo_size() {
        assert_eq!(GlobalUbo::SIZE, 128);
        assert_eq!(GlobalUbo::SIZE % 16, 0);
    }

    #[test]
    fn test_object_ubo_size() {
        assert_eq!(ObjectUbo::SIZE, 64);
    }

    #[test]
    fn test_global_ubo_from_camera() {
        let camera = Camera::new();
        let ubo = GlobalUbo::from_camera(&camera);

        assert_eq!(ubo.view, camera.view_matrix());
        assert_eq!(ubo.proj, camera.projection_matrix());
    }

    #[test]
    fn test_object_ubo_bytes_start_with_model() {
        let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let ubo = ObjectUbo::new(model);
        let bytes = bytemuck::bytes_of(&ubo);

        assert_eq!(bytes.len(), ObjectUbo::SIZE);
        assert_eq!(bytes, bytemuck::bytes_of(&model));
    }
}
