// Per-frame uniform data: model/view/projection matrices

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Degrees of rotation per second around +Z
const SPIN_DEGREES_PER_SEC: f32 = 90.0;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct UniformBufferObject {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

impl UniformBufferObject {
    /// Matrices for `elapsed` seconds after start, drawn into `extent`
    pub fn at(elapsed: f32, extent: vk::Extent2D) -> Self {
        let aspect = extent.width as f32 / extent.height.max(1) as f32;

        let model = Mat4::from_rotation_z(elapsed * SPIN_DEGREES_PER_SEC.to_radians());
        let view = Mat4::look_at_rh(Vec3::new(2.0, 2.0, 2.0), Vec3::ZERO, Vec3::Z);
        let mut proj = Mat4::perspective_rh(45f32.to_radians(), aspect, 0.1, 10.0);
        // Vulkan clip space has Y pointing down
        proj.y_axis.y *= -1.0;

        Self { model, view, proj }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTENT: vk::Extent2D = vk::Extent2D { width: 1280, height: 720 };

    #[test]
    fn model_starts_unrotated() {
        let ubo = UniformBufferObject::at(0.0, EXTENT);
        assert!(ubo.model.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn one_second_is_a_quarter_turn() {
        let ubo = UniformBufferObject::at(1.0, EXTENT);
        let rotated = ubo.model.transform_vector3(Vec3::X);
        assert!(rotated.abs_diff_eq(Vec3::Y, 1e-5), "{rotated:?}");
    }

    #[test]
    fn view_puts_the_eye_at_the_origin() {
        let ubo = UniformBufferObject::at(0.0, EXTENT);
        let eye = ubo.view.transform_point3(Vec3::new(2.0, 2.0, 2.0));
        assert!(eye.abs_diff_eq(Vec3::ZERO, 1e-5));
    }

    #[test]
    fn projection_flips_y_and_tracks_aspect() {
        let wide = UniformBufferObject::at(0.0, EXTENT);
        assert!(wide.proj.y_axis.y < 0.0);

        let aspect = wide.proj.y_axis.y.abs() / wide.proj.x_axis.x;
        assert!((aspect - 1280.0 / 720.0).abs() < 1e-4);
    }

    #[test]
    fn zero_height_does_not_produce_nan() {
        let ubo = UniformBufferObject::at(0.5, vk::Extent2D { width: 640, height: 0 });
        assert!(!ubo.proj.is_nan());
    }

    #[test]
    fn layout_is_three_packed_matrices() {
        assert_eq!(std::mem::size_of::<UniformBufferObject>(), 3 * 64);
    }
}
