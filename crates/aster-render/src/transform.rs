//! Per-frame transform math and push constants.

use glam::{Mat4, Vec3};

/// Degrees of model rotation accumulated per frame.
pub const TURN_DEGREES_PER_FRAME: f32 = 0.4;

/// Translation applied to the scene; the camera sits two units back.
const CAMERA_OFFSET: Vec3 = Vec3::new(0.0, 0.0, -2.0);

/// Vertical field of view in degrees.
const FOV_DEGREES: f32 = 70.0;

const NEAR_PLANE: f32 = 0.1;
const FAR_PLANE: f32 = 200.0;

/// Push constant block for the mesh pipeline.
///
/// Layout matches the `push_constant` block in `tri_mesh.vert`: a spare
/// vec4 followed by the render matrix.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshPushConstants {
    pub data: [f32; 4],
    pub render_matrix: [[f32; 4]; 4],
}

impl MeshPushConstants {
    /// Build the push constants for a frame.
    pub fn for_frame(frame_number: u64, aspect: f32) -> Self {
        Self {
            data: [0.0; 4],
            render_matrix: render_matrix(frame_number, aspect).to_cols_array_2d(),
        }
    }
}

/// Model rotation for a frame: a steady spin about +Y.
pub fn model_rotation(frame_number: u64) -> Mat4 {
    let degrees = frame_number as f32 * TURN_DEGREES_PER_FRAME;
    Mat4::from_rotation_y(degrees.to_radians())
}

/// Fixed view matrix.
pub fn view_matrix() -> Mat4 {
    Mat4::from_translation(CAMERA_OFFSET)
}

/// Perspective projection with the Y axis flipped for Vulkan clip space.
pub fn projection_matrix(aspect: f32) -> Mat4 {
    let mut projection =
        Mat4::perspective_rh(FOV_DEGREES.to_radians(), aspect, NEAR_PLANE, FAR_PLANE);
    projection.y_axis.y *= -1.0;
    projection
}

/// Combined projection * view * model matrix for a frame.
pub fn render_matrix(frame_number: u64, aspect: f32) -> Mat4 {
    projection_matrix(aspect) * view_matrix() * model_rotation(frame_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rotation_starts_at_identity() {
        assert!(model_rotation(0).abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn rotation_reaches_half_turn_at_frame_450() {
        // 450 frames * 0.4 degrees = 180 degrees
        let expected = Mat4::from_rotation_y(std::f32::consts::PI);
        assert!(model_rotation(450).abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn half_turn_mirrors_the_x_axis() {
        let rotated = model_rotation(450).transform_point3(Vec3::X);
        assert_relative_eq!(rotated.x, -1.0, epsilon = 1e-5);
        assert_relative_eq!(rotated.z, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn projection_flips_y_for_vulkan() {
        let unflipped = Mat4::perspective_rh(
            FOV_DEGREES.to_radians(),
            1700.0 / 900.0,
            NEAR_PLANE,
            FAR_PLANE,
        );
        let projection = projection_matrix(1700.0 / 900.0);
        assert_relative_eq!(projection.y_axis.y, -unflipped.y_axis.y);
    }

    #[test]
    fn push_constants_are_densely_packed() {
        // vec4 + mat4 = 16 + 64 bytes, matching the shader block
        assert_eq!(std::mem::size_of::<MeshPushConstants>(), 80);
    }

    #[test]
    fn frame_push_constants_carry_the_render_matrix() {
        let constants = MeshPushConstants::for_frame(37, 1.0);
        let expected = render_matrix(37, 1.0).to_cols_array_2d();
        assert_eq!(constants.render_matrix, expected);
        assert_eq!(constants.data, [0.0; 4]);
    }
}
