//! Per-frame uniform block.

use bytemuck::{Pod, Zeroable};
use depthcloud_session::{CameraSample, Orientation};
use glam::{Mat3, Mat4, Quat, Vec2, Vec4};

use crate::PointCloudConfig;

/// Uniform block read by the unprojection vertex stage.
///
/// Matches `PointCloudUniforms` in `unproject.wgsl`: the 3x3 matrix is
/// stored as three 16-byte columns and the block is 272 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointCloudUniforms {
    pub view_projection: [[f32; 4]; 4],
    pub local_to_world: [[f32; 4]; 4],
    pub model_transform: [[f32; 4]; 4],
    pub camera_intrinsics_inversed: [[f32; 4]; 3],
    pub model_position: [f32; 3],
    pub particle_size: f32,
    pub camera_resolution: [f32; 2],
    pub max_points: i32,
    pub confidence_threshold: i32,
}

fn mat3_columns(matrix: Mat3) -> [[f32; 4]; 3] {
    [
        matrix.x_axis.extend(0.0).to_array(),
        matrix.y_axis.extend(0.0).to_array(),
        matrix.z_axis.extend(0.0).to_array(),
    ]
}

/// Rotation from the image-aligned unprojection frame (x right, y down,
/// looking down +z) into the camera frame, for `orientation`.
///
/// The view matrix is rotated by the same angle, so the product
/// `view.inverse() * rotate_to_camera(o)` is the camera transform followed by
/// the Y/Z flip for every orientation.
pub fn rotate_to_camera(orientation: Orientation) -> Mat4 {
    let flip_yz = Mat4::from_diagonal(Vec4::new(1.0, -1.0, -1.0, 1.0));
    flip_yz * Mat4::from_quat(Quat::from_rotation_z(orientation.angle()))
}

/// Builds [`PointCloudUniforms`] from a camera sample.
///
/// Holds only the fields fixed at construction; every matrix is recomputed
/// from the sample on each call.
#[derive(Debug, Clone)]
pub struct FrameUniformBuilder {
    orientation: Orientation,
    near: f32,
    far: f32,
    rotate_to_camera: Mat4,
    fixed: PointCloudUniforms,
}

impl FrameUniformBuilder {
    pub fn new(config: &PointCloudConfig) -> Self {
        let [width, height] = config.camera_resolution;
        let fixed = PointCloudUniforms {
            model_transform: Mat4::IDENTITY.to_cols_array_2d(),
            model_position: config.model_position,
            particle_size: config.particle_size,
            camera_resolution: [width as f32, height as f32],
            max_points: i32::try_from(config.max_points).unwrap_or(i32::MAX),
            confidence_threshold: config.confidence_threshold,
            ..PointCloudUniforms::zeroed()
        };

        Self {
            orientation: config.orientation,
            near: config.near,
            far: config.far,
            rotate_to_camera: rotate_to_camera(config.orientation),
            fixed,
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn build(&self, sample: &CameraSample, viewport: Vec2) -> PointCloudUniforms {
        let view = sample.view_matrix(self.orientation);
        let projection = sample.projection_matrix(self.orientation, viewport, self.near, self.far);

        PointCloudUniforms {
            view_projection: (projection * view).to_cols_array_2d(),
            local_to_world: (view.inverse() * self.rotate_to_camera).to_cols_array_2d(),
            camera_intrinsics_inversed: mat3_columns(sample.intrinsics.inverse()),
            ..self.fixed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthcloud_session::intrinsics_from_fov;
    use glam::{UVec2, Vec3};
    use std::mem::{offset_of, size_of};

    fn sample() -> CameraSample {
        let resolution = UVec2::new(1920, 1440);
        CameraSample {
            timestamp: 2.0,
            intrinsics: intrinsics_from_fov(65f32.to_radians(), resolution),
            transform: Mat4::from_translation(Vec3::new(0.3, 1.2, 0.8)) * Mat4::from_rotation_y(0.7),
            image_resolution: resolution,
        }
    }

    const VIEWPORT: Vec2 = Vec2::new(390.0, 844.0);

    #[test]
    fn test_layout_matches_wgsl() {
        assert_eq!(size_of::<PointCloudUniforms>(), 272);
        assert_eq!(offset_of!(PointCloudUniforms, local_to_world), 64);
        assert_eq!(offset_of!(PointCloudUniforms, model_transform), 128);
        assert_eq!(offset_of!(PointCloudUniforms, camera_intrinsics_inversed), 192);
        assert_eq!(offset_of!(PointCloudUniforms, model_position), 240);
        assert_eq!(offset_of!(PointCloudUniforms, particle_size), 252);
        assert_eq!(offset_of!(PointCloudUniforms, camera_resolution), 256);
        assert_eq!(offset_of!(PointCloudUniforms, max_points), 264);
        assert_eq!(offset_of!(PointCloudUniforms, confidence_threshold), 268);
    }

    #[test]
    fn test_build_is_bit_identical() {
        let builder = FrameUniformBuilder::new(&PointCloudConfig::default());
        let first = builder.build(&sample(), VIEWPORT);
        let second = builder.build(&sample(), VIEWPORT);
        assert_eq!(bytemuck::bytes_of(&first), bytemuck::bytes_of(&second));

        // A different frame in between leaves nothing behind.
        let mut other = sample();
        other.transform = Mat4::IDENTITY;
        let _ = builder.build(&other, Vec2::new(100.0, 100.0));
        let third = builder.build(&sample(), VIEWPORT);
        assert_eq!(bytemuck::bytes_of(&first), bytemuck::bytes_of(&third));
    }

    #[test]
    fn test_fixed_fields() {
        let config = PointCloudConfig::default();
        let uniforms = FrameUniformBuilder::new(&config).build(&sample(), VIEWPORT);
        assert_eq!(uniforms.max_points, 500_000);
        assert_eq!(uniforms.confidence_threshold, 1);
        assert_eq!(uniforms.particle_size, 10.0);
        assert_eq!(uniforms.camera_resolution, [1920.0, 1440.0]);
        assert_eq!(uniforms.model_position, [0.0, 0.0, -1.0]);
        assert_eq!(uniforms.model_transform, Mat4::IDENTITY.to_cols_array_2d());
    }

    #[test]
    fn test_matrix_composition() {
        for orientation in Orientation::ALL {
            let config = PointCloudConfig::default().with_orientation(orientation);
            let uniforms = FrameUniformBuilder::new(&config).build(&sample(), VIEWPORT);
            let sample = sample();

            let view = sample.view_matrix(orientation);
            let projection = sample.projection_matrix(orientation, VIEWPORT, 0.001, 0.0);
            let view_projection = Mat4::from_cols_array_2d(&uniforms.view_projection);
            assert!(view_projection.abs_diff_eq(projection * view, 1e-5));

            let local_to_world = Mat4::from_cols_array_2d(&uniforms.local_to_world);
            assert!(local_to_world.abs_diff_eq(view.inverse() * rotate_to_camera(orientation), 1e-5));

            let flip_yz = Mat4::from_diagonal(Vec4::new(1.0, -1.0, -1.0, 1.0));
            assert!(local_to_world.abs_diff_eq(sample.transform * flip_yz, 1e-5));

            let kinv = Mat3::from_cols(
                Vec3::from_slice(&uniforms.camera_intrinsics_inversed[0]),
                Vec3::from_slice(&uniforms.camera_intrinsics_inversed[1]),
                Vec3::from_slice(&uniforms.camera_intrinsics_inversed[2]),
            );
            assert!((kinv * sample.intrinsics).abs_diff_eq(Mat3::IDENTITY, 1e-5));
        }
    }

    #[test]
    fn test_principal_point_unprojects_onto_optical_axis() {
        let mut sample = sample();
        sample.transform = Mat4::IDENTITY;
        let uniforms = FrameUniformBuilder::new(&PointCloudConfig::default()).build(&sample, VIEWPORT);

        let kinv = sample.intrinsics.inverse();
        let depth = 1.5;
        let local = kinv * Vec3::new(960.0, 720.0, 1.0) * depth;
        let world = Mat4::from_cols_array_2d(&uniforms.local_to_world).transform_point3(local);
        assert!(world.abs_diff_eq(Vec3::new(0.0, 0.0, -depth), 1e-5), "{world}");

        let clip = Mat4::from_cols_array_2d(&uniforms.view_projection) * world.extend(1.0);
        assert!((clip.x / clip.w).abs() < 1e-5);
        assert!((clip.y / clip.w).abs() < 1e-5);
        assert!(clip.z / clip.w > 0.0 && clip.z / clip.w <= 1.0);
    }
}
