//! Camera samples and the orientation-aware view/projection matrices built
//! from them.
//!
//! Camera space follows the AR convention: in the sensor's native
//! landscape-right orientation +x points right, +y up and the camera looks
//! down -z. Image pixels start at the top-left corner with +y pointing down.

use glam::{Mat3, Mat4, UVec2, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};
use std::fmt;
use std::str::FromStr;

use crate::SessionError;

/// Interface orientation the point cloud is displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::Portrait,
        Orientation::PortraitUpsideDown,
        Orientation::LandscapeLeft,
        Orientation::LandscapeRight,
    ];

    /// Rotation from the camera's native image orientation to the display,
    /// about +z.
    pub fn angle(self) -> f32 {
        match self {
            Orientation::LandscapeRight => 0.0,
            Orientation::Portrait => FRAC_PI_2,
            Orientation::LandscapeLeft => PI,
            Orientation::PortraitUpsideDown => -FRAC_PI_2,
        }
    }

    pub fn is_portrait(self) -> bool {
        matches!(
            self,
            Orientation::Portrait | Orientation::PortraitUpsideDown
        )
    }

    pub fn rotation(self) -> Mat4 {
        Mat4::from_rotation_z(self.angle())
    }

    fn as_str(self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::PortraitUpsideDown => "portrait-upside-down",
            Orientation::LandscapeLeft => "landscape-left",
            Orientation::LandscapeRight => "landscape-right",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Orientation {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Orientation::ALL
            .into_iter()
            .find(|orientation| orientation.as_str() == s)
            .ok_or_else(|| SessionError::UnknownOrientation(s.to_string()))
    }
}

/// Pose and calibration of the camera at the moment a frame was captured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSample {
    /// Capture time in seconds.
    pub timestamp: f64,
    /// Pinhole intrinsics in pixels of `image_resolution`.
    pub intrinsics: Mat3,
    /// Camera to world.
    pub transform: Mat4,
    pub image_resolution: UVec2,
}

impl CameraSample {
    pub fn resolution(&self) -> Vec2 {
        self.image_resolution.as_vec2()
    }

    /// World to camera, rotated so that +y is up on the display.
    pub fn view_matrix(&self, orientation: Orientation) -> Mat4 {
        (self.transform * orientation.rotation()).inverse()
    }

    /// Projection for the displayed camera image.
    ///
    /// The native projection follows from the intrinsics. It is rotated into
    /// the display orientation and scaled so the image fills `viewport` (the
    /// overflowing axis is cropped). A `far` of zero, or any `far <= near`,
    /// selects an infinite far plane with reversed depth: `near` maps to 1 and
    /// depth tends to 0 at infinity.
    pub fn projection_matrix(
        &self,
        orientation: Orientation,
        viewport: Vec2,
        near: f32,
        far: f32,
    ) -> Mat4 {
        let rotation = orientation.rotation();
        let display = rotation.inverse() * self.native_projection(near, far) * rotation;
        aspect_fill(self.display_aspect(orientation), viewport) * display
    }

    fn native_projection(&self, near: f32, far: f32) -> Mat4 {
        let size = self.resolution();
        let fx = self.intrinsics.x_axis.x;
        let fy = self.intrinsics.y_axis.y;
        let cx = self.intrinsics.z_axis.x;
        let cy = self.intrinsics.z_axis.y;

        let (a, b) = if far <= 0.0 || far <= near {
            (0.0, near)
        } else {
            (far / (near - far), near * far / (near - far))
        };

        Mat4::from_cols(
            Vec4::new(2.0 * fx / size.x, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 * fy / size.y, 0.0, 0.0),
            Vec4::new(1.0 - 2.0 * cx / size.x, 2.0 * cy / size.y - 1.0, a, -1.0),
            Vec4::new(0.0, 0.0, b, 0.0),
        )
    }

    fn display_aspect(&self, orientation: Orientation) -> f32 {
        let size = self.resolution();
        if orientation.is_portrait() {
            size.y / size.x
        } else {
            size.x / size.y
        }
    }
}

fn aspect_fill(image_aspect: f32, viewport: Vec2) -> Mat4 {
    if viewport.x <= 0.0 || viewport.y <= 0.0 {
        return Mat4::IDENTITY;
    }
    let viewport_aspect = viewport.x / viewport.y;
    let scale = if viewport_aspect > image_aspect {
        Vec3::new(1.0, viewport_aspect / image_aspect, 1.0)
    } else {
        Vec3::new(image_aspect / viewport_aspect, 1.0, 1.0)
    };
    Mat4::from_scale(scale)
}

/// Pinhole intrinsics with square pixels and the principal point at the image
/// centre.
pub fn intrinsics_from_fov(horizontal_fov: f32, resolution: UVec2) -> Mat3 {
    let size = resolution.as_vec2();
    let focal = 0.5 * size.x / (0.5 * horizontal_fov).tan();
    Mat3::from_cols(
        Vec3::new(focal, 0.0, 0.0),
        Vec3::new(0.0, focal, 0.0),
        Vec3::new(0.5 * size.x, 0.5 * size.y, 1.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CameraSample {
        let resolution = UVec2::new(1920, 1440);
        CameraSample {
            timestamp: 0.0,
            intrinsics: intrinsics_from_fov(60f32.to_radians(), resolution),
            transform: Mat4::IDENTITY,
            image_resolution: resolution,
        }
    }

    fn project(sample: &CameraSample, orientation: Orientation, world: Vec3, far: f32) -> Vec3 {
        let viewport = Vec2::new(390.0, 844.0);
        let view_projection = sample.projection_matrix(orientation, viewport, 0.001, far)
            * sample.view_matrix(orientation);
        view_projection.project_point3(world)
    }

    #[test]
    fn test_orientation_parse_and_display() {
        for orientation in Orientation::ALL {
            let parsed: Orientation = orientation.to_string().parse().expect("parse");
            assert_eq!(parsed, orientation);
        }
        assert!(matches!(
            "sideways".parse::<Orientation>(),
            Err(SessionError::UnknownOrientation(_))
        ));
        assert_eq!(Orientation::default(), Orientation::Portrait);
    }

    #[test]
    fn test_optical_axis_projects_to_centre() {
        let sample = sample();
        for orientation in Orientation::ALL {
            let ndc = project(&sample, orientation, Vec3::new(0.0, 0.0, -2.0), 0.0);
            assert!(ndc.x.abs() < 1e-5, "{orientation}: {ndc}");
            assert!(ndc.y.abs() < 1e-5, "{orientation}: {ndc}");
        }
    }

    #[test]
    fn test_portrait_rotates_image_right_to_display_bottom() {
        let sample = sample();
        // +x in camera space is the right edge of the native image.
        let ndc = project(&sample, Orientation::Portrait, Vec3::new(0.5, 0.0, -2.0), 0.0);
        assert!(ndc.x.abs() < 1e-5);
        assert!(ndc.y < 0.0);

        let landscape = project(&sample, Orientation::LandscapeRight, Vec3::new(0.5, 0.0, -2.0), 0.0);
        assert!(landscape.x > 0.0);
        assert!(landscape.y.abs() < 1e-5);
    }

    #[test]
    fn test_reversed_infinite_depth() {
        let sample = sample();
        let at_near = project(&sample, Orientation::Portrait, Vec3::new(0.0, 0.0, -0.001), 0.0);
        assert!((at_near.z - 1.0).abs() < 1e-4);

        let near = project(&sample, Orientation::Portrait, Vec3::new(0.0, 0.0, -1.0), 0.0);
        let far = project(&sample, Orientation::Portrait, Vec3::new(0.0, 0.0, -100.0), 0.0);
        assert!(near.z > far.z);
        assert!(far.z > 0.0);
    }

    #[test]
    fn test_finite_depth_range() {
        let sample = sample();
        let proj = sample.projection_matrix(Orientation::LandscapeRight, Vec2::new(1920.0, 1440.0), 0.1, 10.0);
        let near = proj.project_point3(Vec3::new(0.0, 0.0, -0.1));
        let far = proj.project_point3(Vec3::new(0.0, 0.0, -10.0));
        assert!(near.z.abs() < 1e-5);
        assert!((far.z - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_aspect_fill_crops_overflowing_axis() {
        let sample = sample();
        // Landscape viewport with the image aspect: no scaling beyond the intrinsics.
        let matched = sample.projection_matrix(Orientation::LandscapeRight, Vec2::new(1920.0, 1440.0), 0.001, 0.0);
        // Wider viewport: the image is stretched vertically and cropped.
        let wide = sample.projection_matrix(Orientation::LandscapeRight, Vec2::new(2560.0, 1440.0), 0.001, 0.0);
        assert!((matched.x_axis.x - wide.x_axis.x).abs() < 1e-6);
        assert!(wide.y_axis.y > matched.y_axis.y);
    }

    #[test]
    fn test_image_corner_projects_to_viewport_corner_when_aspects_match() {
        let sample = sample();
        let proj = sample.projection_matrix(Orientation::LandscapeRight, Vec2::new(1920.0, 1440.0), 0.001, 0.0);
        // Top-right pixel corner, 1 m in front of the camera.
        let ray = sample.intrinsics.inverse() * Vec3::new(1920.0, 0.0, 1.0);
        let camera = Vec3::new(ray.x, -ray.y, -ray.z);
        let ndc = proj.project_point3(camera);
        assert!((ndc.x - 1.0).abs() < 1e-4, "{ndc}");
        assert!((ndc.y - 1.0).abs() < 1e-4, "{ndc}");
    }

    #[test]
    fn test_view_matrix_inverts_oriented_transform() {
        let mut sample = sample();
        sample.transform = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)) * Mat4::from_rotation_y(0.4);
        for orientation in Orientation::ALL {
            let view = sample.view_matrix(orientation);
            let round_trip = view * sample.transform * orientation.rotation();
            assert!(round_trip.abs_diff_eq(Mat4::IDENTITY, 1e-5));
        }
    }

    #[test]
    fn test_intrinsics_from_fov() {
        let k = intrinsics_from_fov(90f32.to_radians(), UVec2::new(200, 100));
        assert!((k.x_axis.x - 100.0).abs() < 1e-3);
        assert_eq!(k.z_axis, Vec3::new(100.0, 50.0, 1.0));
    }
}
