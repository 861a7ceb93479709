//! Deterministic stand-in for a depth-sensing AR session.
//!
//! The camera orbits a small scene (a checkered floor and two spheres) and
//! every frame is ray cast on the CPU into the same planes a LiDAR-equipped
//! session delivers: full-range YCbCr colour, metric depth and a confidence
//! map.

use glam::{Mat3, Mat4, UVec2, Vec3};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, instrument};

use crate::SessionError;
use crate::camera::{CameraSample, Orientation, intrinsics_from_fov};
use crate::session::{CameraSession, DepthFrame, ImagePlane};

/// Depth readings past this distance are reported as missing.
const MAX_DEPTH: f32 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Resolution the intrinsics refer to.
    pub camera_resolution: [u32; 2],
    pub depth_resolution: [u32; 2],
    /// Luma resolution. Chroma is half of it in each axis.
    pub color_resolution: [u32; 2],
    pub horizontal_fov_degrees: f32,
    pub frame_interval: f64,
    pub orbit_radius: f32,
    pub orbit_height: f32,
    /// Radians per second.
    pub orbit_speed: f32,
    pub orientation: Orientation,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            camera_resolution: [1920, 1440],
            depth_resolution: [256, 192],
            color_resolution: [480, 360],
            horizontal_fov_degrees: 65.0,
            frame_interval: 1.0 / 60.0,
            orbit_radius: 1.6,
            orbit_height: 1.1,
            orbit_speed: 0.5,
            orientation: Orientation::Portrait,
        }
    }
}

impl SyntheticConfig {
    pub fn with_camera_resolution(mut self, width: u32, height: u32) -> Self {
        self.camera_resolution = [width, height];
        self.color_resolution = [(width / 4).max(2), (height / 4).max(2)];
        self
    }

    pub fn with_depth_resolution(mut self, width: u32, height: u32) -> Self {
        self.depth_resolution = [width, height];
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    fn validate(&self) -> Result<(), SessionError> {
        for [width, height] in [
            self.camera_resolution,
            self.depth_resolution,
            self.color_resolution,
        ] {
            if width == 0 || height == 0 {
                return Err(SessionError::InvalidDimensions { width, height });
            }
        }
        let [width, height] = self.color_resolution;
        if width < 2 || height < 2 {
            return Err(SessionError::InvalidDimensions { width, height });
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SyntheticState {
    frame_index: u64,
    latest: Option<Arc<DepthFrame>>,
}

/// Session producing ray cast frames on demand.
///
/// [`SyntheticSession::advance`] captures the next frame and makes it the
/// session's current one.
#[derive(Debug)]
pub struct SyntheticSession {
    config: SyntheticConfig,
    intrinsics: Mat3,
    state: Mutex<SyntheticState>,
}

impl SyntheticSession {
    pub fn new(config: SyntheticConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let intrinsics = intrinsics_from_fov(
            config.horizontal_fov_degrees.to_radians(),
            UVec2::from(config.camera_resolution),
        );
        Ok(Self {
            config,
            intrinsics,
            state: Mutex::new(SyntheticState::default()),
        })
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Capture the next frame.
    pub fn advance(&self) -> Result<Arc<DepthFrame>, SessionError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let frame = Arc::new(self.capture(state.frame_index)?);
        state.frame_index += 1;
        state.latest = Some(Arc::clone(&frame));
        Ok(frame)
    }

    /// The frame returned by the last [`SyntheticSession::advance`].
    pub fn latest(&self) -> Option<Arc<DepthFrame>> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .latest
            .clone()
    }

    /// Camera sample of frame `index`.
    pub fn sample_at(&self, index: u64) -> CameraSample {
        let timestamp = index as f64 * self.config.frame_interval;
        let angle = self.config.orbit_speed * timestamp as f32;
        let target = Vec3::new(0.0, 0.3, 0.0);
        let eye = target
            + Vec3::new(
                self.config.orbit_radius * angle.sin(),
                self.config.orbit_height,
                self.config.orbit_radius * angle.cos(),
            );

        // The display frame looks at the target upright; the sensor frame is
        // rotated back from it by the interface orientation.
        let display_to_world = Mat4::look_at_rh(eye, target, Vec3::Y).inverse();
        let transform = display_to_world * Mat4::from_rotation_z(-self.config.orientation.angle());

        CameraSample {
            timestamp,
            intrinsics: self.intrinsics,
            transform,
            image_resolution: UVec2::from(self.config.camera_resolution),
        }
    }

    /// Ray cast frame `index`.
    #[instrument(level = "debug", skip(self))]
    pub fn capture(&self, index: u64) -> Result<DepthFrame, SessionError> {
        let sample = self.sample_at(index);
        let caster = RayCaster::new(&sample);

        let [depth_width, depth_height] = self.config.depth_resolution;
        let mut depth = Vec::with_capacity((depth_width * depth_height) as usize);
        let mut confidence = Vec::with_capacity(depth.capacity());
        for y in 0..depth_height {
            for x in 0..depth_width {
                let hit = caster.cast(x, y, self.config.depth_resolution);
                match hit {
                    Some(hit) if hit.depth <= MAX_DEPTH => {
                        depth.push(hit.depth);
                        confidence.push(hit.confidence());
                    }
                    _ => {
                        depth.push(0.0);
                        confidence.push(0);
                    }
                }
            }
        }

        let [luma_width, luma_height] = self.config.color_resolution;
        let mut luma = Vec::with_capacity((luma_width * luma_height) as usize);
        for y in 0..luma_height {
            for x in 0..luma_width {
                let color = caster.shade(caster.cast(x, y, self.config.color_resolution));
                luma.push(to_ycbcr(color)[0]);
            }
        }

        let chroma_resolution = [luma_width / 2, luma_height / 2];
        let mut chroma = Vec::with_capacity((chroma_resolution[0] * chroma_resolution[1] * 2) as usize);
        for y in 0..chroma_resolution[1] {
            for x in 0..chroma_resolution[0] {
                let color = caster.shade(caster.cast(x, y, chroma_resolution));
                let [_, cb, cr] = to_ycbcr(color);
                chroma.extend_from_slice(&[cb, cr]);
            }
        }

        debug!(index, timestamp = sample.timestamp, "Captured synthetic frame");

        DepthFrame::new(
            sample,
            ImagePlane::new(luma_width, luma_height, 1, luma)?,
            ImagePlane::new(chroma_resolution[0], chroma_resolution[1], 2, chroma)?,
            ImagePlane::new(depth_width, depth_height, 1, depth)?,
            ImagePlane::new(depth_width, depth_height, 1, confidence)?,
        )
    }
}

impl CameraSession for SyntheticSession {
    fn current_frame(&self) -> Option<CameraSample> {
        self.latest().map(|frame| frame.sample)
    }
}

#[derive(Debug, Clone, Copy)]
enum Surface {
    Floor { checker: bool },
    Sphere { albedo: Vec3 },
}

#[derive(Debug, Clone, Copy)]
struct Hit {
    /// Distance along the optical axis.
    depth: f32,
    /// Cosine between the surface normal and the reversed ray.
    facing: f32,
    surface: Surface,
}

impl Hit {
    fn confidence(&self) -> u8 {
        if self.depth < 2.5 && self.facing > 0.5 {
            2
        } else if self.depth < 4.0 {
            1
        } else {
            0
        }
    }
}

struct Sphere {
    center: Vec3,
    radius: f32,
    albedo: Vec3,
}

const SPHERES: [Sphere; 2] = [
    Sphere {
        center: Vec3::new(0.0, 0.35, 0.0),
        radius: 0.35,
        albedo: Vec3::new(0.85, 0.3, 0.2),
    },
    Sphere {
        center: Vec3::new(0.65, 0.2, 0.35),
        radius: 0.2,
        albedo: Vec3::new(0.2, 0.55, 0.9),
    },
];

const LIGHT_DIRECTION: Vec3 = Vec3::new(0.37139067, 0.74278134, 0.55708601);

struct RayCaster {
    inverse_intrinsics: Mat3,
    origin: Vec3,
    camera_to_world: Mat4,
    resolution: glam::Vec2,
}

impl RayCaster {
    fn new(sample: &CameraSample) -> Self {
        Self {
            inverse_intrinsics: sample.intrinsics.inverse(),
            origin: sample.transform.w_axis.truncate(),
            camera_to_world: sample.transform,
            resolution: sample.resolution(),
        }
    }

    /// Cast through the centre of pixel (x, y) of an image of size `grid`
    /// covering the camera image.
    fn cast(&self, x: u32, y: u32, grid: [u32; 2]) -> Option<Hit> {
        let pixel = glam::Vec2::new(
            (x as f32 + 0.5) * self.resolution.x / grid[0] as f32,
            (y as f32 + 0.5) * self.resolution.y / grid[1] as f32,
        );
        // z = 1 in image space, so the ray parameter is the optical-axis depth.
        let image_ray = self.inverse_intrinsics * pixel.extend(1.0);
        let camera_ray = Vec3::new(image_ray.x, -image_ray.y, -image_ray.z);
        let direction = self.camera_to_world.transform_vector3(camera_ray);
        self.intersect(direction)
    }

    fn intersect(&self, direction: Vec3) -> Option<Hit> {
        let unit = direction.normalize_or_zero();
        let mut best: Option<Hit> = None;
        let mut consider = |t: f32, normal: Vec3, surface: Surface| {
            if t <= 0.0 || best.is_some_and(|hit| hit.depth <= t) {
                return;
            }
            best = Some(Hit {
                depth: t,
                facing: normal.dot(-unit),
                surface,
            });
        };

        if direction.y < 0.0 {
            let t = -self.origin.y / direction.y;
            let point = self.origin + direction * t;
            let checker = ((point.x * 2.0).floor() + (point.z * 2.0).floor()) as i32 % 2 == 0;
            consider(t, Vec3::Y, Surface::Floor { checker });
        }

        for sphere in &SPHERES {
            let offset = self.origin - sphere.center;
            let a = direction.length_squared();
            let b = offset.dot(direction);
            let c = offset.length_squared() - sphere.radius * sphere.radius;
            let discriminant = b * b - a * c;
            if discriminant < 0.0 {
                continue;
            }
            let t = (-b - discriminant.sqrt()) / a;
            let normal = (self.origin + direction * t - sphere.center) / sphere.radius;
            consider(t, normal, Surface::Sphere { albedo: sphere.albedo });
        }

        best
    }

    fn shade(&self, hit: Option<Hit>) -> Vec3 {
        let Some(hit) = hit else {
            return Vec3::new(0.55, 0.7, 0.9);
        };
        let albedo = match hit.surface {
            Surface::Floor { checker: true } => Vec3::splat(0.8),
            Surface::Floor { checker: false } => Vec3::splat(0.35),
            Surface::Sphere { albedo } => albedo,
        };
        let lambert = match hit.surface {
            Surface::Floor { .. } => LIGHT_DIRECTION.y,
            Surface::Sphere { .. } => 0.5 + 0.5 * hit.facing,
        };
        let fog = (hit.depth / MAX_DEPTH).clamp(0.0, 1.0);
        (albedo * (0.25 + 0.75 * lambert)).lerp(Vec3::splat(0.6), fog * 0.5)
    }
}

/// Full-range BT.601.
fn to_ycbcr(rgb: Vec3) -> [u8; 3] {
    let rgb = rgb.clamp(Vec3::ZERO, Vec3::ONE);
    let y = 0.299 * rgb.x + 0.587 * rgb.y + 0.114 * rgb.z;
    let cb = 0.5 + (rgb.z - y) / 1.772;
    let cr = 0.5 + (rgb.x - y) / 1.402;
    [y, cb, cr].map(|channel| (channel * 255.0).round().clamp(0.0, 255.0) as u8)
}
