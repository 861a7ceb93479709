//! Renderer configuration.

use depthcloud_session::Orientation;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::RenderError;

/// Tunables of the point cloud renderer.
///
/// Missing fields fall back to [`PointCloudConfig::default`] when loaded
/// from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointCloudConfig {
    /// Nominal number of grid samples; the grid rounds this to whole rows.
    pub grid_points: u32,
    /// Vertex indices at or past this are hidden.
    pub max_points: u32,
    /// Point size in pixels.
    pub particle_size: f32,
    /// Minimum confidence (0 low, 1 medium, 2 high) a sample needs to be drawn.
    pub confidence_threshold: i32,
    pub orientation: Orientation,
    pub near: f32,
    /// Zero selects an infinite far plane.
    pub far: f32,
    pub model_position: [f32; 3],
    /// Camera image resolution the grid is laid out over.
    pub camera_resolution: [u32; 2],
    pub max_in_flight: usize,
    pub in_flight_timeout_ms: u64,
}

impl Default for PointCloudConfig {
    fn default() -> Self {
        Self {
            grid_points: 50_000,
            max_points: 500_000,
            particle_size: 10.0,
            confidence_threshold: 1,
            orientation: Orientation::Portrait,
            near: 0.001,
            far: 0.0,
            model_position: [0.0, 0.0, -1.0],
            camera_resolution: [1920, 1440],
            max_in_flight: 1,
            in_flight_timeout_ms: 5_000,
        }
    }
}

impl PointCloudConfig {
    pub fn with_grid_points(mut self, grid_points: u32) -> Self {
        self.grid_points = grid_points;
        self
    }

    pub fn with_max_points(mut self, max_points: u32) -> Self {
        self.max_points = max_points;
        self
    }

    pub fn with_particle_size(mut self, size: f32) -> Self {
        self.particle_size = size;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: i32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_camera_resolution(mut self, width: u32, height: u32) -> Self {
        self.camera_resolution = [width, height];
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    pub fn model_position(&self) -> Vec3 {
        Vec3::from(self.model_position)
    }

    pub fn in_flight_timeout(&self) -> Duration {
        Duration::from_millis(self.in_flight_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        let [width, height] = self.camera_resolution;
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidConfig(format!(
                "camera resolution must be non-zero, got {width}x{height}"
            )));
        }
        if self.grid_points == 0 {
            return Err(RenderError::InvalidConfig(
                "grid_points must be at least 1".into(),
            ));
        }
        if self.near.is_nan() || self.near <= 0.0 {
            return Err(RenderError::InvalidConfig(format!(
                "near plane must be positive, got {}",
                self.near
            )));
        }
        if self.particle_size.is_nan() || self.particle_size <= 0.0 {
            return Err(RenderError::InvalidConfig(format!(
                "particle_size must be positive, got {}",
                self.particle_size
            )));
        }
        if self.max_in_flight == 0 {
            return Err(RenderError::InvalidConfig(
                "max_in_flight must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Formats and initial size of the surface the point cloud is drawn into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceDescriptor {
    pub color_format: wgpu::TextureFormat,
    /// `None` when the surface has no depth attachment.
    pub depth_format: Option<wgpu::TextureFormat>,
    pub width: u32,
    pub height: u32,
}
