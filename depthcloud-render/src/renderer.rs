//! Per-frame driver of the point cloud draw.

use depthcloud_gpu::{CommandBuffer, CompletionHandlers, InFlightLimiter, Renderer, ShaderLibrary};
use depthcloud_session::{CameraSample, CameraSession};
use glam::{UVec2, Vec2};
use tracing::{debug, info, instrument, trace, warn};
use wgpu::util::DeviceExt;

use crate::grid::{GridLayout, SampleGrid};
use crate::lifetime::retain_until_completed;
use crate::pipeline::UnprojectionPipeline;
use crate::textures::FrameTextureSet;
use crate::uniforms::FrameUniformBuilder;
use crate::{PointCloudConfig, RenderError, SurfaceDescriptor};

/// Counters kept by [`PointCloudRenderer::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub frames_drawn: u64,
    /// Frames with no current camera sample, or whose textures belong to a
    /// different sample.
    pub frames_skipped: u64,
    pub points_per_draw: u32,
}

/// Why a frame records nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    NoFrame,
    StaleTextures { sample: f64, textures: f64 },
    ResolutionMismatch { sample: UVec2, grid: [u32; 2] },
}

/// What [`PointCloudRenderer::update`] records for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FramePlan {
    Skip(SkipReason),
    Draw {
        sample: CameraSample,
        vertex_count: u32,
    },
}

impl FramePlan {
    /// Draw only when there is a current sample, the textures were captured
    /// with it and its resolution is the one the grid covers.
    pub fn decide(sample: Option<CameraSample>, textures_timestamp: f64, grid: &GridLayout) -> Self {
        let Some(sample) = sample else {
            return Self::Skip(SkipReason::NoFrame);
        };
        if sample.timestamp != textures_timestamp {
            return Self::Skip(SkipReason::StaleTextures {
                sample: sample.timestamp,
                textures: textures_timestamp,
            });
        }
        if sample.image_resolution.to_array() != grid.resolution() {
            return Self::Skip(SkipReason::ResolutionMismatch {
                sample: sample.image_resolution,
                grid: grid.resolution(),
            });
        }
        Self::Draw {
            sample,
            vertex_count: grid.len(),
        }
    }
}

/// The session's resolution wins over the configured one when the session
/// already has a frame.
fn resolve_camera_resolution(config: PointCloudConfig, sample: Option<CameraSample>) -> PointCloudConfig {
    match sample {
        Some(sample) if sample.image_resolution.to_array() != config.camera_resolution => {
            info!(
                configured = ?config.camera_resolution,
                session = ?sample.image_resolution,
                "Laying the sample grid out over the session's camera resolution"
            );
            config.with_camera_resolution(sample.image_resolution.x, sample.image_resolution.y)
        }
        _ => config,
    }
}

/// Draws the depth point cloud of the session's current camera frame.
pub struct PointCloudRenderer<S> {
    renderer: Renderer,
    session: S,
    config: PointCloudConfig,
    grid: SampleGrid,
    pipeline: UnprojectionPipeline,
    uniform_builder: FrameUniformBuilder,
    viewport: Vec2,
    limiter: InFlightLimiter,
    stats: RenderStats,
    warned_resolution: bool,
}

impl<S: CameraSession> PointCloudRenderer<S> {
    /// Build the renderer with the built-in shaders.
    pub fn new(
        renderer: &Renderer,
        session: S,
        surface: &SurfaceDescriptor,
        config: PointCloudConfig,
    ) -> Result<Self, RenderError> {
        let library = UnprojectionPipeline::library(renderer)?;
        Self::with_library(renderer, session, surface, config, &library)
    }

    /// Build the renderer, looking the unprojection functions up in `library`.
    #[instrument(level = "info", skip_all)]
    pub fn with_library(
        renderer: &Renderer,
        session: S,
        surface: &SurfaceDescriptor,
        config: PointCloudConfig,
        library: &ShaderLibrary,
    ) -> Result<Self, RenderError> {
        let config = resolve_camera_resolution(config, session.current_frame());
        config.validate()?;

        let grid = SampleGrid::new(
            renderer,
            GridLayout::new(config.camera_resolution, config.grid_points)?,
        )?;
        let pipeline = UnprojectionPipeline::new(renderer, library, surface)?;

        let limiter =
            InFlightLimiter::new(config.max_in_flight).with_timeout(config.in_flight_timeout());

        info!(
            points = grid.len(),
            orientation = %config.orientation,
            max_in_flight = limiter.max(),
            "Point cloud renderer ready"
        );

        Ok(Self {
            renderer: renderer.clone(),
            session,
            uniform_builder: FrameUniformBuilder::new(&config),
            config,
            grid,
            pipeline,
            viewport: Vec2::new(surface.width as f32, surface.height as f32),
            limiter,
            stats: RenderStats::default(),
            warned_resolution: false,
        })
    }

    pub fn config(&self) -> &PointCloudConfig {
        &self.config
    }

    pub fn grid(&self) -> &SampleGrid {
        &self.grid
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    pub fn in_flight(&self) -> &InFlightLimiter {
        &self.limiter
    }

    /// Command buffer for the next frame.
    ///
    /// Blocks (polling the device) while the maximum number of frames is in
    /// flight. The slot is released when the returned buffer's work completes.
    pub fn begin_frame(&self, label: impl Into<String>) -> Result<CommandBuffer, RenderError> {
        let slot = self.limiter.acquire(self.renderer.device())?;
        let mut commands = self.renderer.create_command_buffer(label);
        commands.completion().retain(slot);
        Ok(commands)
    }

    /// New viewport size, used by the projection of later frames.
    pub fn drawable_resized(&mut self, width: u32, height: u32) {
        debug!(width, height, "Drawable resized");
        self.viewport = Vec2::new(width as f32, height as f32);
    }

    /// Record the point cloud draw into `pass` and end it.
    ///
    /// Does nothing but end the pass when the session has no current frame or
    /// `textures` were captured with a different sample than the current one.
    /// Otherwise the frame's uniforms and `textures` are retained in
    /// `completion` until the command buffer finishes.
    #[instrument(level = "trace", skip_all)]
    pub fn update(
        &mut self,
        completion: &mut CompletionHandlers,
        mut pass: wgpu::RenderPass<'_>,
        textures: FrameTextureSet,
    ) {
        let plan = FramePlan::decide(
            self.session.current_frame(),
            textures.timestamp,
            self.grid.layout(),
        );
        let (sample, vertex_count) = match plan {
            FramePlan::Draw {
                sample,
                vertex_count,
            } => (sample, vertex_count),
            FramePlan::Skip(reason) => {
                self.log_skip(reason);
                self.stats.frames_skipped += 1;
                return;
            }
        };

        // One buffer per frame; its bytes are fixed when the draw is recorded.
        let uniforms = self.uniform_builder.build(&sample, self.viewport);
        let uniform_buffer =
            self.renderer
                .device()
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Point Cloud Uniforms"),
                    contents: bytemuck::bytes_of(&uniforms),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
        let bind_group =
            self.pipeline
                .frame_bind_group(self.renderer.device(), &uniform_buffer, &textures);

        pass.set_pipeline(self.pipeline.pipeline());
        pass.set_bind_group(0, &bind_group, &[]);
        pass.set_vertex_buffer(0, self.grid.buffer().slice(..));
        pass.draw(0..vertex_count, 0..1);
        drop(pass);

        retain_until_completed(completion, textures, uniform_buffer, bind_group);

        self.stats.frames_drawn += 1;
        self.stats.points_per_draw = vertex_count;
        trace!(timestamp = sample.timestamp, points = vertex_count, "Drew point cloud");
    }

    fn log_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::NoFrame => trace!("No camera frame yet"),
            SkipReason::StaleTextures { sample, textures } => debug!(
                sample,
                textures, "Textures do not belong to the current camera frame"
            ),
            SkipReason::ResolutionMismatch { sample, grid } => {
                if !self.warned_resolution {
                    warn!(
                        sample = ?sample,
                        grid = ?grid,
                        "Camera resolution differs from the sample grid"
                    );
                    self.warned_resolution = true;
                }
            }
        }
    }
}
