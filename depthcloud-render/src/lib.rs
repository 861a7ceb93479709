//! Depth point cloud rendering.
//!
//! Every frame the camera's depth map is unprojected on the GPU: a fixed
//! staggered grid of image-plane samples is drawn as a point list, and the
//! vertex stage turns each sample into a world-space point using the depth
//! and the inverse camera intrinsics, coloured from the camera's YCbCr
//! planes and hidden when its depth confidence is too low.
//!
//! ```text
//! SampleGrid ──┐
//! uniforms ────┼─> UnprojectionPipeline ─> one point-list draw
//! textures ────┘        (retained until the command buffer completes)
//! ```

pub mod config;
pub mod error;
pub mod grid;
pub mod lifetime;
pub mod pipeline;
pub mod renderer;
pub mod shaders;
pub mod textures;
pub mod uniforms;

pub use config::{PointCloudConfig, SurfaceDescriptor};
pub use error::RenderError;
pub use grid::{GridLayout, SampleGrid};
pub use lifetime::{RetainedFrame, retain_until_completed};
pub use pipeline::{UnprojectionPipeline, relaxed_depth_stencil};
pub use renderer::{FramePlan, PointCloudRenderer, RenderStats, SkipReason};
pub use textures::FrameTextureSet;
pub use uniforms::{FrameUniformBuilder, PointCloudUniforms, rotate_to_camera};
