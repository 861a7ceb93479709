use depthcloud_gpu::{BindGroupBuildError, BufferBuildError, InFlightError, PipelineBuildError};

/// Errors raised while setting up or driving the point cloud renderer.
///
/// Everything except [`RenderError::InFlight`] comes from construction and is
/// fatal for the renderer.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to allocate the sample grid: {0}")]
    GridAllocation(#[source] BufferBuildError),
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferBuildError),
    #[error("Bind group layout error: {0}")]
    BindGroupLayout(#[from] BindGroupBuildError),
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineBuildError),
    #[error("In-flight limit error: {0}")]
    InFlight(#[from] InFlightError),
}
