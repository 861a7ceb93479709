//! GPU plumbing shared by the depthcloud crates.
//!
//! - [`Renderer`]: adapter/device bring-up and access to the device and queue
//! - [`BufferBuilder`], [`BindGroupLayoutBuilder`], [`RenderPipelineBuilder`]: resource builders
//! - [`ShaderLibrary`]: WGSL modules whose entry points are looked up by name
//! - [`CommandBuffer`]: a command encoder with one-shot completion handlers
//! - [`InFlightLimiter`]: bounds the number of submitted, unfinished frames

pub mod builder;
pub mod command;
pub mod in_flight;
pub mod pipeline;
pub mod shader;

pub use builder::{
    BindGroupBuildError, BindGroupLayoutBuilder, BindingType, BufferBuildError, BufferBuilder,
    BufferUsage, ShaderStage,
};
pub use command::{CommandBuffer, CompletionHandlers};
pub use in_flight::{InFlightError, InFlightLimiter, InFlightSlot};
pub use pipeline::{PipelineBuildError, RenderPipelineBuilder};
pub use shader::{EntryPoint, ShaderFunction, ShaderLibrary, ShaderStageKind};

pub use wgpu;

use tracing::{info, instrument};

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("Request Adapter Error: {0}")]
    RequestAdapterError(#[from] wgpu::RequestAdapterError),
    #[error("Request Device Error: {0}")]
    RequestDeviceError(#[from] wgpu::RequestDeviceError),
}

/// Device and queue used to create resources and submit work.
///
/// Both handles are reference counted by wgpu, so cloning a `Renderer` is cheap
/// and every clone talks to the same device.
#[derive(Clone, Debug)]
pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl Renderer {
    /// Request a headless adapter and device.
    #[instrument(level = "info", skip_all)]
    pub async fn new() -> Result<Self, RendererError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::from_env_or_default());

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                ..Default::default()
            })
            .await?;

        let adapter_info = adapter.get_info();
        info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            "Selected GPU adapter"
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("depthcloud device"),
                ..Default::default()
            })
            .await?;

        Ok(Self { device, queue })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Start building a buffer on this device.
    pub fn create_buffer(&self) -> BufferBuilder<'_> {
        BufferBuilder::new(&self.device)
    }

    /// Start building a bind group layout on this device.
    pub fn create_bind_group_layout(&self) -> BindGroupLayoutBuilder<'_> {
        BindGroupLayoutBuilder::new(&self.device)
    }

    /// Create a command buffer whose completion handlers run after `commit`.
    pub fn create_command_buffer(&self, label: impl Into<String>) -> CommandBuffer {
        CommandBuffer::new(&self.device, label)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use pollster::FutureExt;

    /// Device for GPU-backed tests, or `None` on machines without an adapter.
    pub fn test_device() -> Option<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::from_env_or_default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .block_on()
            .ok()?;
        adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .block_on()
            .ok()
    }
}
