//! Keeps a frame's textures alive until the GPU is done with them.

use depthcloud_gpu::CompletionHandlers;
use tracing::trace;

use crate::textures::FrameTextureSet;

/// Everything a recorded draw reads from that the caller does not own for
/// the renderer's lifetime.
#[derive(Debug)]
pub struct RetainedFrame {
    textures: FrameTextureSet,
    _uniforms: wgpu::Buffer,
    _bind_group: wgpu::BindGroup,
}

impl Drop for RetainedFrame {
    fn drop(&mut self) {
        trace!(timestamp = self.textures.timestamp, "Released frame textures");
    }
}

/// Move `textures`, the frame's uniform buffer and the bind group pointing
/// at both into a completion handler. They are dropped when the handler
/// fires, or with the handlers if the command buffer is never committed.
pub fn retain_until_completed(
    completion: &mut CompletionHandlers,
    textures: FrameTextureSet,
    uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
) {
    completion.retain(RetainedFrame {
        textures,
        _uniforms: uniforms,
        _bind_group: bind_group,
    });
}
