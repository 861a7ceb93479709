//! The four per-frame camera textures.

use depthcloud_gpu::Renderer;
use depthcloud_session::{DepthFrame, ImagePlane};
use tracing::trace;

pub const LUMA_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;
pub const CHROMA_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
pub const CONFIDENCE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Uint;

/// Luma, chroma, depth and confidence textures of one camera frame.
///
/// `timestamp` is the capture time of the camera sample the textures belong
/// to. The renderer only draws them against that same sample.
#[derive(Debug, Clone)]
pub struct FrameTextureSet {
    pub timestamp: f64,
    pub luma: wgpu::Texture,
    pub chroma: wgpu::Texture,
    pub depth: wgpu::Texture,
    pub confidence: wgpu::Texture,
}

impl FrameTextureSet {
    /// Upload the planes of `frame` into fresh textures.
    pub fn upload(renderer: &Renderer, frame: &DepthFrame) -> Self {
        Self {
            timestamp: frame.timestamp(),
            luma: upload_plane(renderer, "Luma", LUMA_FORMAT, &frame.luma),
            chroma: upload_plane(renderer, "Chroma", CHROMA_FORMAT, &frame.chroma),
            depth: upload_plane(renderer, "Depth", DEPTH_FORMAT, &frame.depth),
            confidence: upload_plane(renderer, "Confidence", CONFIDENCE_FORMAT, &frame.confidence),
        }
    }

    /// Views in binding order: luma, chroma, depth, confidence.
    pub fn views(&self) -> [wgpu::TextureView; 4] {
        [&self.luma, &self.chroma, &self.depth, &self.confidence]
            .map(|texture| texture.create_view(&wgpu::TextureViewDescriptor::default()))
    }
}

fn upload_plane<T: bytemuck::Pod>(
    renderer: &Renderer,
    label: &str,
    format: wgpu::TextureFormat,
    plane: &ImagePlane<T>,
) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width: plane.width(),
        height: plane.height(),
        depth_or_array_layers: 1,
    };
    let texture = renderer.device().create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    renderer.queue().write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        plane.bytes(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(plane.bytes_per_row()),
            rows_per_image: Some(plane.height()),
        },
        size,
    );

    trace!(label, width = plane.width(), height = plane.height(), ?format, "Uploaded plane");
    texture
}
