//! Offscreen colour/depth target and PNG readback.

use depthcloud_gpu::{CommandBuffer, CompletionHandlers, Renderer};
use depthcloud_render::SurfaceDescriptor;
use std::time::{Duration, Instant};
use tracing::debug;

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const READBACK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ReadbackError {
    #[error("Failed to map readback buffer: {0}")]
    Map(#[from] wgpu::BufferAsyncError),
    #[error("Timed out waiting for readback")]
    Timeout,
    #[error("Readback produced {0} bytes, too few for the target")]
    ShortImage(usize),
}

/// Render target standing in for a window's drawable.
pub struct OffscreenTarget {
    width: u32,
    height: u32,
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
}

impl OffscreenTarget {
    pub fn new(renderer: &Renderer, width: u32, height: u32) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = |label, format, usage| {
            renderer.device().create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            })
        };

        let color = texture(
            "Offscreen Color",
            COLOR_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );
        let depth = texture(
            "Offscreen Depth",
            DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );

        Self {
            width,
            height,
            color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
            depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
            color,
        }
    }

    pub fn surface(&self) -> SurfaceDescriptor {
        SurfaceDescriptor {
            color_format: COLOR_FORMAT,
            depth_format: Some(DEPTH_FORMAT),
            width: self.width,
            height: self.height,
        }
    }

    /// Begin a pass clearing both attachments.
    pub fn begin_pass<'a>(
        &self,
        commands: &'a mut CommandBuffer,
    ) -> (wgpu::RenderPass<'a>, &'a mut CompletionHandlers) {
        commands.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Point Cloud Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: 0.02,
                        g: 0.02,
                        b: 0.025,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(0.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        })
    }

    /// Copy the colour attachment back to the CPU.
    pub fn read_rgba(&self, renderer: &Renderer) -> Result<image::RgbaImage, ReadbackError> {
        let device = renderer.device();
        let unpadded_row = self.width * 4;
        let padded_row = unpadded_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: padded_row as u64 * self.height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(self.height),
                },
            },
            self.color.size(),
        );
        renderer.queue().submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        let start = Instant::now();
        loop {
            let _ = device.poll(wgpu::PollType::Poll);
            if let Ok(result) = receiver.try_recv() {
                result?;
                break;
            }
            if start.elapsed() > READBACK_TIMEOUT {
                return Err(ReadbackError::Timeout);
            }
            std::thread::sleep(Duration::from_millis(1));
        }

        let mapped = slice.get_mapped_range();
        let pixels = unpad_rows(&mapped, padded_row as usize, unpadded_row as usize, self.height as usize);
        drop(mapped);
        staging.unmap();

        debug!(width = self.width, height = self.height, "Read back colour target");
        let len = pixels.len();
        image::RgbaImage::from_raw(self.width, self.height, pixels)
            .ok_or(ReadbackError::ShortImage(len))
    }
}

fn unpad_rows(padded: &[u8], padded_row: usize, row: usize, rows: usize) -> Vec<u8> {
    padded
        .chunks(padded_row)
        .take(rows)
        .flat_map(|chunk| &chunk[..row.min(chunk.len())])
        .copied()
        .collect()
}
