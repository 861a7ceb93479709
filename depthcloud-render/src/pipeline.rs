//! The unprojection render pipeline and its bind group layout.

use depthcloud_gpu::{Renderer, RenderPipelineBuilder, ShaderLibrary, ShaderStage};
use tracing::{info, instrument};

use crate::grid::SampleGrid;
use crate::shaders::{PARTICLE_FRAGMENT, UNPROJECT, UNPROJECT_VERTEX};
use crate::textures::FrameTextureSet;
use crate::{RenderError, SurfaceDescriptor};

/// Depth state that never rejects a point and never writes depth.
pub fn relaxed_depth_stencil(format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format,
        depth_write_enabled: false,
        depth_compare: wgpu::CompareFunction::Always,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

/// Compiled unprojection program plus its fixed-function state.
///
/// Built once and shared by every frame.
#[derive(Debug)]
pub struct UnprojectionPipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl UnprojectionPipeline {
    /// Library holding the built-in unprojection shaders.
    pub fn library(renderer: &Renderer) -> Result<ShaderLibrary, RenderError> {
        let mut library = ShaderLibrary::new();
        library.add_wgsl(renderer.device(), "unproject", UNPROJECT)?;
        Ok(library)
    }

    /// Look up the unprojection functions in `library` and build the pipeline
    /// for `surface`.
    #[instrument(level = "info", skip(renderer, library))]
    pub fn new(
        renderer: &Renderer,
        library: &ShaderLibrary,
        surface: &SurfaceDescriptor,
    ) -> Result<Self, RenderError> {
        let vertex = library.require(UNPROJECT_VERTEX)?;
        let fragment = library.require(PARTICLE_FRAGMENT)?;

        let float = wgpu::TextureSampleType::Float { filterable: true };
        let bind_group_layout = renderer
            .create_bind_group_layout()
            .label("Point Cloud Bind Group Layout")
            .uniform(0, ShaderStage::Vertex)
            .texture(1, ShaderStage::Vertex, float)
            .texture(2, ShaderStage::Vertex, float)
            .texture(
                3,
                ShaderStage::Vertex,
                wgpu::TextureSampleType::Float { filterable: false },
            )
            .texture(4, ShaderStage::Vertex, wgpu::TextureSampleType::Uint)
            .build()?;

        let pipeline_layout =
            renderer
                .device()
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("Point Cloud Pipeline Layout"),
                    bind_group_layouts: &[&bind_group_layout],
                    push_constant_ranges: &[],
                });

        let pipeline = RenderPipelineBuilder::new(renderer.device())
            .with_label("Point Cloud Unprojection Pipeline")
            .with_vertex(vertex)
            .with_fragment(fragment)
            .with_layout(pipeline_layout)
            .with_vertex_buffer(SampleGrid::vertex_layout())
            .with_primitive(wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::PointList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            })
            .with_depth_stencil(surface.depth_format.map(relaxed_depth_stencil))
            .with_fragment_target(Some(wgpu::ColorTargetState {
                format: surface.color_format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            }))
            .build()?;

        info!(color_format = ?surface.color_format, depth_format = ?surface.depth_format, "Built unprojection pipeline");
        Ok(Self {
            pipeline,
            bind_group_layout,
        })
    }

    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    /// Bind group pointing at this frame's uniforms and textures.
    pub fn frame_bind_group(
        &self,
        device: &wgpu::Device,
        uniforms: &wgpu::Buffer,
        textures: &FrameTextureSet,
    ) -> wgpu::BindGroup {
        let [luma, chroma, depth, confidence] = textures.views();
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Point Cloud Frame Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&luma),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&chroma),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&depth),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&confidence),
                },
            ],
        })
    }
}
