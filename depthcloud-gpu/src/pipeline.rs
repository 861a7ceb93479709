use tracing::debug;

use crate::shader::{ShaderFunction, ShaderStageKind};

/// Builder for creating render pipelines
pub struct RenderPipelineBuilder<'a> {
    device: &'a wgpu::Device,
    vertex: Option<ShaderFunction>,
    fragment: Option<ShaderFunction>,
    label: Option<String>,
    layout: Option<wgpu::PipelineLayout>,
    vertex_buffers: Vec<wgpu::VertexBufferLayout<'static>>,
    primitive: Option<wgpu::PrimitiveState>,
    depth_stencil: Option<wgpu::DepthStencilState>,
    fragment_targets: Vec<Option<wgpu::ColorTargetState>>,
}

impl<'a> RenderPipelineBuilder<'a> {
    pub fn new(device: &'a wgpu::Device) -> Self {
        Self {
            device,
            vertex: None,
            fragment: None,
            label: None,
            layout: None,
            vertex_buffers: Vec::new(),
            primitive: None,
            depth_stencil: None,
            fragment_targets: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_vertex(mut self, function: ShaderFunction) -> Self {
        self.vertex = Some(function);
        self
    }

    pub fn with_fragment(mut self, function: ShaderFunction) -> Self {
        self.fragment = Some(function);
        self
    }

    pub fn with_layout(mut self, layout: wgpu::PipelineLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn with_vertex_buffer(mut self, buffer: wgpu::VertexBufferLayout<'static>) -> Self {
        self.vertex_buffers.push(buffer);
        self
    }

    pub fn with_primitive(mut self, primitive: wgpu::PrimitiveState) -> Self {
        self.primitive = Some(primitive);
        self
    }

    /// Set the depth/stencil state. `None` leaves it off.
    pub fn with_depth_stencil(mut self, depth_stencil: Option<wgpu::DepthStencilState>) -> Self {
        self.depth_stencil = depth_stencil;
        self
    }

    pub fn with_fragment_target(mut self, target: Option<wgpu::ColorTargetState>) -> Self {
        self.fragment_targets.push(target);
        self
    }

    /// Build the render pipeline.
    ///
    /// Pipeline creation runs inside a validation error scope; a rejected
    /// pipeline comes back as [`PipelineBuildError::Compilation`].
    pub fn build(self) -> Result<wgpu::RenderPipeline, PipelineBuildError> {
        let vertex = self.vertex.ok_or(PipelineBuildError::MissingVertexShader)?;
        expect_stage(&vertex, ShaderStageKind::Vertex)?;
        if let Some(fragment) = &self.fragment {
            expect_stage(fragment, ShaderStageKind::Fragment)?;
        }

        let pipeline_layout = self.layout.unwrap_or_else(|| {
            self.device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: None,
                    bind_group_layouts: &[],
                    push_constant_ranges: &[],
                })
        });

        let label = self.label.unwrap_or_else(|| vertex.entry_point.clone());

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex.module,
                    entry_point: Some(&vertex.entry_point),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &self.vertex_buffers,
                },
                primitive: self.primitive.unwrap_or_else(|| wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: Some(wgpu::Face::Back),
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                }),
                depth_stencil: self.depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                fragment: self.fragment.as_ref().map(|fragment| wgpu::FragmentState {
                    module: &fragment.module,
                    entry_point: Some(&fragment.entry_point),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &self.fragment_targets,
                }),
                multiview: None,
                cache: None,
            });

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(PipelineBuildError::Compilation {
                label,
                message: error.to_string(),
            });
        }

        debug!(label = %label, "Created render pipeline");
        Ok(pipeline)
    }
}

fn expect_stage(
    function: &ShaderFunction,
    expected: ShaderStageKind,
) -> Result<(), PipelineBuildError> {
    if function.stage == expected {
        Ok(())
    } else {
        Err(PipelineBuildError::WrongStage {
            name: function.entry_point.clone(),
            expected,
            found: function.stage,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineBuildError {
    #[error("Vertex shader is required")]
    MissingVertexShader,
    #[error("Shader function '{0}' not found in library")]
    FunctionNotFound(String),
    #[error("Shader function '{name}' is a {found:?} function, expected {expected:?}")]
    WrongStage {
        name: String,
        expected: ShaderStageKind,
        found: ShaderStageKind,
    },
    #[error("Failed to compile '{label}': {message}")]
    Compilation { label: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShaderLibrary;
    use crate::test_support::test_device;

    const TEST_SHADER: &str = r#"
        @vertex
        fn vs_main(@location(0) pos: vec3<f32>) -> @builtin(position) vec4<f32> {
            return vec4<f32>(pos, 1.0);
        }

        @fragment
        fn fs_main() -> @location(0) vec4<f32> {
            return vec4<f32>(1.0, 0.0, 0.0, 1.0);
        }
    "#;

    const POSITION_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: 12,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        }],
    };

    fn test_library(device: &wgpu::Device) -> ShaderLibrary {
        let mut library = ShaderLibrary::new();
        library
            .add_wgsl(device, "test_shader", TEST_SHADER)
            .expect("Failed to compile test shader");
        library
    }

    fn color_target() -> Option<wgpu::ColorTargetState> {
        Some(wgpu::ColorTargetState {
            format: wgpu::TextureFormat::Rgba8Unorm,
            blend: Some(wgpu::BlendState::REPLACE),
            write_mask: wgpu::ColorWrites::ALL,
        })
    }

    #[test]
    fn test_render_pipeline_builder_missing_vertex_shader() {
        let Some((device, _queue)) = test_device() else {
            return;
        };

        let result = RenderPipelineBuilder::new(&device).build();
        assert!(matches!(result, Err(PipelineBuildError::MissingVertexShader)));
    }

    #[test]
    fn test_render_pipeline_builder_with_shaders() {
        let Some((device, _queue)) = test_device() else {
            return;
        };
        let library = test_library(&device);

        RenderPipelineBuilder::new(&device)
            .with_label("test_pipeline")
            .with_vertex(library.require("vs_main").expect("vs_main"))
            .with_fragment(library.require("fs_main").expect("fs_main"))
            .with_vertex_buffer(POSITION_LAYOUT)
            .with_fragment_target(color_target())
            .build()
            .expect("Failed to build pipeline");
    }

    #[test]
    fn test_render_pipeline_builder_wrong_stage() {
        let Some((device, _queue)) = test_device() else {
            return;
        };
        let library = test_library(&device);

        let result = RenderPipelineBuilder::new(&device)
            .with_vertex(library.require("fs_main").expect("fs_main"))
            .build();

        match result {
            Err(PipelineBuildError::WrongStage { name, expected, .. }) => {
                assert_eq!(name, "fs_main");
                assert_eq!(expected, ShaderStageKind::Vertex);
            }
            _ => panic!("Expected WrongStage error"),
        }
    }

    #[test]
    fn test_render_pipeline_builder_point_list_with_relaxed_depth() {
        let Some((device, _queue)) = test_device() else {
            return;
        };
        let library = test_library(&device);

        RenderPipelineBuilder::new(&device)
            .with_vertex(library.require("vs_main").expect("vs_main"))
            .with_fragment(library.require("fs_main").expect("fs_main"))
            .with_vertex_buffer(POSITION_LAYOUT)
            .with_primitive(wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::PointList,
                ..Default::default()
            })
            .with_depth_stencil(Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }))
            .with_fragment_target(color_target())
            .build()
            .expect("Failed to build pipeline");
    }

    #[test]
    fn test_render_pipeline_builder_mismatched_vertex_layout() {
        let Some((device, _queue)) = test_device() else {
            return;
        };
        let library = test_library(&device);

        // The shader reads location 0 but no vertex buffer provides it.
        let result = RenderPipelineBuilder::new(&device)
            .with_vertex(library.require("vs_main").expect("vs_main"))
            .with_fragment(library.require("fs_main").expect("fs_main"))
            .with_fragment_target(color_target())
            .build();

        assert!(matches!(result, Err(PipelineBuildError::Compilation { .. })));
    }
}
