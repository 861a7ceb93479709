//! WGSL modules whose entry points are looked up by name.

use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::PipelineBuildError;

/// Pipeline stage an entry point is declared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStageKind {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderStageKind {
    fn from_naga(stage: naga::ShaderStage) -> Option<Self> {
        match stage {
            naga::ShaderStage::Vertex => Some(Self::Vertex),
            naga::ShaderStage::Fragment => Some(Self::Fragment),
            naga::ShaderStage::Compute => Some(Self::Compute),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub name: String,
    pub stage: ShaderStageKind,
}

/// A named entry point together with the module that defines it.
#[derive(Debug, Clone)]
pub struct ShaderFunction {
    pub module: wgpu::ShaderModule,
    pub entry_point: String,
    pub stage: ShaderStageKind,
}

/// Compiled shader modules indexed by entry-point name.
#[derive(Debug, Default)]
pub struct ShaderLibrary {
    functions: HashMap<String, ShaderFunction>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `source` and register every entry point it declares.
    ///
    /// A later module declaring an entry point with the same name replaces
    /// the earlier one.
    #[instrument(level = "debug", skip(self, device, source))]
    pub fn add_wgsl(
        &mut self,
        device: &wgpu::Device,
        label: &str,
        source: &str,
    ) -> Result<(), PipelineBuildError> {
        let entries = parse_entry_points(label, source)?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(PipelineBuildError::Compilation {
                label: label.to_string(),
                message: error.to_string(),
            });
        }

        for entry in entries {
            debug!(module = label, entry_point = %entry.name, stage = ?entry.stage, "Registered shader function");
            self.functions.insert(
                entry.name.clone(),
                ShaderFunction {
                    module: module.clone(),
                    entry_point: entry.name,
                    stage: entry.stage,
                },
            );
        }
        Ok(())
    }

    pub fn function(&self, name: &str) -> Option<ShaderFunction> {
        self.functions.get(name).cloned()
    }

    /// Like [`ShaderLibrary::function`], but a missing name is an error.
    pub fn require(&self, name: &str) -> Result<ShaderFunction, PipelineBuildError> {
        self.function(name)
            .ok_or_else(|| PipelineBuildError::FunctionNotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Parse WGSL and list its vertex, fragment and compute entry points in
/// declaration order.
pub fn parse_entry_points(label: &str, source: &str) -> Result<Vec<EntryPoint>, PipelineBuildError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|error| {
        PipelineBuildError::Compilation {
            label: label.to_string(),
            message: error.emit_to_string(source),
        }
    })?;

    Ok(module
        .entry_points
        .iter()
        .filter_map(|entry| {
            ShaderStageKind::from_naga(entry.stage).map(|stage| EntryPoint {
                name: entry.name.clone(),
                stage,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
        struct VertexOut {
            @builtin(position) position: vec4<f32>,
        }

        // @vertex fn commented_out() {}

        @vertex
        fn unproject_vertex(@location(0) grid: vec2<f32>) -> VertexOut {
            var out: VertexOut;
            out.position = vec4<f32>(grid, 0.0, 1.0);
            return out;
        }

        fn helper() -> f32 { return 1.0; }

        @fragment fn particle_fragment() -> @location(0) vec4<f32> {
            return vec4<f32>(1.0);
        }

        @compute @workgroup_size(64)
        fn clear(@builtin(global_invocation_id) id: vec3<u32>) {}
    "#;

    #[test]
    fn test_parse_entry_points() {
        let entries = parse_entry_points("test module", SOURCE).expect("valid WGSL");
        assert_eq!(
            entries,
            vec![
                EntryPoint {
                    name: "unproject_vertex".into(),
                    stage: ShaderStageKind::Vertex,
                },
                EntryPoint {
                    name: "particle_fragment".into(),
                    stage: ShaderStageKind::Fragment,
                },
                EntryPoint {
                    name: "clear".into(),
                    stage: ShaderStageKind::Compute,
                },
            ]
        );
    }

    #[test]
    fn test_parse_ignores_plain_functions() {
        let entries =
            parse_entry_points("helper", "fn helper() -> f32 { return 1.0; }").expect("valid WGSL");
        assert!(entries.is_empty());
    }

    #[test]
    fn test_parse_skips_block_comments_and_multiline_attributes() {
        let source = r#"
            @compute @workgroup_size(8, 8, 1)
            fn main() {}

            /* @vertex fn ghost() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); } */

            @vertex
            fn vs(
                @builtin(vertex_index) index: u32,
            ) -> @builtin(position) vec4<f32> {
                return vec4<f32>(f32(index), 0.0, 0.0, 1.0);
            }
        "#;
        let entries = parse_entry_points("mixed", source).expect("valid WGSL");
        let names: Vec<&str> = entries.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, vec!["main", "vs"]);
        assert_eq!(entries[0].stage, ShaderStageKind::Compute);
        assert_eq!(entries[1].stage, ShaderStageKind::Vertex);
    }

    #[test]
    fn test_parse_reports_syntax_error() {
        let result = parse_entry_points("broken", "@vertex fn broken( -> {");
        match result {
            Err(PipelineBuildError::Compilation { label, message }) => {
                assert_eq!(label, "broken");
                assert!(!message.is_empty());
            }
            other => panic!("Expected Compilation, got {other:?}"),
        }
    }

    #[test]
    fn test_require_missing_function() {
        let library = ShaderLibrary::new();
        assert!(library.is_empty());
        match library.require("unproject_vertex") {
            Err(PipelineBuildError::FunctionNotFound(name)) => assert_eq!(name, "unproject_vertex"),
            other => panic!("Expected FunctionNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_add_wgsl_registers_entry_points() {
        let Some((device, _queue)) = crate::test_support::test_device() else {
            return;
        };

        let mut library = ShaderLibrary::new();
        library
            .add_wgsl(&device, "test module", SOURCE)
            .expect("Failed to compile shader");

        assert_eq!(library.len(), 3);
        let vertex = library.require("unproject_vertex").expect("vertex function");
        assert_eq!(vertex.stage, ShaderStageKind::Vertex);
        assert!(library.function("helper").is_none());
    }

    #[test]
    fn test_add_wgsl_reports_compilation_error() {
        let Some((device, _queue)) = crate::test_support::test_device() else {
            return;
        };

        let mut library = ShaderLibrary::new();
        let result = library.add_wgsl(&device, "broken", "@vertex fn broken( -> {");
        assert!(matches!(result, Err(PipelineBuildError::Compilation { .. })));
        assert!(library.is_empty());
    }
}
