//! Builders for buffers and bind group layouts.
//!
//! These wrap the wgpu descriptors with the handful of options the point cloud
//! renderer needs and turn wgpu's asynchronous error reporting into `Result`s.

use tracing::debug;

/// Buffer usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Immutable per-vertex input
    Vertex,
    /// Uniform buffer rewritten from the CPU
    Uniform,
}

impl BufferUsage {
    fn to_wgpu(self) -> wgpu::BufferUsages {
        match self {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Uniform => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        }
    }
}

/// Builder for creating GPU buffers
pub struct BufferBuilder<'a> {
    device: &'a wgpu::Device,
    label: Option<String>,
    size: Option<u64>,
    data: Option<&'a [u8]>,
    usage: BufferUsage,
}

impl<'a> BufferBuilder<'a> {
    pub(crate) fn new(device: &'a wgpu::Device) -> Self {
        Self {
            device,
            label: None,
            size: None,
            data: None,
            usage: BufferUsage::Vertex,
        }
    }

    /// Set the buffer label
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set buffer size (for empty buffers)
    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Set buffer data from a slice of Pod types
    pub fn with_pod_data<T: bytemuck::Pod>(mut self, data: &'a [T]) -> Self {
        self.data = Some(bytemuck::cast_slice(data));
        self
    }

    /// Set buffer usage
    pub fn usage(mut self, usage: BufferUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Create the buffer.
    ///
    /// Allocation runs inside an out-of-memory error scope, so a failed
    /// allocation comes back as [`BufferBuildError::Allocation`] instead of
    /// reaching the device's uncaptured error handler.
    pub fn build(self) -> Result<wgpu::Buffer, BufferBuildError> {
        use wgpu::util::DeviceExt;

        if self.data.is_none() && self.size.is_none() {
            return Err(BufferBuildError::MissingSizeOrData);
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = match self.data {
            Some(data) => self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: self.label.as_deref(),
                    contents: data,
                    usage: self.usage.to_wgpu(),
                }),
            None => self.device.create_buffer(&wgpu::BufferDescriptor {
                label: self.label.as_deref(),
                size: self.size.unwrap_or_default(),
                usage: self.usage.to_wgpu(),
                mapped_at_creation: false,
            }),
        };

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(BufferBuildError::Allocation {
                label: self.label.unwrap_or_default(),
                reason: error.to_string(),
            });
        }

        debug!(
            label = self.label.as_deref().unwrap_or("<unnamed>"),
            size = buffer.size(),
            "Created buffer"
        );
        Ok(buffer)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BufferBuildError {
    #[error("Buffer must have either size or data")]
    MissingSizeOrData,
    #[error("Failed to allocate buffer '{label}': {reason}")]
    Allocation { label: String, reason: String },
}

/// Binding type for bind group layout entries
#[derive(Debug, Clone, Copy)]
pub enum BindingType {
    Uniform,
    Texture {
        sample_type: wgpu::TextureSampleType,
    },
}

impl BindingType {
    fn to_wgpu_binding_type(self) -> wgpu::BindingType {
        match self {
            BindingType::Uniform => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            BindingType::Texture { sample_type } => wgpu::BindingType::Texture {
                sample_type,
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
        }
    }
}

/// Shader stage visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    VertexFragment,
}

impl ShaderStage {
    fn to_wgpu(self) -> wgpu::ShaderStages {
        match self {
            ShaderStage::Vertex => wgpu::ShaderStages::VERTEX,
            ShaderStage::Fragment => wgpu::ShaderStages::FRAGMENT,
            ShaderStage::VertexFragment => wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        }
    }
}

struct LayoutEntry {
    binding: u32,
    visibility: ShaderStage,
    binding_type: BindingType,
}

/// Builder for bind group layouts.
///
/// Only the layout is built here: bind groups that point at per-frame
/// textures are created by the caller every frame against this layout.
pub struct BindGroupLayoutBuilder<'a> {
    device: &'a wgpu::Device,
    label: Option<String>,
    entries: Vec<LayoutEntry>,
}

impl<'a> BindGroupLayoutBuilder<'a> {
    pub fn new(device: &'a wgpu::Device) -> Self {
        Self {
            device,
            label: None,
            entries: Vec::new(),
        }
    }

    /// Set the layout label
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add a uniform buffer binding
    pub fn uniform(mut self, binding: u32, visibility: ShaderStage) -> Self {
        self.entries.push(LayoutEntry {
            binding,
            visibility,
            binding_type: BindingType::Uniform,
        });
        self
    }

    /// Add a 2D texture binding
    pub fn texture(
        mut self,
        binding: u32,
        visibility: ShaderStage,
        sample_type: wgpu::TextureSampleType,
    ) -> Self {
        self.entries.push(LayoutEntry {
            binding,
            visibility,
            binding_type: BindingType::Texture { sample_type },
        });
        self
    }

    pub fn build(self) -> Result<wgpu::BindGroupLayout, BindGroupBuildError> {
        if self.entries.is_empty() {
            return Err(BindGroupBuildError::NoEntries);
        }

        let mut seen = std::collections::HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.binding) {
                return Err(BindGroupBuildError::DuplicateBinding(entry.binding));
            }
        }

        let layout_entries: Vec<wgpu::BindGroupLayoutEntry> = self
            .entries
            .iter()
            .map(|e| wgpu::BindGroupLayoutEntry {
                binding: e.binding,
                visibility: e.visibility.to_wgpu(),
                ty: e.binding_type.to_wgpu_binding_type(),
                count: None,
            })
            .collect();

        Ok(self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: self.label.as_deref(),
                entries: &layout_entries,
            }))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BindGroupBuildError {
    #[error("No bindings added to bind group layout")]
    NoEntries,
    #[error("Binding {0} declared more than once")]
    DuplicateBinding(u32),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_device;

    #[test]
    fn test_buffer_builder_with_pod_data() {
        let Some((device, _queue)) = test_device() else {
            return;
        };

        let points = vec![[0.5f32, 0.5], [1.5, 0.5], [2.5, 0.5]];
        let buffer = BufferBuilder::new(&device)
            .label("grid")
            .with_pod_data(&points)
            .usage(BufferUsage::Vertex)
            .build()
            .expect("Failed to build buffer");

        assert_eq!(buffer.size(), (std::mem::size_of::<[f32; 2]>() * 3) as u64);
        assert!(buffer.usage().contains(wgpu::BufferUsages::VERTEX));
    }

    #[test]
    fn test_buffer_builder_with_size() {
        let Some((device, _queue)) = test_device() else {
            return;
        };

        let buffer = BufferBuilder::new(&device)
            .label("uniforms")
            .size(272)
            .usage(BufferUsage::Uniform)
            .build()
            .expect("Failed to build buffer");

        assert_eq!(buffer.size(), 272);
        assert!(buffer.usage().contains(wgpu::BufferUsages::COPY_DST));
    }

    #[test]
    fn test_buffer_builder_missing_size_or_data() {
        let Some((device, _queue)) = test_device() else {
            return;
        };

        let result = BufferBuilder::new(&device)
            .usage(BufferUsage::Vertex)
            .build();

        assert!(matches!(result, Err(BufferBuildError::MissingSizeOrData)));
    }

    #[test]
    fn test_buffer_usage_conversion() {
        assert_eq!(BufferUsage::Vertex.to_wgpu(), wgpu::BufferUsages::VERTEX);
        assert!(BufferUsage::Uniform.to_wgpu().contains(wgpu::BufferUsages::UNIFORM));
        assert!(BufferUsage::Uniform.to_wgpu().contains(wgpu::BufferUsages::COPY_DST));
    }

    #[test]
    fn test_bind_group_layout_no_entries() {
        let Some((device, _queue)) = test_device() else {
            return;
        };

        let result = BindGroupLayoutBuilder::new(&device).build();
        assert!(matches!(result, Err(BindGroupBuildError::NoEntries)));
    }

    #[test]
    fn test_bind_group_layout_duplicate_binding() {
        let Some((device, _queue)) = test_device() else {
            return;
        };

        let result = BindGroupLayoutBuilder::new(&device)
            .uniform(0, ShaderStage::Vertex)
            .texture(
                0,
                ShaderStage::Vertex,
                wgpu::TextureSampleType::Float { filterable: true },
            )
            .build();
        assert!(matches!(result, Err(BindGroupBuildError::DuplicateBinding(0))));
    }

    #[test]
    fn test_shader_stage_conversion() {
        assert_eq!(ShaderStage::Vertex.to_wgpu(), wgpu::ShaderStages::VERTEX);
        assert_eq!(ShaderStage::Fragment.to_wgpu(), wgpu::ShaderStages::FRAGMENT);
        assert!(ShaderStage::VertexFragment.to_wgpu().contains(wgpu::ShaderStages::VERTEX));
        assert!(ShaderStage::VertexFragment.to_wgpu().contains(wgpu::ShaderStages::FRAGMENT));
    }

    #[test]
    fn test_binding_type_conversion() {
        match BindingType::Uniform.to_wgpu_binding_type() {
            wgpu::BindingType::Buffer { ty, .. } => {
                assert_eq!(ty, wgpu::BufferBindingType::Uniform);
            }
            _ => panic!("Expected Buffer binding type"),
        }

        let depth = BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
        };
        match depth.to_wgpu_binding_type() {
            wgpu::BindingType::Texture {
                sample_type,
                view_dimension,
                multisampled,
            } => {
                assert_eq!(sample_type, wgpu::TextureSampleType::Float { filterable: false });
                assert_eq!(view_dimension, wgpu::TextureViewDimension::D2);
                assert!(!multisampled);
            }
            _ => panic!("Expected Texture binding type"),
        }
    }
}
