//! Staggered sampling grid over the camera image plane.

use depthcloud_gpu::{BufferUsage, Renderer};
use tracing::{info, instrument};

use crate::RenderError;

/// Shape of a staggered grid covering a camera image.
///
/// Cells are square with side `spacing`, chosen so that the grid has roughly
/// the requested number of samples. Odd rows are shifted right by half a
/// cell. A layout always holds at least one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    resolution: [u32; 2],
    spacing: f32,
    columns: u32,
    rows: u32,
    len: u32,
}

impl GridLayout {
    pub fn new(resolution: [u32; 2], target_points: u32) -> Result<Self, RenderError> {
        let [width, height] = resolution;
        if width == 0 || height == 0 || target_points == 0 {
            return Err(RenderError::InvalidConfig(format!(
                "cannot lay out {target_points} grid points over {width}x{height}"
            )));
        }

        let (width, height) = (width as f32, height as f32);
        let spacing = (width * height / target_points as f32).sqrt();
        let columns = (width / spacing).round() as u32;
        let rows = (height / spacing).round() as u32;
        if columns == 0 || rows == 0 {
            return Err(RenderError::InvalidConfig(format!(
                "{target_points} grid points over {}x{} rounds to {columns}x{rows} cells",
                resolution[0], resolution[1]
            )));
        }
        let len = columns.checked_mul(rows).ok_or_else(|| {
            RenderError::InvalidConfig(format!(
                "{columns}x{rows} grid cells do not fit a 32-bit vertex count"
            ))
        })?;

        Ok(Self {
            resolution,
            spacing,
            columns,
            rows,
            len,
        })
    }

    /// Camera resolution the grid covers.
    pub fn resolution(&self) -> [u32; 2] {
        self.resolution
    }

    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of samples, which is also the draw's vertex count.
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Image-plane coordinate of cell (column, row).
    pub fn point(&self, column: u32, row: u32) -> [f32; 2] {
        let offset = (row % 2) as f32 * self.spacing / 2.0;
        [
            offset + (column as f32 + 0.5) * self.spacing,
            (row as f32 + 0.5) * self.spacing,
        ]
    }

    /// All samples, row by row.
    pub fn points(&self) -> Vec<[f32; 2]> {
        (0..self.rows)
            .flat_map(|row| (0..self.columns).map(move |column| self.point(column, row)))
            .collect()
    }
}

/// The sample grid uploaded as a per-vertex input buffer.
#[derive(Debug)]
pub struct SampleGrid {
    layout: GridLayout,
    buffer: wgpu::Buffer,
}

impl SampleGrid {
    const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    /// Build the grid and upload it. Allocation failure is fatal for the renderer.
    #[instrument(level = "info", skip(renderer))]
    pub fn new(renderer: &Renderer, layout: GridLayout) -> Result<Self, RenderError> {
        let points = layout.points();
        let buffer = renderer
            .create_buffer()
            .label("Sample Grid")
            .with_pod_data(&points)
            .usage(BufferUsage::Vertex)
            .build()
            .map_err(RenderError::GridAllocation)?;

        info!(
            columns = layout.columns(),
            rows = layout.rows(),
            spacing = layout.spacing(),
            points = layout.len(),
            "Built sample grid"
        );
        Ok(Self { layout, buffer })
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn len(&self) -> u32 {
        self.layout.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// One `vec2<f32>` per vertex at location 0.
    pub fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}
