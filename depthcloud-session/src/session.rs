use std::sync::{Arc, Mutex, PoisonError};

use crate::SessionError;
use crate::camera::CameraSample;

/// A live camera/tracking session.
pub trait CameraSession {
    /// The most recent camera sample, or `None` before the first frame.
    fn current_frame(&self) -> Option<CameraSample>;
}

impl<S: CameraSession + ?Sized> CameraSession for &S {
    fn current_frame(&self) -> Option<CameraSample> {
        (**self).current_frame()
    }
}

impl<S: CameraSession + ?Sized> CameraSession for Arc<S> {
    fn current_frame(&self) -> Option<CameraSample> {
        (**self).current_frame()
    }
}

impl<S: CameraSession + ?Sized> CameraSession for Box<S> {
    fn current_frame(&self) -> Option<CameraSample> {
        (**self).current_frame()
    }
}

/// Session whose current sample is set by hand.
#[derive(Debug, Default)]
pub struct FixedSession {
    sample: Mutex<Option<CameraSample>>,
}

impl FixedSession {
    pub fn new(sample: CameraSample) -> Self {
        Self {
            sample: Mutex::new(Some(sample)),
        }
    }

    /// A session that has not produced a frame yet.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn set(&self, sample: Option<CameraSample>) {
        *self.sample.lock().unwrap_or_else(PoisonError::into_inner) = sample;
    }
}

impl CameraSession for FixedSession {
    fn current_frame(&self) -> Option<CameraSample> {
        *self.sample.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Tightly packed, row-major image plane.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePlane<T: bytemuck::Pod> {
    width: u32,
    height: u32,
    channels: u32,
    data: Vec<T>,
}

impl<T: bytemuck::Pod> ImagePlane<T> {
    pub fn new(width: u32, height: u32, channels: u32, data: Vec<T>) -> Result<Self, SessionError> {
        if width == 0 || height == 0 || channels == 0 {
            return Err(SessionError::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(SessionError::PlaneSize {
                expected,
                found: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn bytes_per_row(&self) -> u32 {
        self.width * self.channels * std::mem::size_of::<T>() as u32
    }

    /// Channels of the texel at (x, y).
    pub fn texel(&self, x: u32, y: u32) -> Option<&[T]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = (y as usize * self.width as usize + x as usize) * self.channels as usize;
        self.data.get(start..start + self.channels as usize)
    }
}

/// One captured frame: the camera sample and the planes captured with it.
///
/// Luma and chroma are full-range BT.601. Depth is in metres along the
/// optical axis, zero where nothing was measured. Confidence is 0 (low),
/// 1 (medium) or 2 (high).
#[derive(Debug, Clone)]
pub struct DepthFrame {
    pub sample: CameraSample,
    pub luma: ImagePlane<u8>,
    pub chroma: ImagePlane<u8>,
    pub depth: ImagePlane<f32>,
    pub confidence: ImagePlane<u8>,
}

impl DepthFrame {
    pub fn new(
        sample: CameraSample,
        luma: ImagePlane<u8>,
        chroma: ImagePlane<u8>,
        depth: ImagePlane<f32>,
        confidence: ImagePlane<u8>,
    ) -> Result<Self, SessionError> {
        expect_channels("luma", &luma, 1)?;
        expect_channels("chroma", &chroma, 2)?;
        expect_channels("depth", &depth, 1)?;
        expect_channels("confidence", &confidence, 1)?;
        if (depth.width(), depth.height()) != (confidence.width(), confidence.height()) {
            return Err(SessionError::PlaneSize {
                expected: depth.data().len(),
                found: confidence.data().len(),
            });
        }
        Ok(Self {
            sample,
            luma,
            chroma,
            depth,
            confidence,
        })
    }

    pub fn timestamp(&self) -> f64 {
        self.sample.timestamp
    }
}

fn expect_channels<T: bytemuck::Pod>(
    plane: &'static str,
    image: &ImagePlane<T>,
    expected: u32,
) -> Result<(), SessionError> {
    if image.channels() == expected {
        Ok(())
    } else {
        Err(SessionError::ChannelMismatch {
            plane,
            expected,
            found: image.channels(),
        })
    }
}
