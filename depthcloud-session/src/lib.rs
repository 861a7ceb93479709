//! Camera-side inputs of the point cloud renderer.
//!
//! A [`CameraSession`] reports the current [`CameraSample`] (pose, intrinsics,
//! image resolution). [`SyntheticSession`] stands in for a depth-sensing AR
//! session and also produces the CPU planes ([`DepthFrame`]) that get uploaded
//! as the per-frame textures.

pub mod camera;
pub mod session;
pub mod synthetic;

pub use camera::{CameraSample, Orientation, intrinsics_from_fov};
pub use session::{CameraSession, DepthFrame, FixedSession, ImagePlane};
pub use synthetic::{SyntheticConfig, SyntheticSession};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Plane has {found} elements, expected {expected}")]
    PlaneSize { expected: usize, found: usize },
    #[error("{plane} plane has {found} channels, expected {expected}")]
    ChannelMismatch {
        plane: &'static str,
        expected: u32,
        found: u32,
    },
    #[error("Unknown orientation '{0}' (expected portrait, portrait-upside-down, landscape-left or landscape-right)")]
    UnknownOrientation(String),
}
