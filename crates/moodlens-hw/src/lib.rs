//! moodlens-hw — Frame sources backed by real hardware and files.
//!
//! Provides V4L2 camera capture and a still-image directory source, both
//! implementing [`moodlens_core::FrameSource`].

pub mod camera;
pub mod frame;
pub mod still;

pub use camera::{Camera, CameraError, CameraSource, DeviceInfo, PixelFormat};
pub use still::{ImageSequence, ImageSequenceError};
