//! Frame acquisition from a camera device or network stream.
//!
//! Two sources implement [`FrameSource`]:
//!
//! - [`DirectCapture`] reads one frame from the device per request.
//! - [`StreamCapture`] keeps a background thread reading the device into a
//!   shared latest-frame buffer and serves requests from that buffer.

pub mod device;
pub mod direct;
pub mod stream;

pub use device::{CameraDevice, CameraSource, CaptureConfig, CaptureError, FrameGrabber};
pub use direct::DirectCapture;
pub use stream::StreamCapture;

use image::RgbImage;

/// Common seam over the two capture designs.
pub trait FrameSource: Send {
    /// Produce one decoded frame in display color order.
    fn capture(&mut self) -> Result<RgbImage, CaptureError>;

    /// Release the device handle (and any background work). Safe to call
    /// when nothing was ever opened; idempotent.
    fn release(&mut self);
}
