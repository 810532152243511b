//! Camera device access via nokhwa.
//!
//! `CameraDevice` wraps a nokhwa handle behind the small [`FrameGrabber`]
//! trait so the capture loops can be exercised without hardware.

use std::fmt;
use std::time::Duration;

use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;
use thiserror::Error;
use tracing::info;

/// Default capture resolution requested from the device.
pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;

/// Errors that can occur during capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Failed to open device: {0}")]
    OpenFailed(String),

    #[error("Failed to read frame: {0}")]
    ReadFailed(String),

    #[error("Failed to decode frame: {0}")]
    DecodeFailed(String),

    #[error("No frame available after {0:?}")]
    Timeout(Duration),
}

/// A camera device index or a network stream URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraSource {
    Index(u32),
    Url(String),
}

impl CameraSource {
    /// Parse a CLI source string: numeric values select a local device,
    /// anything else is treated as a stream URL.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<u32>() {
            Ok(index) => CameraSource::Index(index),
            Err(_) => CameraSource::Url(raw.to_string()),
        }
    }
}

impl fmt::Display for CameraSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraSource::Index(index) => write!(f, "device {}", index),
            CameraSource::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Timing knobs for the capture loops.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Delay before reopening the device after an open/read failure.
    pub open_retry_delay: Duration,
    /// How long `capture()` waits for the first frame before giving up.
    pub capture_timeout: Duration,
    /// Pause between successive device reads, bounding the read rate.
    pub frame_interval: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            open_retry_delay: Duration::from_secs(1),
            capture_timeout: Duration::from_secs(5),
            frame_interval: Duration::from_millis(30),
        }
    }
}

/// One open device handle that can produce decoded frames.
///
/// Implementations own the underlying handle; dropping the grabber
/// releases it.
pub trait FrameGrabber: Send {
    fn grab(&mut self) -> Result<RgbImage, CaptureError>;
}

/// nokhwa-backed grabber for webcams and network streams.
pub struct CameraDevice {
    camera: Camera,
}

impl CameraDevice {
    pub fn open(source: &CameraSource) -> Result<Self, CaptureError> {
        Self::open_with_resolution(source, DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }

    pub fn open_with_resolution(
        source: &CameraSource,
        width: u32,
        height: u32,
    ) -> Result<Self, CaptureError> {
        let index = match source {
            CameraSource::Index(i) => CameraIndex::Index(*i),
            CameraSource::Url(url) => CameraIndex::String(url.clone()),
        };

        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, 30),
        ));

        let camera =
            Camera::new(index, requested).map_err(|e| CaptureError::OpenFailed(e.to_string()))?;

        let resolution = camera.resolution();
        info!(
            "Camera opened ({}): {}x{} @ {} fps",
            source,
            resolution.width(),
            resolution.height(),
            camera.frame_rate()
        );

        Ok(Self { camera })
    }
}

impl FrameGrabber for CameraDevice {
    fn grab(&mut self) -> Result<RgbImage, CaptureError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| CaptureError::ReadFailed(e.to_string()))?;

        buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CaptureError::DecodeFailed(e.to_string()))
    }
}
