//! On-demand capture: one device read per request.

use image::RgbImage;
use tracing::{debug, warn};

use super::device::{CameraDevice, CameraSource, CaptureError, FrameGrabber};
use super::FrameSource;

type GrabberFactory = Box<dyn Fn() -> Result<Box<dyn FrameGrabber>, CaptureError> + Send + Sync>;

/// Reads a frame directly from the device on every capture request.
///
/// The device is opened lazily on the first request and kept open across
/// requests. An open failure is returned as-is; the application treats it
/// as fatal at startup (an unusable device means there is nothing to
/// serve). A read failure after a successful open is transient and only
/// fails that one request.
pub struct DirectCapture {
    opener: GrabberFactory,
    device: Option<Box<dyn FrameGrabber>>,
}

impl DirectCapture {
    pub fn new(source: CameraSource) -> Self {
        Self::with_factory(Box::new(move || {
            CameraDevice::open(&source).map(|d| Box::new(d) as Box<dyn FrameGrabber>)
        }))
    }

    /// Build against an arbitrary grabber factory (synthetic sources, tests).
    pub fn with_factory(opener: GrabberFactory) -> Self {
        Self {
            opener,
            device: None,
        }
    }
}

impl FrameSource for DirectCapture {
    fn capture(&mut self) -> Result<RgbImage, CaptureError> {
        if self.device.is_none() {
            self.device = Some((self.opener)()?);
        }

        match self.device.as_mut() {
            Some(device) => device.grab().map_err(|e| {
                warn!("Frame read failed: {}", e);
                e
            }),
            // Unreachable: the open above either populated the slot or returned.
            None => Err(CaptureError::ReadFailed("device not open".to_string())),
        }
    }

    fn release(&mut self) {
        if self.device.take().is_some() {
            debug!("Device handle released");
        }
    }
}

impl Drop for DirectCapture {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct SolidGrabber {
        value: u8,
    }

    impl FrameGrabber for SolidGrabber {
        fn grab(&mut self) -> Result<RgbImage, CaptureError> {
            Ok(RgbImage::from_pixel(4, 4, image::Rgb([self.value; 3])))
        }
    }

    fn counting_factory(opens: Arc<AtomicUsize>) -> GrabberFactory {
        Box::new(move || {
            opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(SolidGrabber { value: 7 }) as Box<dyn FrameGrabber>)
        })
    }

    #[test]
    fn opens_lazily_and_reuses_the_handle() {
        let opens = Arc::new(AtomicUsize::new(0));
        let mut source = DirectCapture::with_factory(counting_factory(opens.clone()));

        assert_eq!(opens.load(Ordering::SeqCst), 0);
        source.capture().unwrap();
        source.capture().unwrap();
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn open_failure_is_returned_to_the_caller() {
        let mut source = DirectCapture::with_factory(Box::new(|| {
            Err(CaptureError::OpenFailed("no such device".to_string()))
        }));

        assert!(matches!(
            source.capture(),
            Err(CaptureError::OpenFailed(_))
        ));
    }

    #[test]
    fn release_is_idempotent_and_safe_before_open() {
        let opens = Arc::new(AtomicUsize::new(0));
        let mut source = DirectCapture::with_factory(counting_factory(opens.clone()));

        source.release();
        source.capture().unwrap();
        source.release();
        source.release();

        // Next capture reopens.
        source.capture().unwrap();
        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }
}
