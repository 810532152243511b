//! Streaming capture: a background thread keeps a latest-frame buffer fresh.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use image::RgbImage;
use tracing::{debug, error, info, warn};

use super::device::{CameraDevice, CameraSource, CaptureConfig, CaptureError, FrameGrabber};
use super::FrameSource;

type GrabberFactory = Arc<dyn Fn() -> Result<Box<dyn FrameGrabber>, CaptureError> + Send + Sync>;

/// Single-slot latest-frame-wins buffer shared with the reader thread.
///
/// The condvar is signalled on every write so a capture request waiting
/// for the first frame wakes as soon as one lands.
struct FrameSlot {
    latest: Mutex<Option<RgbImage>>,
    ready: Condvar,
}

/// Decouples on-demand reads from device I/O latency.
///
/// A background thread opens the device, reads frames in a loop, and
/// replaces the shared buffer on every successful read. Read failures
/// drop the handle and reopen after a delay, so transient stream drops
/// reconnect automatically. `capture()` starts the thread if needed and
/// waits (bounded by `CaptureConfig::capture_timeout`) for the first
/// frame; once any frame exists it returns the most recent one
/// immediately.
pub struct StreamCapture {
    opener: GrabberFactory,
    config: CaptureConfig,
    running: Arc<AtomicBool>,
    slot: Arc<FrameSlot>,
    worker: Option<JoinHandle<()>>,
}

impl StreamCapture {
    pub fn new(source: CameraSource, config: CaptureConfig) -> Self {
        Self::with_factory(
            Arc::new(move || {
                CameraDevice::open(&source).map(|d| Box::new(d) as Box<dyn FrameGrabber>)
            }),
            config,
        )
    }

    /// Build against an arbitrary grabber factory (synthetic sources, tests).
    pub fn with_factory(opener: GrabberFactory, config: CaptureConfig) -> Self {
        Self {
            opener,
            config,
            running: Arc::new(AtomicBool::new(false)),
            slot: Arc::new(FrameSlot {
                latest: Mutex::new(None),
                ready: Condvar::new(),
            }),
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Launch the background reader. No-op if it is already alive.
    pub fn start(&mut self) {
        if self.worker.is_some() {
            return;
        }

        self.running.store(true, Ordering::SeqCst);

        let opener = self.opener.clone();
        let running = self.running.clone();
        let slot = self.slot.clone();
        let config = self.config.clone();

        self.worker = Some(thread::spawn(move || {
            read_loop(opener, running, slot, config);
        }));

        info!("Capture thread started");
    }

    /// Signal the background reader to exit and wait for it to finish.
    ///
    /// The device handle is dropped inside the thread before it returns,
    /// so once `stop()` returns no device resource is held. Safe to call
    /// when not running.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        self.running.store(false, Ordering::SeqCst);
        if worker.join().is_err() {
            error!("Capture thread panicked during shutdown");
        }

        info!("Capture thread stopped");
    }

    /// Return the most recent frame, starting the reader if necessary.
    ///
    /// Blocks only while the buffer has never been written, bounded by the
    /// configured timeout.
    pub fn latest_frame(&mut self) -> Result<RgbImage, CaptureError> {
        if !self.is_running() {
            self.start();
        }

        let deadline = Instant::now() + self.config.capture_timeout;
        let mut latest = self.slot.latest.lock().unwrap();

        loop {
            if let Some(frame) = latest.as_ref() {
                return Ok(frame.clone());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(CaptureError::Timeout(self.config.capture_timeout));
            }

            let (guard, _) = self
                .slot
                .ready
                .wait_timeout(latest, deadline - now)
                .unwrap();
            latest = guard;
        }
    }
}

impl FrameSource for StreamCapture {
    fn capture(&mut self) -> Result<RgbImage, CaptureError> {
        self.latest_frame()
    }

    fn release(&mut self) {
        self.stop();
    }
}

impl Drop for StreamCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Body of the background reader thread.
///
/// The running flag is checked at the top of every iteration; a read in
/// flight is allowed to complete or fail before it is rechecked. The
/// device handle lives entirely inside this function, so returning
/// releases it.
fn read_loop(
    opener: GrabberFactory,
    running: Arc<AtomicBool>,
    slot: Arc<FrameSlot>,
    config: CaptureConfig,
) {
    let mut device: Option<Box<dyn FrameGrabber>> = None;

    while running.load(Ordering::SeqCst) {
        if device.is_none() {
            match opener() {
                Ok(opened) => device = Some(opened),
                Err(e) => {
                    warn!("Device open failed, retrying in {:?}: {}", config.open_retry_delay, e);
                    thread::sleep(config.open_retry_delay);
                    continue;
                }
            }
        }

        if let Some(grabber) = device.as_mut() {
            match grabber.grab() {
                Ok(frame) => {
                    let mut latest = slot.latest.lock().unwrap();
                    *latest = Some(frame);
                    slot.ready.notify_all();
                    drop(latest);

                    thread::sleep(config.frame_interval);
                }
                Err(e) => {
                    warn!("Frame read failed, reopening device: {}", e);
                    device = None;
                    thread::sleep(config.open_retry_delay);
                }
            }
        }
    }

    debug!("Capture thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn test_config() -> CaptureConfig {
        CaptureConfig {
            open_retry_delay: Duration::from_millis(10),
            capture_timeout: Duration::from_millis(250),
            frame_interval: Duration::from_millis(2),
        }
    }

    /// Grabber that yields frames with an incrementing pixel value, failing
    /// every read once `fail_after` reads have succeeded.
    struct ScriptedGrabber {
        counter: Arc<AtomicUsize>,
        fail_after: usize,
        reads: usize,
        released: Arc<AtomicBool>,
    }

    impl FrameGrabber for ScriptedGrabber {
        fn grab(&mut self) -> Result<RgbImage, CaptureError> {
            if self.reads >= self.fail_after {
                return Err(CaptureError::ReadFailed("stream dropped".to_string()));
            }
            self.reads += 1;
            let value = (self.counter.fetch_add(1, Ordering::SeqCst) % 256) as u8;
            Ok(RgbImage::from_pixel(2, 2, image::Rgb([value; 3])))
        }
    }

    impl Drop for ScriptedGrabber {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    struct Fixture {
        opens: Arc<AtomicUsize>,
        counter: Arc<AtomicUsize>,
        released: Arc<AtomicBool>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                opens: Arc::new(AtomicUsize::new(0)),
                counter: Arc::new(AtomicUsize::new(1)),
                released: Arc::new(AtomicBool::new(false)),
            }
        }

        fn factory(&self, fail_after: usize) -> GrabberFactory {
            let opens = self.opens.clone();
            let counter = self.counter.clone();
            let released = self.released.clone();
            Arc::new(move || {
                opens.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(ScriptedGrabber {
                    counter: counter.clone(),
                    fail_after,
                    reads: 0,
                    released: released.clone(),
                }) as Box<dyn FrameGrabber>)
            })
        }
    }

    #[test]
    fn capture_starts_the_thread_and_returns_a_frame() {
        let fixture = Fixture::new();
        let mut source = StreamCapture::with_factory(fixture.factory(usize::MAX), test_config());

        assert!(!source.is_running());
        let frame = source.latest_frame().unwrap();
        assert!(source.is_running());
        assert_eq!(frame.dimensions(), (2, 2));

        source.stop();
    }

    #[test]
    fn start_is_idempotent() {
        let fixture = Fixture::new();
        let mut source = StreamCapture::with_factory(fixture.factory(usize::MAX), test_config());

        source.start();
        source.start();
        source.latest_frame().unwrap();
        source.start();

        assert_eq!(fixture.opens.load(Ordering::SeqCst), 1);
        source.stop();
    }

    #[test]
    fn stop_joins_and_releases_the_device() {
        let fixture = Fixture::new();
        let mut source = StreamCapture::with_factory(fixture.factory(usize::MAX), test_config());

        source.latest_frame().unwrap();
        source.stop();

        assert!(!source.is_running());
        assert!(fixture.released.load(Ordering::SeqCst));

        // Safe to call again.
        source.stop();
    }

    #[test]
    fn restart_after_stop_spawns_a_fresh_thread() {
        let fixture = Fixture::new();
        let mut source = StreamCapture::with_factory(fixture.factory(usize::MAX), test_config());

        source.latest_frame().unwrap();
        source.stop();
        source.latest_frame().unwrap();

        assert!(source.is_running());
        assert_eq!(fixture.opens.load(Ordering::SeqCst), 2);
        source.stop();
    }

    #[test]
    fn capture_times_out_when_no_frame_ever_arrives() {
        let mut source = StreamCapture::with_factory(
            Arc::new(|| Err(CaptureError::OpenFailed("unreachable host".to_string()))),
            test_config(),
        );

        let started = Instant::now();
        let result = source.latest_frame();
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(CaptureError::Timeout(_))));
        assert!(elapsed >= Duration::from_millis(250), "timed out too early: {:?}", elapsed);

        // The reader keeps retrying; the process is unaffected.
        assert!(source.is_running());
        source.stop();
    }

    #[test]
    fn capture_never_blocks_once_a_frame_exists() {
        let fixture = Fixture::new();
        let mut source = StreamCapture::with_factory(fixture.factory(usize::MAX), test_config());

        source.latest_frame().unwrap();

        let started = Instant::now();
        source.latest_frame().unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));

        source.stop();
    }

    #[test]
    fn newer_frames_replace_older_ones() {
        let fixture = Fixture::new();
        let mut source = StreamCapture::with_factory(fixture.factory(usize::MAX), test_config());

        let first = source.latest_frame().unwrap();
        thread::sleep(Duration::from_millis(50));
        let later = source.latest_frame().unwrap();

        assert!(later.get_pixel(0, 0)[0] > first.get_pixel(0, 0)[0]);
        source.stop();
    }

    #[test]
    fn read_failure_triggers_a_reopen() {
        let fixture = Fixture::new();
        let mut source = StreamCapture::with_factory(fixture.factory(3), test_config());

        source.latest_frame().unwrap();
        thread::sleep(Duration::from_millis(100));

        // Still serving frames, through at least one reconnect.
        source.latest_frame().unwrap();
        assert!(fixture.opens.load(Ordering::SeqCst) >= 2);
        source.stop();
    }
}
