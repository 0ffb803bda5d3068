//! Synthetic test-pattern device
//!
//! Selected with `stub://` paths. Produces RGB24 frames with a gradient
//! background and a bar that moves one step per frame, so a viewer can tell
//! the feed is live without any camera attached.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::{CaptureDevice, DeviceConfig, DeviceError, DeviceHandle, HandleInfo, PixelFormat, RawFrame};

/// Path prefix that selects the synthetic device
pub const STUB_SCHEME: &str = "stub://";

/// Width of the moving bar in pixels
const BAR_WIDTH: u32 = 24;

/// Synthetic capture device
///
/// Like real hardware it is exclusive: a second `open` while a handle is
/// alive fails with [`DeviceError::Unavailable`].
#[derive(Debug, Default)]
pub struct SyntheticDevice {
    in_use: Arc<AtomicBool>,
    opens: AtomicU64,
}

impl SyntheticDevice {
    /// Create a synthetic device
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a handle is currently open
    pub fn is_open(&self) -> bool {
        self.in_use.load(Ordering::SeqCst)
    }

    /// Number of successful opens so far
    pub fn open_count(&self) -> u64 {
        self.opens.load(Ordering::Relaxed)
    }
}

impl CaptureDevice for SyntheticDevice {
    fn open(&self, config: &DeviceConfig) -> Result<Box<dyn DeviceHandle>, DeviceError> {
        if config.width == 0 || config.height == 0 {
            return Err(DeviceError::unavailable(&config.path, "zero resolution"));
        }
        if self
            .in_use
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DeviceError::unavailable(&config.path, "device busy"));
        }

        self.opens.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(device = %config.path, "Synthetic device opened");

        Ok(Box::new(SyntheticHandle {
            info: HandleInfo {
                path: config.path.clone(),
                width: config.width,
                height: config.height,
                fps: config.fps,
                format: PixelFormat::Rgb24,
            },
            frame_index: 0,
            in_use: Arc::clone(&self.in_use),
        }))
    }
}

struct SyntheticHandle {
    info: HandleInfo,
    frame_index: u64,
    in_use: Arc<AtomicBool>,
}

impl SyntheticHandle {
    fn render(&self) -> Vec<u8> {
        let width = self.info.width;
        let height = self.info.height;
        let travel = width.saturating_sub(BAR_WIDTH).max(1);
        let bar_x = (self.frame_index % u64::from(travel)) as u32;

        let mut pixels =
            Vec::with_capacity((width as usize).saturating_mul(height as usize).saturating_mul(3));
        for y in 0..height {
            for x in 0..width {
                if x >= bar_x && x < bar_x + BAR_WIDTH {
                    pixels.extend_from_slice(&[240, 240, 240]);
                } else {
                    let r = (x * 255 / width.max(1)) as u8;
                    let g = (y * 255 / height.max(1)) as u8;
                    pixels.extend_from_slice(&[r, g, 96]);
                }
            }
        }
        pixels
    }
}

impl DeviceHandle for SyntheticHandle {
    fn info(&self) -> &HandleInfo {
        &self.info
    }

    fn read_frame(&mut self) -> Result<RawFrame, DeviceError> {
        let pixels = self.render();
        self.frame_index += 1;
        Ok(RawFrame::new(
            self.info.width,
            self.info.height,
            PixelFormat::Rgb24,
            pixels,
        ))
    }
}

impl Drop for SyntheticHandle {
    fn drop(&mut self) {
        self.in_use.store(false, Ordering::SeqCst);
        tracing::debug!(device = %self.info.path, "Synthetic device released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DeviceConfig {
        DeviceConfig::with_path("stub://test").resolution(64, 48)
    }

    #[test]
    fn test_frames_have_requested_size() {
        let device = SyntheticDevice::new();
        let mut handle = device.open(&config()).unwrap();

        let frame = handle.read_frame().unwrap();
        assert_eq!((frame.width, frame.height), (64, 48));
        assert_eq!(frame.format, PixelFormat::Rgb24);
        assert_eq!(frame.data.len(), 64 * 48 * 3);
    }

    #[test]
    fn test_pattern_moves() {
        let device = SyntheticDevice::new();
        let mut handle = device.open(&config()).unwrap();

        let first = handle.read_frame().unwrap();
        let second = handle.read_frame().unwrap();
        assert_ne!(first.data, second.data);
    }

    #[test]
    fn test_open_is_exclusive() {
        let device = SyntheticDevice::new();
        let handle = device.open(&config()).unwrap();
        assert!(device.is_open());

        let second = device.open(&config());
        assert!(matches!(second, Err(DeviceError::Unavailable { .. })));

        handle.release();
        assert!(!device.is_open());

        // Reopen after release
        assert!(device.open(&config()).is_ok());
        assert_eq!(device.open_count(), 2);
    }
}
