//! Capture device adapters
//!
//! A [`CaptureDevice`] opens the underlying resource and hands back a
//! [`DeviceHandle`]. Only one handle may be open per device at a time; the
//! capture loop owns it exclusively and releases it before reopening.
//!
//! Device calls are blocking. The capture loop runs them on tokio's blocking
//! pool under a timeout, so adapters never need to be async.
//!
//! Adapters:
//! - [`SyntheticDevice`]: moving test pattern for `stub://` paths
//! - [`ScriptedDevice`]: scripted open/read outcomes for tests
//! - `V4l2Device` (feature `v4l2`): Video4Linux device nodes

pub mod scripted;
pub mod synthetic;
#[cfg(feature = "v4l2")]
pub mod v4l2;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::codec::MAX_DIMENSION;
use crate::error::{Error, Result};

pub use scripted::{Exhausted, ReadOutcome, ScriptedDevice};
pub use synthetic::SyntheticDevice;
#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Device;

/// Pixel layout of a raw frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed 8-bit RGB, 3 bytes per pixel
    Rgb24,
    /// Packed YUV 4:2:2 (Y0 U Y1 V), 2 bytes per pixel
    Yuyv,
    /// Motion-JPEG, one complete JPEG image per frame
    Mjpeg,
}

impl PixelFormat {
    /// V4L2 fourcc code for this format
    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            PixelFormat::Rgb24 => *b"RGB3",
            PixelFormat::Yuyv => *b"YUYV",
            PixelFormat::Mjpeg => *b"MJPG",
        }
    }

    /// Parse a fourcc code
    pub fn from_fourcc(code: &[u8; 4]) -> Option<Self> {
        match code {
            b"RGB3" => Some(PixelFormat::Rgb24),
            b"YUYV" => Some(PixelFormat::Yuyv),
            b"MJPG" => Some(PixelFormat::Mjpeg),
            _ => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.fourcc();
        write!(f, "{}", String::from_utf8_lossy(&code))
    }
}

/// Configuration used when opening a capture device
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Device path (e.g. "/dev/video0" or "stub://pattern")
    pub path: String,

    /// Requested frame width
    pub width: u32,

    /// Requested frame height
    pub height: u32,

    /// Requested frame rate
    pub fps: u32,

    /// Requested pixel format
    pub format: PixelFormat,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: "/dev/video0".to_string(),
            width: 640,
            height: 480,
            fps: 30,
            format: PixelFormat::Mjpeg,
        }
    }
}

impl DeviceConfig {
    /// Create a config for the given device path
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set the requested resolution
    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the requested frame rate
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Set the requested pixel format
    pub fn format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Check the config for values no device can satisfy
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(Error::Config("device path is empty".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "device resolution {}x{} has a zero dimension",
                self.width, self.height
            )));
        }
        if self.width > MAX_DIMENSION || self.height > MAX_DIMENSION {
            return Err(Error::Config(format!(
                "device resolution {}x{} exceeds {} pixels per side",
                self.width, self.height, MAX_DIMENSION
            )));
        }
        Ok(())
    }
}

/// One frame as delivered by the device
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel layout of `data`
    pub format: PixelFormat,
    /// Pixel data
    pub data: Bytes,
}

impl RawFrame {
    /// Create a raw frame
    pub fn new(width: u32, height: u32, format: PixelFormat, data: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            format,
            data: data.into(),
        }
    }
}

/// Properties negotiated when a handle was opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleInfo {
    /// Device path
    pub path: String,
    /// Active frame width
    pub width: u32,
    /// Active frame height
    pub height: u32,
    /// Active frame rate target
    pub fps: u32,
    /// Active pixel format
    pub format: PixelFormat,
}

/// Error type for device operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The device could not be acquired (missing, busy, permission denied)
    Unavailable {
        /// Device path
        device: String,
        /// Underlying reason
        reason: String,
    },
    /// Reading a frame failed
    ReadFailed {
        /// Device path
        device: String,
        /// Underlying reason
        reason: String,
    },
}

impl DeviceError {
    /// Create an `Unavailable` error
    pub fn unavailable(device: impl Into<String>, reason: impl fmt::Display) -> Self {
        DeviceError::Unavailable {
            device: device.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a `ReadFailed` error
    pub fn read_failed(device: impl Into<String>, reason: impl fmt::Display) -> Self {
        DeviceError::ReadFailed {
            device: device.into(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Unavailable { device, reason } => {
                write!(f, "Device unavailable: {} ({})", device, reason)
            }
            DeviceError::ReadFailed { device, reason } => {
                write!(f, "Frame read failed on {}: {}", device, reason)
            }
        }
    }
}

impl std::error::Error for DeviceError {}

/// A capture device that can be opened repeatedly
///
/// `open` must be safe to retry after any failure. Retry policy belongs to
/// the caller.
pub trait CaptureDevice: Send + Sync + 'static {
    /// Acquire the device and configure it
    fn open(&self, config: &DeviceConfig) -> std::result::Result<Box<dyn DeviceHandle>, DeviceError>;
}

/// An open, exclusively owned device
///
/// Dropping the handle releases the device.
pub trait DeviceHandle: Send + 'static {
    /// Negotiated device properties
    fn info(&self) -> &HandleInfo;

    /// Block until the next frame is available
    ///
    /// Does not retry internally.
    fn read_frame(&mut self) -> std::result::Result<RawFrame, DeviceError>;

    /// Release the device
    fn release(self: Box<Self>) {}
}

/// Pick an adapter for a device path
///
/// `stub://` paths get the synthetic pattern generator. Anything else needs
/// the `v4l2` feature.
pub fn for_path(path: &str) -> Result<Arc<dyn CaptureDevice>> {
    if path.starts_with(synthetic::STUB_SCHEME) {
        return Ok(Arc::new(SyntheticDevice::new()));
    }
    hardware_device(path)
}

#[cfg(feature = "v4l2")]
fn hardware_device(_path: &str) -> Result<Arc<dyn CaptureDevice>> {
    Ok(Arc::new(V4l2Device::new()))
}

#[cfg(not(feature = "v4l2"))]
fn hardware_device(path: &str) -> Result<Arc<dyn CaptureDevice>> {
    Err(Error::Config(format!(
        "device '{}' needs the `v4l2` feature; use a stub:// path for the synthetic source",
        path
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_roundtrip() {
        for format in [PixelFormat::Rgb24, PixelFormat::Yuyv, PixelFormat::Mjpeg] {
            assert_eq!(PixelFormat::from_fourcc(&format.fourcc()), Some(format));
        }
        assert_eq!(PixelFormat::from_fourcc(b"H264"), None);
        assert_eq!(PixelFormat::Mjpeg.to_string(), "MJPG");
    }

    #[test]
    fn test_device_config_builder() {
        let config = DeviceConfig::with_path("stub://test")
            .resolution(320, 240)
            .fps(15)
            .format(PixelFormat::Yuyv);

        assert_eq!(config.path, "stub://test");
        assert_eq!((config.width, config.height), (320, 240));
        assert_eq!(config.fps, 15);
        assert_eq!(config.format, PixelFormat::Yuyv);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_device_config_rejects_zero_resolution() {
        let config = DeviceConfig::default().resolution(0, 480);
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = DeviceConfig::with_path("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_device_config_rejects_oversized_resolution() {
        let config = DeviceConfig::default().resolution(70_000, 480);
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = DeviceConfig::default().resolution(MAX_DIMENSION, 480);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_for_path_stub() {
        assert!(for_path("stub://pattern").is_ok());
    }

    #[cfg(not(feature = "v4l2"))]
    #[test]
    fn test_for_path_without_v4l2() {
        assert!(matches!(for_path("/dev/video0"), Err(Error::Config(_))));
    }
}
