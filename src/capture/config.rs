//! Capture loop configuration

use std::time::Duration;

use crate::codec::{DEFAULT_QUALITY, MAX_DIMENSION};
use crate::device::DeviceConfig;
use crate::error::{Error, Result};

/// Capture loop configuration options
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Device to open
    pub device: DeviceConfig,

    /// Width of published frames
    pub output_width: u32,

    /// Height of published frames
    pub output_height: u32,

    /// Target time between device reads
    pub capture_interval: Duration,

    /// JPEG quality of published frames
    pub jpeg_quality: u8,

    /// Publish one frame out of every `publish_every` reads
    pub publish_every: u32,

    /// First delay before reopening a failed device
    pub reconnect_delay: Duration,

    /// Upper bound for the reopen delay
    pub max_reconnect_delay: Duration,

    /// Maximum time a device open may take
    pub open_timeout: Duration,

    /// Maximum time a single frame read may take
    pub read_timeout: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            output_width: 640,
            output_height: 480,
            capture_interval: Duration::from_millis(33),
            jpeg_quality: DEFAULT_QUALITY,
            publish_every: 1,
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(10),
            open_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(2),
        }
    }
}

impl CaptureConfig {
    /// Create a config for the given device
    pub fn with_device(device: DeviceConfig) -> Self {
        Self {
            device,
            ..Default::default()
        }
    }

    /// Set the output frame size
    pub fn output_size(mut self, width: u32, height: u32) -> Self {
        self.output_width = width;
        self.output_height = height;
        self
    }

    /// Set the time between device reads
    pub fn capture_interval(mut self, interval: Duration) -> Self {
        self.capture_interval = interval;
        self
    }

    /// Set the JPEG quality
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Publish one frame out of every `n` reads
    pub fn publish_every(mut self, n: u32) -> Self {
        self.publish_every = n;
        self
    }

    /// Set the reopen backoff range
    pub fn reconnect_delay(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_delay = initial;
        self.max_reconnect_delay = max;
        self
    }

    /// Set the device open and read timeouts
    pub fn timeouts(mut self, open: Duration, read: Duration) -> Self {
        self.open_timeout = open;
        self.read_timeout = read;
        self
    }

    /// Check the config
    pub fn validate(&self) -> Result<()> {
        self.device.validate()?;

        if self.output_width == 0 || self.output_height == 0 {
            return Err(Error::Config(format!(
                "output size {}x{} has a zero dimension",
                self.output_width, self.output_height
            )));
        }
        if self.output_width > MAX_DIMENSION || self.output_height > MAX_DIMENSION {
            return Err(Error::Config(format!(
                "output size {}x{} exceeds the JPEG limit of {}",
                self.output_width, self.output_height, MAX_DIMENSION
            )));
        }
        if self.capture_interval.is_zero() {
            return Err(Error::Config("capture interval must be non-zero".into()));
        }
        if self.publish_every == 0 {
            return Err(Error::Config("publish_every must be at least 1".into()));
        }
        if self.reconnect_delay.is_zero() {
            return Err(Error::Config("reconnect delay must be non-zero".into()));
        }
        if self.max_reconnect_delay < self.reconnect_delay {
            return Err(Error::Config(
                "max reconnect delay is shorter than the initial delay".into(),
            ));
        }
        if self.open_timeout.is_zero() || self.read_timeout.is_zero() {
            return Err(Error::Config("device timeouts must be non-zero".into()));
        }
        Ok(())
    }
}
