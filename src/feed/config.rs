//! Feed configuration

use std::time::Duration;

use crate::capture::CaptureConfig;
use crate::error::{Error, Result};
use crate::placeholder::PlaceholderConfig;
use crate::session::SessionConfig;

/// Configuration for one camera feed
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Capture loop options
    pub capture: CaptureConfig,

    /// Per-viewer session options
    pub session: SessionConfig,

    /// Placeholder appearance
    pub placeholder: PlaceholderConfig,

    /// How long the first starter waits for an initial frame
    pub startup_wait: Duration,

    /// Maximum concurrent viewer sessions (0 = unlimited)
    pub max_viewers: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        let capture = CaptureConfig::default();
        let placeholder = PlaceholderConfig::default()
            .size(capture.output_width, capture.output_height);

        Self {
            capture,
            session: SessionConfig::default(),
            placeholder,
            startup_wait: Duration::from_secs(1),
            max_viewers: 64,
        }
    }
}

impl FeedConfig {
    /// Set the capture options
    ///
    /// The placeholder follows the capture output size and quality so both
    /// kinds of frames look alike on the wire.
    pub fn capture(mut self, capture: CaptureConfig) -> Self {
        self.placeholder = self
            .placeholder
            .size(capture.output_width, capture.output_height);
        self.placeholder.quality = capture.jpeg_quality;
        self.capture = capture;
        self
    }

    /// Set the session options
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Set the placeholder message
    pub fn placeholder_message(mut self, message: impl Into<String>) -> Self {
        self.placeholder = self.placeholder.message(message);
        self
    }

    /// Set the startup wait (zero disables it)
    pub fn startup_wait(mut self, wait: Duration) -> Self {
        self.startup_wait = wait;
        self
    }

    /// Set the viewer limit (0 = unlimited)
    pub fn max_viewers(mut self, max: usize) -> Self {
        self.max_viewers = max;
        self
    }

    /// Check every nested config
    pub fn validate(&self) -> Result<()> {
        self.capture.validate()?;
        self.session.validate()?;
        self.placeholder.validate()?;

        let live = (self.capture.output_width, self.capture.output_height);
        let placeholder = (self.placeholder.width, self.placeholder.height);
        if live != placeholder {
            return Err(Error::Config(format!(
                "placeholder size {}x{} differs from capture output {}x{}",
                placeholder.0, placeholder.1, live.0, live.1
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FeedConfig::default();
        assert_eq!(config.max_viewers, 64);
        assert_eq!(config.startup_wait, Duration::from_secs(1));
        assert_eq!(config.placeholder.width, config.capture.output_width);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_placeholder_follows_capture_size() {
        let config = FeedConfig::default()
            .capture(CaptureConfig::default().output_size(320, 240).jpeg_quality(50));

        assert_eq!(config.placeholder.width, 320);
        assert_eq!(config.placeholder.height, 240);
        assert_eq!(config.placeholder.quality, 50);
    }

    #[test]
    fn test_placeholder_size_must_match_output() {
        let mut config = FeedConfig::default();
        config.placeholder = PlaceholderConfig::default().size(100, 50);
        assert!(config.validate().is_err());

        config.placeholder = PlaceholderConfig::default().size(640, 480);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nested_errors_surface() {
        let config = FeedConfig::default().session(SessionConfig::default().cadence(Duration::ZERO));
        assert!(config.validate().is_err());
    }
}
