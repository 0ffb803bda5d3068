//! Viewer session configuration

use std::time::Duration;

use crate::error::{Error, Result};

/// Per-viewer session options
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Delay between consecutive chunks sent to one viewer
    pub cadence: Duration,

    /// Maximum time a single chunk write may take before the viewer is dropped
    pub write_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cadence: Duration::from_millis(150),
            write_timeout: Duration::from_secs(10),
        }
    }
}

impl SessionConfig {
    /// Set the inter-chunk delay
    pub fn cadence(mut self, cadence: Duration) -> Self {
        self.cadence = cadence;
        self
    }

    /// Set the write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Check the config
    pub fn validate(&self) -> Result<()> {
        if self.cadence.is_zero() {
            return Err(Error::Config("session cadence must be non-zero".into()));
        }
        if self.write_timeout.is_zero() {
            return Err(Error::Config("session write timeout must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.cadence, Duration::from_millis(150));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_cadence_rejected() {
        let config = SessionConfig::default().cadence(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
