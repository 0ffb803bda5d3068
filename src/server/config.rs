//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5000;

/// Default feed name, served under `/<feed_name>`
pub const DEFAULT_FEED_NAME: &str = "cam";

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// URL path segment the feed is served under
    pub feed_name: String,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Time allowed for a client to send its request head
    pub request_timeout: Duration,

    /// Largest accepted request head in bytes
    pub max_request_bytes: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            feed_name: DEFAULT_FEED_NAME.to_string(),
            max_connections: 0, // Unlimited
            request_timeout: Duration::from_secs(5),
            max_request_bytes: 8 * 1024,
            tcp_nodelay: true, // Parts go out as soon as they are written
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the feed name
    pub fn feed_name(mut self, name: impl Into<String>) -> Self {
        self.feed_name = name.into();
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the request head timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the request head size limit
    pub fn max_request_bytes(mut self, max: usize) -> Self {
        self.max_request_bytes = max;
        self
    }

    /// Check the config
    pub fn validate(&self) -> Result<()> {
        if self.feed_name.is_empty() {
            return Err(Error::Config("feed name must not be empty".into()));
        }
        if !self
            .feed_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::Config(format!(
                "feed name {:?} may only contain letters, digits, '-' and '_'",
                self.feed_name
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Config("request timeout must be non-zero".into()));
        }
        if self.max_request_bytes < 64 {
            return Err(Error::Config(format!(
                "max request bytes {} is too small",
                self.max_request_bytes
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
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 5000);
        assert_eq!(config.feed_name, "cam");
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.max_request_bytes, 8192);
        assert!(config.tcp_nodelay);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:5001".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .feed_name("borah-cam")
            .max_connections(50)
            .request_timeout(Duration::from_secs(2))
            .max_request_bytes(4096);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.feed_name, "borah-cam");
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.max_request_bytes, 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_feed_name_must_be_a_single_segment() {
        assert!(ServerConfig::default().feed_name("").validate().is_err());
        assert!(ServerConfig::default().feed_name("a/b").validate().is_err());
        assert!(ServerConfig::default().feed_name("cam 1").validate().is_err());
    }

    #[test]
    fn test_tiny_request_limit_rejected() {
        let config = ServerConfig::default().max_request_bytes(10);
        assert!(config.validate().is_err());
    }
}
