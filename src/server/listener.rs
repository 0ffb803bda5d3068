//! Feed server listener
//!
//! Handles the TCP accept loop and spawns one task per connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::{is_disconnect, Result};
use crate::feed::Feed;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::stats::{ServerMetrics, ServerStats};

/// Pause after a failed accept before trying again
const ACCEPT_ERROR_DELAY: Duration = Duration::from_millis(100);

/// HTTP server for one camera feed
pub struct FeedServer {
    config: Arc<ServerConfig>,
    feed: Arc<Feed>,
    metrics: Arc<ServerMetrics>,
    next_connection_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl FeedServer {
    /// Create a new server for `feed`
    pub fn new(config: ServerConfig, feed: Arc<Feed>) -> Result<Self> {
        config.validate()?;

        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Ok(Self {
            config: Arc::new(config),
            feed,
            metrics: Arc::new(ServerMetrics::new()),
            next_connection_id: AtomicU64::new(1),
            connection_semaphore,
        })
    }

    /// The feed being served
    pub fn feed(&self) -> &Arc<Feed> {
        &self.feed
    }

    /// Server statistics
    pub fn stats(&self) -> ServerStats {
        self.metrics.snapshot()
    }

    /// Bind the configured address
    ///
    /// Use with [`serve`](Self::serve) when the bound address is needed
    /// before serving, e.g. when binding port 0.
    pub async fn bind(&self) -> Result<TcpListener> {
        Ok(TcpListener::bind(self.config.bind_addr).await?)
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Run the server with graceful shutdown
    ///
    /// When `shutdown` resolves the server stops accepting, the feed is shut
    /// down and every open stream ends.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = self.bind().await?;
        self.serve_until(listener, shutdown).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        self.log_listening(&listener);
        self.accept_loop(&listener).await
    }

    /// Serve connections from an already bound listener until `shutdown`
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        self.log_listening(&listener);

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        self.feed.shutdown().await;
        result
    }

    fn log_listening(&self, listener: &TcpListener) {
        let addr = listener.local_addr().unwrap_or(self.config.bind_addr);
        tracing::info!(
            addr = %addr,
            feed = %self.config.feed_name,
            "Feed server listening"
        );
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_ERROR_DELAY).await;
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            connection_id = connection_id,
            peer = %peer_addr,
            "New connection"
        );

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let config = Arc::clone(&self.config);
        let feed = Arc::clone(&self.feed);
        let metrics = Arc::clone(&self.metrics);

        tokio::spawn(async move {
            let _permit = permit;
            metrics.connection_opened();

            let connection = Connection::new(
                connection_id,
                socket,
                peer_addr,
                config,
                feed,
                Arc::clone(&metrics),
            );

            if let Err(e) = connection.run().await {
                if is_disconnect(&e) {
                    tracing::debug!(connection_id = connection_id, "Peer went away");
                } else {
                    tracing::debug!(
                        connection_id = connection_id,
                        error = %e,
                        "Connection error"
                    );
                }
            }

            metrics.connection_closed();
            tracing::debug!(connection_id = connection_id, "Connection closed");
        });
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
