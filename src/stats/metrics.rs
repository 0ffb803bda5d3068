//! Statistics for the capture loop, viewer sessions and the server

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters updated by the capture loop
#[derive(Debug, Default)]
pub struct CaptureMetrics {
    frames_read: AtomicU64,
    frames_published: AtomicU64,
    frames_decimated: AtomicU64,
    encode_failures: AtomicU64,
    read_failures: AtomicU64,
    open_failures: AtomicU64,
    reconnects: AtomicU64,
    bytes_published: AtomicU64,
}

impl CaptureMetrics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_read(&self) {
        self.frames_read.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_published(&self, bytes: usize) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
        self.bytes_published.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_decimated(&self) {
        self.frames_decimated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_encode_failure(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_read_failure(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_open_failure(&self) {
        self.open_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            frames_read: self.frames_read.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            frames_decimated: self.frames_decimated.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            open_failures: self.open_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            bytes_published: self.bytes_published.load(Ordering::Relaxed),
        }
    }
}

/// Capture loop statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Frames read from the device
    pub frames_read: u64,
    /// Frames encoded and published to the store
    pub frames_published: u64,
    /// Frames dropped by decimation
    pub frames_decimated: u64,
    /// Frames dropped because encoding failed
    pub encode_failures: u64,
    /// Failed device reads
    pub read_failures: u64,
    /// Failed device opens
    pub open_failures: u64,
    /// Times the device was released and reopened after a fault
    pub reconnects: u64,
    /// Total encoded bytes published
    pub bytes_published: u64,
}

impl CaptureStats {
    /// Average encoded frame size in bytes
    pub fn average_frame_size(&self) -> u64 {
        if self.frames_published > 0 {
            self.bytes_published / self.frames_published
        } else {
            0
        }
    }
}

/// Per-viewer session statistics
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// Session start time
    pub started_at: Instant,
    /// Chunks produced
    pub chunks_sent: u64,
    /// Chunks carrying a live frame
    pub live_chunks: u64,
    /// Chunks carrying the placeholder
    pub placeholder_chunks: u64,
    /// Live frames published but never seen by this viewer
    pub frames_skipped: u64,
    /// Chunks carrying the same live frame as the previous chunk
    pub repeated_frames: u64,
    /// Bytes written to the viewer
    pub bytes_sent: u64,
}

impl SessionStats {
    /// Create stats for a session starting now
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            chunks_sent: 0,
            live_chunks: 0,
            placeholder_chunks: 0,
            frames_skipped: 0,
            repeated_frames: 0,
            bytes_sent: 0,
        }
    }

    /// Session duration so far
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Average output bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration().as_secs();
        if secs > 0 {
            (self.bytes_sent * 8) / secs
        } else {
            0
        }
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Live counters updated by the HTTP server
#[derive(Debug)]
pub struct ServerMetrics {
    started_at: Instant,
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    total_viewers: AtomicU64,
    active_viewers: AtomicU64,
    rejected_viewers: AtomicU64,
}

impl ServerMetrics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            total_viewers: AtomicU64::new(0),
            active_viewers: AtomicU64::new(0),
            rejected_viewers: AtomicU64::new(0),
        }
    }

    pub(crate) fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn viewer_opened(&self) {
        self.total_viewers.fetch_add(1, Ordering::Relaxed);
        self.active_viewers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn viewer_closed(&self) {
        self.active_viewers.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn viewer_rejected(&self) {
        self.rejected_viewers.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> ServerStats {
        ServerStats {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            total_viewers: self.total_viewers.load(Ordering::Relaxed),
            active_viewers: self.active_viewers.load(Ordering::Relaxed),
            rejected_viewers: self.rejected_viewers.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Server-wide statistics
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// Connections accepted
    pub total_connections: u64,
    /// Connections currently open
    pub active_connections: u64,
    /// Streaming sessions ever opened
    pub total_viewers: u64,
    /// Streaming sessions currently open
    pub active_viewers: u64,
    /// Streaming requests refused by the viewer limit
    pub rejected_viewers: u64,
    /// Time since the server started
    pub uptime: Duration,
}
