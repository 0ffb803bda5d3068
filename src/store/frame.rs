//! Published frame type

use std::time::{Duration, Instant};

use bytes::Bytes;

/// An encoded frame held by the store
///
/// Cheap to clone: `data` is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Publish sequence number, starting at 1 and increasing by one per publish
    pub seq: u64,
    /// JPEG bytes
    pub data: Bytes,
    /// When the frame was published
    pub published_at: Instant,
}

impl Frame {
    /// Time since the frame was published
    pub fn age(&self) -> Duration {
        self.published_at.elapsed()
    }

    /// Size of the encoded frame in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the frame carries no data
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
