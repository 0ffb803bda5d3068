//! Frame store implementation

use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::watch;

use super::frame::Frame;

/// Single-slot holder of the latest encoded frame
///
/// Backed by a `tokio::sync::watch` channel: publishing swaps the slot under
/// a short write lock and readers take a snapshot under a short read lock.
/// The writer never waits on readers.
#[derive(Debug)]
pub struct FrameStore {
    slot: watch::Sender<Option<Frame>>,
}

impl FrameStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self { slot }
    }

    /// Replace the stored frame
    ///
    /// Returns the new sequence number, or `None` if `data` is empty (an
    /// empty payload is never stored).
    pub fn publish(&self, data: Bytes) -> Option<u64> {
        if data.is_empty() {
            tracing::debug!("Ignoring empty frame publish");
            return None;
        }

        let mut seq = 0;
        self.slot.send_modify(|slot| {
            seq = slot.as_ref().map_or(1, |prev| prev.seq + 1);
            *slot = Some(Frame {
                seq,
                data,
                published_at: Instant::now(),
            });
        });

        tracing::trace!(seq, "Frame published");
        Some(seq)
    }

    /// Snapshot of the latest frame, `None` if nothing was ever published
    pub fn read(&self) -> Option<Frame> {
        self.slot.borrow().clone()
    }

    /// Sequence number of the latest frame (0 when empty)
    pub fn latest_seq(&self) -> u64 {
        self.slot.borrow().as_ref().map_or(0, |frame| frame.seq)
    }

    /// When the latest frame was published
    pub fn last_updated(&self) -> Option<Instant> {
        self.slot.borrow().as_ref().map(|frame| frame.published_at)
    }

    /// Whether a frame has ever been published
    pub fn is_empty(&self) -> bool {
        self.slot.borrow().is_none()
    }

    /// Wait up to `timeout` for the store to hold a frame
    ///
    /// Returns immediately if a frame is already present.
    pub async fn wait_for_frame(&self, timeout: Duration) -> Option<Frame> {
        let mut rx = self.slot.subscribe();
        let frame = match tokio::time::timeout(timeout, rx.wait_for(|slot| slot.is_some())).await {
            Ok(Ok(slot)) => (*slot).clone(),
            _ => None,
        };
        frame
    }

    /// Receiver notified on every publish
    pub fn subscribe(&self) -> watch::Receiver<Option<Frame>> {
        self.slot.subscribe()
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_read_before_publish() {
        let store = FrameStore::new();
        assert!(store.read().is_none());
        assert!(store.is_empty());
        assert_eq!(store.latest_seq(), 0);
        assert!(store.last_updated().is_none());
    }

    #[test]
    fn test_publish_then_read() {
        let store = FrameStore::new();

        let seq = store.publish(Bytes::from_static(b"one")).unwrap();
        assert_eq!(seq, 1);

        // Repeated reads return the same frame until the next publish
        for _ in 0..3 {
            let frame = store.read().unwrap();
            assert_eq!(frame.seq, 1);
            assert_eq!(frame.data, Bytes::from_static(b"one"));
        }

        assert_eq!(store.publish(Bytes::from_static(b"two")), Some(2));
        let frame = store.read().unwrap();
        assert_eq!(frame.seq, 2);
        assert_eq!(frame.data, Bytes::from_static(b"two"));
        assert!(store.last_updated().is_some());
    }

    #[test]
    fn test_empty_publish_ignored() {
        let store = FrameStore::new();
        store.publish(Bytes::from_static(b"frame")).unwrap();

        assert_eq!(store.publish(Bytes::new()), None);

        let frame = store.read().unwrap();
        assert_eq!(frame.seq, 1);
        assert_eq!(frame.data, Bytes::from_static(b"frame"));
    }

    #[tokio::test]
    async fn test_wait_for_frame_times_out() {
        let store = FrameStore::new();
        let frame = store.wait_for_frame(Duration::from_millis(20)).await;
        assert!(frame.is_none());
    }

    #[tokio::test]
    async fn test_wait_for_frame_wakes_on_publish() {
        let store = Arc::new(FrameStore::new());

        let writer = Arc::clone(&store);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            writer.publish(Bytes::from_static(b"late"));
        });

        let frame = store.wait_for_frame(Duration::from_secs(5)).await.unwrap();
        assert_eq!(frame.data, Bytes::from_static(b"late"));
    }

    #[test]
    fn test_concurrent_readers_see_whole_frames() {
        let store = Arc::new(FrameStore::new());

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let mut last_seq = 0;
                    for _ in 0..2_000 {
                        if let Some(frame) = store.read() {
                            // Payload is the seq repeated; a torn read would mix values
                            let expected = vec![(frame.seq % 251) as u8; 64];
                            assert_eq!(&frame.data[..], &expected[..]);
                            assert!(frame.seq >= last_seq);
                            last_seq = frame.seq;
                        }
                    }
                })
            })
            .collect();

        for seq in 1..=500u64 {
            store.publish(Bytes::from(vec![(seq % 251) as u8; 64]));
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.latest_seq(), 500);
    }
}
