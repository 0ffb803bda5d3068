//! Per-viewer broadcast session
//!
//! A session is a lazy, endless, non-restartable sequence of multipart
//! chunks. Each step reads the store (or the placeholder when it is empty),
//! wraps the payload, and hands it out; the cadence delay separates steps.
//! The first chunk is produced without waiting.

use std::fmt;
use std::io;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::OwnedSemaphorePermit;

use super::cancel::CancelToken;
use super::config::SessionConfig;
use crate::codec::encode_part;
use crate::error::is_disconnect;
use crate::placeholder::Placeholder;
use crate::stats::SessionStats;
use crate::store::FrameStore;

/// Where a chunk's payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSource {
    /// A live frame with this store sequence number
    Live {
        /// Store sequence number
        seq: u64,
    },
    /// The placeholder image
    Placeholder,
}

/// One multipart part ready for the wire
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Payload origin
    pub source: ChunkSource,
    /// Encoded part, envelope included
    pub data: Bytes,
}

/// How a streaming session ended
#[derive(Debug)]
pub enum SessionEnd {
    /// The viewer closed the connection
    ViewerDisconnected,
    /// The session was cancelled (watcher, shutdown)
    Cancelled,
    /// A chunk write did not complete in time
    WriteTimedOut,
    /// Any other transport failure
    Failed(io::Error),
}

impl SessionEnd {
    /// Whether this is a normal end of a viewer's connection
    pub fn is_expected(&self) -> bool {
        matches!(self, SessionEnd::ViewerDisconnected | SessionEnd::Cancelled)
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::ViewerDisconnected => write!(f, "viewer disconnected"),
            SessionEnd::Cancelled => write!(f, "cancelled"),
            SessionEnd::WriteTimedOut => write!(f, "write timed out"),
            SessionEnd::Failed(e) => write!(f, "transport error: {}", e),
        }
    }
}

enum WriteOutcome {
    Written,
    Failed(io::Error),
    TimedOut,
    Cancelled,
}

/// One viewer's stream of chunks
pub struct BroadcastSession {
    id: u64,
    store: Arc<FrameStore>,
    placeholder: Arc<Placeholder>,
    config: SessionConfig,
    cancel: CancelToken,
    started: bool,
    last_seq: Option<u64>,
    stats: SessionStats,
    _permit: Option<OwnedSemaphorePermit>,
}

impl BroadcastSession {
    /// Create a session reading from `store`
    pub fn new(
        id: u64,
        store: Arc<FrameStore>,
        placeholder: Arc<Placeholder>,
        config: SessionConfig,
    ) -> Self {
        Self {
            id,
            store,
            placeholder,
            config,
            cancel: CancelToken::new(),
            started: false,
            last_seq: None,
            stats: SessionStats::new(),
            _permit: None,
        }
    }

    /// Hold a viewer-limit permit for the lifetime of the session
    pub(crate) fn with_permit(mut self, permit: OwnedSemaphorePermit) -> Self {
        self._permit = Some(permit);
        self
    }

    /// Session ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Token that ends this session when cancelled
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Session statistics
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Produce the next chunk
    ///
    /// Waits one cadence interval except for the very first chunk. Returns
    /// `None` once the session is cancelled; after that it keeps returning
    /// `None`.
    pub async fn next_chunk(&mut self) -> Option<Chunk> {
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }

            if self.started {
                tokio::select! {
                    _ = self.cancel.cancelled() => return None,
                    _ = tokio::time::sleep(self.config.cadence) => {}
                }
                if self.cancel.is_cancelled() {
                    return None;
                }
            }
            self.started = true;

            if let Some(chunk) = self.produce() {
                return Some(chunk);
            }
        }
    }

    /// Build one chunk from the store, `None` if this step has to be skipped
    fn produce(&mut self) -> Option<Chunk> {
        let (source, payload) = match self.store.read() {
            Some(frame) => {
                if let Some(last) = self.last_seq {
                    if frame.seq > last + 1 {
                        self.stats.frames_skipped += frame.seq - last - 1;
                    } else if frame.seq == last {
                        self.stats.repeated_frames += 1;
                    }
                }
                self.last_seq = Some(frame.seq);
                (ChunkSource::Live { seq: frame.seq }, frame.data)
            }
            None => (ChunkSource::Placeholder, self.placeholder.generate()),
        };

        if payload.is_empty() {
            tracing::warn!(session_id = self.id, source = ?source, "Empty payload, skipping chunk");
            return None;
        }

        self.stats.chunks_sent += 1;
        match source {
            ChunkSource::Live { .. } => self.stats.live_chunks += 1,
            ChunkSource::Placeholder => self.stats.placeholder_chunks += 1,
        }

        Some(Chunk {
            source,
            data: encode_part(&payload),
        })
    }

    /// Write chunks to `writer` until the viewer goes away
    ///
    /// Never returns an error: every way the session can end is reported as
    /// a [`SessionEnd`] and logged here.
    pub async fn stream_to<W>(mut self, writer: &mut W) -> SessionEnd
    where
        W: AsyncWrite + Unpin,
    {
        tracing::debug!(session_id = self.id, "Viewer session streaming");

        let end = loop {
            let Some(chunk) = self.next_chunk().await else {
                break SessionEnd::Cancelled;
            };

            let write = async {
                writer.write_all(&chunk.data).await?;
                writer.flush().await
            };

            let outcome = tokio::select! {
                result = tokio::time::timeout(self.config.write_timeout, write) => match result {
                    Ok(Ok(())) => WriteOutcome::Written,
                    Ok(Err(e)) => WriteOutcome::Failed(e),
                    Err(_) => WriteOutcome::TimedOut,
                },
                _ = self.cancel.cancelled() => WriteOutcome::Cancelled,
            };

            match outcome {
                WriteOutcome::Written => self.stats.bytes_sent += chunk.data.len() as u64,
                WriteOutcome::Failed(e) if is_disconnect(&e) => {
                    break SessionEnd::ViewerDisconnected
                }
                WriteOutcome::Failed(e) => break SessionEnd::Failed(e),
                WriteOutcome::TimedOut => break SessionEnd::WriteTimedOut,
                WriteOutcome::Cancelled => break SessionEnd::Cancelled,
            }
        };

        self.cancel.cancel();
        self.log_end(&end);
        end
    }

    fn log_end(&self, end: &SessionEnd) {
        let stats = &self.stats;
        match end {
            SessionEnd::ViewerDisconnected | SessionEnd::Cancelled => {
                tracing::debug!(
                    session_id = self.id,
                    reason = %end,
                    chunks = stats.chunks_sent,
                    live = stats.live_chunks,
                    placeholder = stats.placeholder_chunks,
                    skipped = stats.frames_skipped,
                    bytes = stats.bytes_sent,
                    duration_ms = stats.duration().as_millis() as u64,
                    "Viewer session ended"
                );
            }
            SessionEnd::WriteTimedOut => {
                tracing::warn!(
                    session_id = self.id,
                    timeout_ms = self.config.write_timeout.as_millis() as u64,
                    "Viewer too slow, session dropped"
                );
            }
            SessionEnd::Failed(e) => {
                tracing::error!(session_id = self.id, error = %e, "Viewer session failed");
            }
        }
    }
}

impl fmt::Debug for BroadcastSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastSession")
            .field("id", &self.id)
            .field("cadence", &self.config.cadence)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("last_seq", &self.last_seq)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::placeholder::PlaceholderConfig;

    fn session(store: &Arc<FrameStore>) -> (BroadcastSession, Arc<Placeholder>) {
        let placeholder = Arc::new(Placeholder::new(PlaceholderConfig::default().size(64, 48)));
        let session = BroadcastSession::new(
            1,
            Arc::clone(store),
            Arc::clone(&placeholder),
            SessionConfig::default().write_timeout(Duration::from_secs(1)),
        );
        (session, placeholder)
    }

    #[tokio::test(start_paused = true)]
    async fn test_placeholder_when_store_empty() {
        let store = Arc::new(FrameStore::new());
        let (mut session, placeholder) = session(&store);

        for _ in 0..3 {
            let chunk = session.next_chunk().await.unwrap();
            assert_eq!(chunk.source, ChunkSource::Placeholder);
            assert_eq!(chunk.data, encode_part(&placeholder.generate()));
        }
        assert_eq!(session.stats().placeholder_chunks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_frame_wrapped() {
        let store = Arc::new(FrameStore::new());
        store.publish(Bytes::from_static(b"\xFF\xD8jpeg\xFF\xD9"));
        let (mut session, _) = session(&store);

        let chunk = session.next_chunk().await.unwrap();
        assert_eq!(chunk.source, ChunkSource::Live { seq: 1 });
        assert_eq!(chunk.data, encode_part(b"\xFF\xD8jpeg\xFF\xD9"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cadence_between_chunks() {
        let store = Arc::new(FrameStore::new());
        let (mut session, _) = session(&store);

        let start = Instant::now();
        session.next_chunk().await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);

        session.next_chunk().await.unwrap();
        session.next_chunk().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_frames_but_never_goes_back() {
        let store = Arc::new(FrameStore::new());
        let (mut session, _) = session(&store);

        store.publish(Bytes::from_static(b"1"));
        let first = session.next_chunk().await.unwrap();
        assert_eq!(first.source, ChunkSource::Live { seq: 1 });

        for payload in [&b"2"[..], b"3", b"4"] {
            store.publish(Bytes::copy_from_slice(payload));
        }
        let second = session.next_chunk().await.unwrap();
        assert_eq!(second.source, ChunkSource::Live { seq: 4 });

        let third = session.next_chunk().await.unwrap();
        assert_eq!(third.source, ChunkSource::Live { seq: 4 });

        assert_eq!(session.stats().frames_skipped, 2);
        assert_eq!(session.stats().repeated_frames, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_wait() {
        let store = Arc::new(FrameStore::new());
        let (mut session, _) = session(&store);
        session.next_chunk().await.unwrap();

        let token = session.cancel_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let start = Instant::now();
        assert!(session.next_chunk().await.is_none());
        assert!(start.elapsed() < Duration::from_millis(150));

        // Not restartable
        assert!(session.next_chunk().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_broken_pipe_ends_session_quietly() {
        let store = Arc::new(FrameStore::new());
        let (session, placeholder) = session(&store);
        let expected = encode_part(&placeholder.generate());

        let mut viewer = tokio_test::io::Builder::new()
            .write(&expected)
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "viewer gone"))
            .build();

        let end = session.stream_to(&mut viewer).await;
        assert!(matches!(end, SessionEnd::ViewerDisconnected));
        assert!(end.is_expected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_reset_ends_session_quietly() {
        let store = Arc::new(FrameStore::new());
        let (session, _) = session(&store);

        let mut viewer = tokio_test::io::Builder::new()
            .write_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();

        assert!(matches!(
            session.stream_to(&mut viewer).await,
            SessionEnd::ViewerDisconnected
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_write_error_reported() {
        let store = Arc::new(FrameStore::new());
        let (session, _) = session(&store);

        let mut viewer = tokio_test::io::Builder::new()
            .write_error(io::Error::new(io::ErrorKind::Other, "disk on fire"))
            .build();

        let end = session.stream_to(&mut viewer).await;
        assert!(matches!(end, SessionEnd::Failed(_)));
        assert!(!end.is_expected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_viewer_times_out() {
        let store = Arc::new(FrameStore::new());
        let (session, _) = session(&store);

        let mut viewer = tokio_test::io::Builder::new()
            .wait(Duration::from_secs(60))
            .build();

        assert!(matches!(
            session.stream_to(&mut viewer).await,
            SessionEnd::WriteTimedOut
        ));
    }
}
