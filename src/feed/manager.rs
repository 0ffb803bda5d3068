//! Feed lifecycle
//!
//! [`Feed`] is the context object shared by the server and every viewer.
//! It owns the frame store, the placeholder and the capture task, and starts
//! the task at most once, on the first viewer request.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::config::FeedConfig;
use crate::capture::{CaptureLoop, CaptureState, CaptureStatus};
use crate::device::CaptureDevice;
use crate::error::{Error, Result};
use crate::placeholder::Placeholder;
use crate::session::BroadcastSession;
use crate::stats::{CaptureMetrics, CaptureStats};
use crate::store::FrameStore;

/// One camera feed: a device, its capture loop and the viewers' frame store
pub struct Feed {
    config: FeedConfig,
    device: Arc<dyn CaptureDevice>,
    store: Arc<FrameStore>,
    placeholder: Arc<Placeholder>,
    status: Arc<CaptureStatus>,
    metrics: Arc<CaptureMetrics>,
    started: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
    viewer_slots: Option<Arc<Semaphore>>,
    next_session_id: AtomicU64,
}

impl Feed {
    /// Create a feed for `device`
    ///
    /// Nothing touches the device until [`start`](Self::start) or
    /// [`ensure_started`](Self::ensure_started) is called.
    pub fn new(config: FeedConfig, device: Arc<dyn CaptureDevice>) -> Result<Arc<Self>> {
        config.validate()?;

        let viewer_slots = if config.max_viewers > 0 {
            Some(Arc::new(Semaphore::new(config.max_viewers)))
        } else {
            None
        };
        let placeholder = Arc::new(Placeholder::new(config.placeholder.clone()));

        Ok(Arc::new(Self {
            config,
            device,
            store: Arc::new(FrameStore::new()),
            placeholder,
            status: Arc::new(CaptureStatus::new()),
            metrics: Arc::new(CaptureMetrics::new()),
            started: AtomicBool::new(false),
            task: Mutex::new(None),
            viewer_slots,
            next_session_id: AtomicU64::new(1),
        }))
    }

    /// Start the capture loop if it has not been started yet
    ///
    /// Returns `true` only for the call that actually started it. Safe to
    /// call concurrently; exactly one loop is ever created. A feed that has
    /// been shut down never starts again.
    pub fn start(&self) -> bool {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let mut task = self.lock_task();
        if self.status.get() == CaptureState::Closed {
            return false;
        }

        tracing::info!(device = %self.config.capture.device.path, "Starting capture loop");
        let capture = CaptureLoop::new(
            self.config.capture.clone(),
            Arc::clone(&self.device),
            Arc::clone(&self.store),
            Arc::clone(&self.status),
            Arc::clone(&self.metrics),
        );
        *task = Some(capture.spawn());
        true
    }

    /// Start the capture loop, then give it a moment to publish a frame
    ///
    /// Only the call that starts the loop waits, and never longer than the
    /// configured startup wait. Every other call returns at once.
    pub async fn ensure_started(&self) -> bool {
        if !self.start() {
            return false;
        }

        if !self.config.startup_wait.is_zero()
            && self
                .store
                .wait_for_frame(self.config.startup_wait)
                .await
                .is_none()
        {
            tracing::debug!(
                wait_ms = self.config.startup_wait.as_millis() as u64,
                "No frame after startup wait, viewers get the placeholder"
            );
        }
        true
    }

    /// Whether the capture loop has been started and not shut down
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire) && self.status.get().is_running()
    }

    /// Current capture state
    pub fn state(&self) -> CaptureState {
        self.status.get()
    }

    /// Whether viewers are currently served stale or placeholder frames
    /// because the device is being (re)opened
    pub fn is_degraded(&self) -> bool {
        self.status.get() == CaptureState::Opening
    }

    /// Open a viewer session
    ///
    /// Fails with [`Error::TooManyViewers`] when the viewer limit is reached.
    /// The slot is freed when the session is dropped.
    pub fn open_session(&self) -> Result<BroadcastSession> {
        let permit = match &self.viewer_slots {
            Some(slots) => Some(
                Arc::clone(slots)
                    .try_acquire_owned()
                    .map_err(|_| Error::TooManyViewers(self.config.max_viewers))?,
            ),
            None => None,
        };

        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = BroadcastSession::new(
            id,
            Arc::clone(&self.store),
            Arc::clone(&self.placeholder),
            self.config.session.clone(),
        );

        Ok(match permit {
            Some(permit) => session.with_permit(permit),
            None => session,
        })
    }

    /// The latest frame, or the placeholder if none was ever published
    ///
    /// Never waits for a new frame.
    pub fn current_frame(&self) -> Bytes {
        match self.store.read() {
            Some(frame) => frame.data,
            None => self.placeholder.generate(),
        }
    }

    /// Shared frame store
    pub fn store(&self) -> &Arc<FrameStore> {
        &self.store
    }

    /// Placeholder generator
    pub fn placeholder(&self) -> &Arc<Placeholder> {
        &self.placeholder
    }

    /// Feed configuration
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Capture counters
    pub fn capture_stats(&self) -> CaptureStats {
        self.metrics.snapshot()
    }

    /// Number of viewer sessions currently open
    pub fn active_viewers(&self) -> usize {
        match &self.viewer_slots {
            Some(slots) => self.config.max_viewers - slots.available_permits(),
            None => 0,
        }
    }

    /// Stop the capture loop and release the device
    ///
    /// The state becomes `Closed` and stays there.
    pub async fn shutdown(&self) {
        self.started.store(true, Ordering::Release);
        let task = {
            let mut slot = self.lock_task();
            self.status.set(CaptureState::Closed);
            slot.take()
        };

        if let Some(task) = task {
            task.abort();
            let _ = task.await;
            tracing::info!(device = %self.config.capture.device.path, "Capture loop stopped");
        }
    }

    /// Resolve once the feed has been shut down
    pub async fn closed(&self) {
        let mut rx = self.status.subscribe();
        let _ = rx.wait_for(|state| *state == CaptureState::Closed).await;
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        if let Some(task) = self.lock_task().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feed")
            .field("device", &self.config.capture.device.path)
            .field("state", &self.status.get())
            .field("max_viewers", &self.config.max_viewers)
            .finish()
    }
}
