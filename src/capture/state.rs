//! Capture loop state machine
//!
//! ```text
//!   Uninitialized ──start──► Opening ──open + first read──► Streaming
//!                             ▲   │                            │
//!                             └───┘ open failed (backoff)      │ read failed
//!                             ▲                                │ (release, backoff)
//!                             └────────────────────────────────┘
//!   any ──shutdown──► Closed
//! ```
//!
//! While `Opening` the store stops receiving frames and viewers fall back to
//! the placeholder; there is no separate degraded state.

use std::fmt;

use tokio::sync::watch;

/// Capture loop lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Loop not started yet
    Uninitialized,
    /// Acquiring the device (first start or after a fault)
    Opening,
    /// Device open and frames flowing
    Streaming,
    /// Loop stopped for process shutdown
    Closed,
}

impl CaptureState {
    /// Whether the loop has been started and not shut down
    pub fn is_running(&self) -> bool {
        matches!(self, CaptureState::Opening | CaptureState::Streaming)
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureState::Uninitialized => "uninitialized",
            CaptureState::Opening => "opening",
            CaptureState::Streaming => "streaming",
            CaptureState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Shared, observable capture state
///
/// Written only by the capture loop (and by shutdown); everyone else reads.
#[derive(Debug)]
pub struct CaptureStatus {
    tx: watch::Sender<CaptureState>,
}

impl CaptureStatus {
    /// Create a status in `Uninitialized`
    pub fn new() -> Self {
        let (tx, _) = watch::channel(CaptureState::Uninitialized);
        Self { tx }
    }

    /// Current state
    pub fn get(&self) -> CaptureState {
        *self.tx.borrow()
    }

    /// Move to `next`
    ///
    /// `Closed` is terminal: once closed, later transitions are ignored.
    /// Returns whether the state changed.
    pub(crate) fn set(&self, next: CaptureState) -> bool {
        let mut prev = next;
        let changed = self.tx.send_if_modified(|state| {
            prev = *state;
            if *state == next || *state == CaptureState::Closed {
                return false;
            }
            *state = next;
            true
        });

        if changed {
            tracing::debug!(from = %prev, to = %next, "Capture state changed");
        }
        changed
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<CaptureState> {
        self.tx.subscribe()
    }
}

impl Default for CaptureStatus {
    fn default() -> Self {
        Self::new()
    }
}
