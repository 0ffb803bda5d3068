//! Background capture loop
//!
//! One loop per [`Feed`](crate::Feed). It owns the capture device
//! exclusively, keeps the [`FrameStore`](crate::FrameStore) filled with the
//! latest encoded frame, and recovers from device faults on its own.

pub mod backoff;
pub mod config;
pub mod state;
pub mod worker;

pub use backoff::Backoff;
pub use config::CaptureConfig;
pub use state::{CaptureState, CaptureStatus};
pub use worker::CaptureLoop;
