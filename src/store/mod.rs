//! Single-slot frame store
//!
//! The store holds the most recent encoded frame and nothing else. The
//! capture loop is the only writer; every broadcast session reads it on its
//! own cadence.
//!
//! ```text
//!                         Arc<FrameStore>
//!                    ┌──────────────────────┐
//!   CaptureLoop ───► │ watch::Sender<       │ ◄─── BroadcastSession (read)
//!   publish()        │   Option<Frame>>     │ ◄─── BroadcastSession (read)
//!                    └──────────────────────┘ ◄─── test-frame    (read)
//! ```
//!
//! # Latest wins
//!
//! A publish replaces the slot in one step under the channel's lock; readers
//! clone the `Frame` out (a reference-count bump on `Bytes`) and never see a
//! partial frame. Nothing is queued, so slow readers skip frames.

pub mod frame;
pub mod slot;

pub use frame::Frame;
pub use slot::FrameStore;
