//! Per-viewer broadcast sessions
//!
//! Sessions are independent of each other and of the capture loop's pace.
//! Each reads the shared store on its own cadence, so two viewers may see
//! different frames at the same moment and a slow viewer simply skips
//! frames.

pub mod broadcast;
pub mod cancel;
pub mod config;

pub use broadcast::{BroadcastSession, Chunk, ChunkSource, SessionEnd};
pub use cancel::CancelToken;
pub use config::SessionConfig;
