//! Camera feed broadcasting
//!
//! `camfeed` reads frames from one capture device in a background task and
//! serves them to any number of HTTP viewers as a `multipart/x-mixed-replace`
//! JPEG stream. Viewers never touch the device; they poll a single-slot
//! frame store at their own cadence.
//!
//! # Architecture
//!
//! ```text
//!   CaptureDevice ──► CaptureLoop ──publish──► FrameStore ◄──read── BroadcastSession ──► viewer
//!   (exclusive)       (one per Feed)           (latest wins)        (one per viewer)
//!                                                   │
//!                                  empty? ──► Placeholder
//! ```
//!
//! [`Feed`] is the process-wide context object. It owns the store, the
//! placeholder and the capture task, and starts the task lazily on first use.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use camfeed::device::SyntheticDevice;
//! use camfeed::{Feed, FeedConfig, FeedServer, ServerConfig};
//!
//! # async fn example() -> camfeed::Result<()> {
//! let feed = Feed::new(FeedConfig::default(), Arc::new(SyntheticDevice::new()))?;
//! let server = FeedServer::new(ServerConfig::default(), feed)?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod codec;
pub mod device;
pub mod error;
pub mod feed;
pub mod placeholder;
pub mod server;
pub mod session;
pub mod stats;
pub mod store;

pub use capture::{CaptureConfig, CaptureState};
pub use device::{CaptureDevice, DeviceConfig, DeviceError, DeviceHandle};
pub use error::{Error, Result};
pub use feed::{Feed, FeedConfig};
pub use placeholder::{Placeholder, PlaceholderConfig};
pub use server::{FeedServer, ServerConfig};
pub use session::{BroadcastSession, SessionConfig, SessionEnd};
pub use store::{Frame, FrameStore};
