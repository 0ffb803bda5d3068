//! Feed lifecycle management
//!
//! A feed ties one capture device to one frame store. The capture loop is
//! started lazily by the first viewer and runs until the feed is shut down;
//! viewer sessions come and go without affecting it.

pub mod config;
pub mod manager;

pub use config::FeedConfig;
pub use manager::Feed;
