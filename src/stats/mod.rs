//! Statistics and metrics

pub mod metrics;

pub use metrics::{CaptureMetrics, CaptureStats, ServerMetrics, ServerStats, SessionStats};
