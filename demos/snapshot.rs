//! Grab one frame from a capture device and write it as JPEG
//!
//! Run with: cargo run --example snapshot [DEVICE] [OUTPUT]
//!
//! Examples:
//!   cargo run --example snapshot                               # stub://pattern -> snapshot.jpg
//!   cargo run --features v4l2 --example snapshot /dev/video0 cam.jpg
//!
//! Falls back to the placeholder image if the device produces nothing
//! within a few seconds.

use std::time::Duration;

use camfeed::device;
use camfeed::{CaptureConfig, DeviceConfig, Feed, FeedConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let device_path = args.get(1).map(String::as_str).unwrap_or("stub://pattern");
    let output = args.get(2).map(String::as_str).unwrap_or("snapshot.jpg");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("camfeed=info".parse()?),
        )
        .init();

    let device = device::for_path(device_path)?;
    let capture = CaptureConfig::with_device(DeviceConfig::with_path(device_path));
    let config = FeedConfig::default()
        .capture(capture)
        .startup_wait(Duration::from_secs(3));
    let feed = Feed::new(config, device)?;

    feed.ensure_started().await;
    let live = !feed.store().is_empty();
    let frame = feed.current_frame();
    feed.shutdown().await;

    tokio::fs::write(output, &frame).await?;
    println!(
        "Wrote {} bytes to {} ({})",
        frame.len(),
        output,
        if live { "live frame" } else { "placeholder" }
    );

    let stats = feed.capture_stats();
    println!(
        "Stats: read={} published={} open_failures={}",
        stats.frames_read, stats.frames_published, stats.open_failures
    );

    Ok(())
}
