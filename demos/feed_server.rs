//! Camera feed server example
//!
//! Run with: cargo run --example feed_server [BIND_ADDR] [DEVICE]
//!
//! Examples:
//!   cargo run --example feed_server                          # 0.0.0.0:5000, stub://pattern
//!   cargo run --example feed_server localhost                # 127.0.0.1:5000
//!   cargo run --features v4l2 --example feed_server 0.0.0.0:5000 /dev/video0
//!
//! ## Watching
//!
//! Browser:  http://localhost:5000/cam
//! ffplay:   ffplay http://localhost:5000/cam/stream
//! Still:    curl -o frame.jpg http://localhost:5000/cam/test-frame
//!
//! ## Features
//!
//! - The camera is opened on the first request, not at startup
//! - Unplugging the camera shows a placeholder until it comes back
//! - Every viewer gets its own pace; slow viewers skip frames

use std::net::SocketAddr;
use std::time::Duration;

use camfeed::device;
use camfeed::{CaptureConfig, DeviceConfig, Feed, FeedConfig, FeedServer, ServerConfig};

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_DEVICE: &str = "stub://pattern";

/// Parse bind address from string, supporting:
/// - Full socket address: "127.0.0.1:5000"
/// - IP only (uses default port): "127.0.0.1"
/// - "localhost" (resolves to 127.0.0.1)
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: feed_server [BIND_ADDR] [DEVICE]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:5000)");
    eprintln!("  DEVICE       Capture device (default: {})", DEFAULT_DEVICE);
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  feed_server                           # synthetic test pattern");
    eprintln!("  feed_server localhost:5001            # binds to 127.0.0.1:5001");
    eprintln!("  feed_server 0.0.0.0:5000 /dev/video0  # V4L2 camera (needs --features v4l2)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
    };
    let device_path = args.get(2).map(String::as_str).unwrap_or(DEFAULT_DEVICE);

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("camfeed=debug".parse()?)
                .add_directive("feed_server=debug".parse()?),
        )
        .init();

    let device = device::for_path(device_path)?;
    let capture = CaptureConfig::with_device(DeviceConfig::with_path(device_path))
        .publish_every(2)
        .reconnect_delay(Duration::from_secs(1), Duration::from_secs(10));
    let feed = Feed::new(FeedConfig::default().capture(capture), device)?;

    let config = ServerConfig::with_addr(bind_addr);
    let feed_name = config.feed_name.clone();
    let server = FeedServer::new(config, feed)?;

    println!("Serving {} on {}", device_path, bind_addr);
    println!();
    println!("Viewer page:  http://{}/{}", bind_addr, feed_name);
    println!("Stream:       http://{}/{}/stream", bind_addr, feed_name);
    println!("Still frame:  http://{}/{}/test-frame", bind_addr, feed_name);
    println!();

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        println!("\nShutting down...");
    };

    if let Err(e) = server.run_until(shutdown).await {
        eprintln!("Server error: {}", e);
    }

    let stats = server.stats();
    let capture = server.feed().capture_stats();
    println!(
        "Stats: viewers={} rejected={} frames_published={} reconnects={}",
        stats.total_viewers, stats.rejected_viewers, capture.frames_published, capture.reconnects
    );

    Ok(())
}
