//! The capture loop task
//!
//! Owns the device handle for its whole life. Each iteration reads one frame
//! on the blocking pool, encodes it there, and publishes the result to the
//! store. Device faults release the handle and reopen after a backoff delay;
//! the loop itself never returns.

use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::backoff::Backoff;
use super::config::CaptureConfig;
use super::state::{CaptureState, CaptureStatus};
use crate::codec::{EncodeError, FrameEncoder};
use crate::device::{CaptureDevice, DeviceError, DeviceHandle};
use crate::stats::CaptureMetrics;
use crate::store::FrameStore;

/// Result of one successful device read
enum Step {
    Encoded(Bytes),
    Decimated,
    EncodeFailed(EncodeError),
}

/// Background task keeping the store filled with live frames
pub struct CaptureLoop {
    config: CaptureConfig,
    device: Arc<dyn CaptureDevice>,
    store: Arc<FrameStore>,
    status: Arc<CaptureStatus>,
    metrics: Arc<CaptureMetrics>,
    encoder: FrameEncoder,
    backoff: Backoff,
}

impl CaptureLoop {
    /// Create a capture loop
    pub fn new(
        config: CaptureConfig,
        device: Arc<dyn CaptureDevice>,
        store: Arc<FrameStore>,
        status: Arc<CaptureStatus>,
        metrics: Arc<CaptureMetrics>,
    ) -> Self {
        let encoder = FrameEncoder::new(
            config.output_width,
            config.output_height,
            config.jpeg_quality,
        );
        let backoff = Backoff::new(config.reconnect_delay, config.max_reconnect_delay);

        Self {
            config,
            device,
            store,
            status,
            metrics,
            encoder,
            backoff,
        }
    }

    /// Spawn the loop on the current tokio runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run forever
    pub async fn run(mut self) {
        tracing::info!(
            device = %self.config.device.path,
            interval_ms = self.config.capture_interval.as_millis() as u64,
            output = %format!("{}x{}", self.config.output_width, self.config.output_height),
            "Capture loop started"
        );

        loop {
            self.status.set(CaptureState::Opening);

            let handle = match self.open().await {
                Ok(handle) => handle,
                Err(e) => {
                    self.metrics.record_open_failure();
                    let delay = self.backoff.next_delay();
                    tracing::warn!(
                        error = %e,
                        attempt = self.backoff.attempts(),
                        retry_in_ms = delay.as_millis() as u64,
                        "Capture device unavailable"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            let info = handle.info().clone();
            tracing::info!(
                device = %info.path,
                width = info.width,
                height = info.height,
                format = %info.format,
                "Capture device opened"
            );

            let fault = self.stream(handle).await;

            self.status.set(CaptureState::Opening);
            self.metrics.record_reconnect();
            let delay = self.backoff.next_delay();
            tracing::warn!(
                device = %info.path,
                error = %fault,
                retry_in_ms = delay.as_millis() as u64,
                "Capture device faulted, reopening"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Read frames until the device faults
    ///
    /// The handle is released before this returns.
    async fn stream(&mut self, handle: Box<dyn DeviceHandle>) -> DeviceError {
        let mut handle = Some(handle);
        let mut ticker = tokio::time::interval(self.config.capture_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let publish_every = u64::from(self.config.publish_every.max(1));
        let mut reads: u64 = 0;

        loop {
            ticker.tick().await;

            let Some(current) = handle.take() else {
                return DeviceError::read_failed(&self.config.device.path, "handle lost");
            };
            let encode = reads % publish_every == 0;
            reads += 1;

            let (returned, result) = self.read(current, encode).await;
            handle = returned;

            let step = match result {
                Ok(step) => step,
                Err(e) => {
                    self.metrics.record_read_failure();
                    if let Some(handle) = handle.take() {
                        release(handle).await;
                    }
                    return e;
                }
            };

            self.metrics.record_read();
            if self.status.set(CaptureState::Streaming) {
                self.backoff.reset();
                tracing::info!(device = %self.config.device.path, "Capture streaming");
            }

            match step {
                Step::Encoded(jpeg) => {
                    let len = jpeg.len();
                    match self.store.publish(jpeg) {
                        Some(seq) => {
                            self.metrics.record_published(len);
                            tracing::trace!(seq, bytes = len, "Frame captured");
                        }
                        None => {
                            self.metrics.record_encode_failure();
                            tracing::debug!("Encoder produced an empty frame, dropped");
                        }
                    }
                }
                Step::Decimated => self.metrics.record_decimated(),
                Step::EncodeFailed(e) => {
                    self.metrics.record_encode_failure();
                    tracing::debug!(error = %e, "Frame encode failed, dropped");
                }
            }
        }
    }

    async fn open(&self) -> Result<Box<dyn DeviceHandle>, DeviceError> {
        let device = Arc::clone(&self.device);
        let config = self.config.device.clone();
        let path = config.path.clone();

        // On timeout the blocking call is abandoned; a handle it returns later
        // is dropped (and released) on the blocking thread.
        let task = tokio::task::spawn_blocking(move || device.open(&config));
        match tokio::time::timeout(self.config.open_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(DeviceError::unavailable(path, format!("open task failed: {}", e))),
            Err(_) => Err(DeviceError::unavailable(
                path,
                format!("open timed out after {:?}", self.config.open_timeout),
            )),
        }
    }

    /// Read (and maybe encode) one frame on the blocking pool
    ///
    /// Returns the handle unless the read timed out or panicked.
    async fn read(
        &self,
        mut handle: Box<dyn DeviceHandle>,
        encode: bool,
    ) -> (Option<Box<dyn DeviceHandle>>, Result<Step, DeviceError>) {
        let encoder = self.encoder.clone();
        let path = self.config.device.path.clone();

        let task = tokio::task::spawn_blocking(move || {
            let result = handle.read_frame().map(|raw| {
                if !encode {
                    return Step::Decimated;
                }
                match encoder.encode(&raw) {
                    Ok(jpeg) => Step::Encoded(jpeg),
                    Err(e) => Step::EncodeFailed(e),
                }
            });
            (handle, result)
        });

        match tokio::time::timeout(self.config.read_timeout, task).await {
            Ok(Ok((handle, result))) => (Some(handle), result),
            Ok(Err(e)) => (
                None,
                Err(DeviceError::read_failed(path, format!("read task failed: {}", e))),
            ),
            Err(_) => (
                None,
                Err(DeviceError::read_failed(
                    path,
                    format!("read timed out after {:?}", self.config.read_timeout),
                )),
            ),
        }
    }
}

async fn release(handle: Box<dyn DeviceHandle>) {
    let path = handle.info().path.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || handle.release()).await {
        tracing::warn!(device = %path, error = %e, "Device release panicked");
    }
}
