//! Video4Linux capture device
//!
//! Opens a device node (e.g. `/dev/video0`), negotiates resolution, pixel
//! format and frame rate, and streams through four mmap buffers. When the
//! driver rejects the requested format the active one is used as-is and the
//! encoder converts or resizes it.

use ouroboros::self_referencing;

use super::{CaptureDevice, DeviceConfig, DeviceError, DeviceHandle, HandleInfo, PixelFormat, RawFrame};

/// Number of kernel buffers in the mmap stream
const BUFFER_COUNT: u32 = 4;

/// V4L2 capture device
///
/// The kernel enforces exclusivity: a node already streaming elsewhere
/// fails to open with `EBUSY`, which maps to [`DeviceError::Unavailable`].
#[derive(Debug, Default)]
pub struct V4l2Device;

impl V4l2Device {
    /// Create a V4L2 device adapter
    pub fn new() -> Self {
        Self
    }
}

#[self_referencing]
struct StreamState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

struct V4l2Handle {
    info: HandleInfo,
    state: StreamState,
}

impl CaptureDevice for V4l2Device {
    fn open(&self, config: &DeviceConfig) -> Result<Box<dyn DeviceHandle>, DeviceError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let path = config.path.as_str();
        let mut device =
            v4l::Device::with_path(path).map_err(|e| DeviceError::unavailable(path, e))?;

        let mut format = device
            .format()
            .map_err(|e| DeviceError::unavailable(path, format!("read format: {}", e)))?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = v4l::FourCC::new(&config.format.fourcc());

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(e) => {
                tracing::warn!(device = %path, error = %e, "Failed to set capture format");
                device
                    .format()
                    .map_err(|e| DeviceError::unavailable(path, format!("read format: {}", e)))?
            }
        };

        let active_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            DeviceError::unavailable(path, format!("unsupported pixel format {}", format.fourcc))
        })?;

        if config.fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(config.fps);
            if let Err(e) = device.set_params(&params) {
                tracing::warn!(device = %path, fps = config.fps, error = %e, "Failed to set frame rate");
            }
        }

        let state = StreamStateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, BUFFER_COUNT)
            },
        }
        .try_build()
        .map_err(|e| DeviceError::unavailable(path, format!("start stream: {}", e)))?;

        let info = HandleInfo {
            path: path.to_string(),
            width: format.width,
            height: format.height,
            fps: config.fps,
            format: active_format,
        };

        tracing::info!(
            device = %path,
            width = info.width,
            height = info.height,
            format = %info.format,
            "V4L2 device opened"
        );

        Ok(Box::new(V4l2Handle { info, state }))
    }
}

impl DeviceHandle for V4l2Handle {
    fn info(&self) -> &HandleInfo {
        &self.info
    }

    fn read_frame(&mut self) -> Result<RawFrame, DeviceError> {
        use v4l::io::traits::CaptureStream;

        let info = &self.info;
        self.state.with_stream_mut(|stream| {
            let (buf, meta) = stream
                .next()
                .map_err(|e| DeviceError::read_failed(&info.path, e))?;

            // MJPEG frames vary in size; only `bytesused` is valid
            let used = match meta.bytesused as usize {
                0 => buf.len(),
                n => n.min(buf.len()),
            };
            if used == 0 {
                return Err(DeviceError::read_failed(&info.path, "empty buffer"));
            }

            Ok(RawFrame::new(
                info.width,
                info.height,
                info.format,
                buf[..used].to_vec(),
            ))
        })
    }
}

impl Drop for V4l2Handle {
    fn drop(&mut self) {
        tracing::info!(device = %self.info.path, "V4L2 device released");
    }
}
