//! JPEG encoding of raw device frames
//!
//! Every published frame has the same dimensions and encoding regardless of
//! what the device delivers:
//! - RGB24 and YUYV frames are converted, resized if needed, and encoded
//! - MJPEG frames already at output size pass through untouched
//! - MJPEG frames at any other size are decoded, resized and re-encoded

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ImageFormat, RgbImage};

use super::EncodeError;
use crate::device::{PixelFormat, RawFrame};

/// Default JPEG quality
///
/// Chosen to keep a 640x480 frame well under 100 KB rather than for
/// fidelity.
pub const DEFAULT_QUALITY: u8 = 75;

/// Largest width or height a baseline JPEG can describe
pub const MAX_DIMENSION: u32 = u16::MAX as u32;

/// JPEG start-of-image marker
const SOI: [u8; 2] = [0xFF, 0xD8];

/// Encodes raw frames to fixed-size JPEG images
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    width: u32,
    height: u32,
    quality: u8,
}

impl FrameEncoder {
    /// Create an encoder producing `width` x `height` images
    pub fn new(width: u32, height: u32, quality: u8) -> Self {
        Self {
            width,
            height,
            quality: quality.clamp(1, 100),
        }
    }

    /// Output width
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Output height
    pub fn height(&self) -> u32 {
        self.height
    }

    /// JPEG quality in use
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode one raw frame
    pub fn encode(&self, frame: &RawFrame) -> Result<Bytes, EncodeError> {
        if frame.data.is_empty() {
            return Err(EncodeError::InvalidFrame("empty frame".into()));
        }
        if frame.width == 0 || frame.height == 0 {
            return Err(EncodeError::InvalidFrame(format!(
                "zero dimension {}x{}",
                frame.width, frame.height
            )));
        }

        let image = match frame.format {
            PixelFormat::Mjpeg => {
                if !frame.data.starts_with(&SOI) {
                    return Err(EncodeError::InvalidFrame("MJPEG frame without SOI marker".into()));
                }
                if frame.width == self.width && frame.height == self.height {
                    return Ok(frame.data.clone());
                }
                image::load_from_memory_with_format(&frame.data, ImageFormat::Jpeg)?.to_rgb8()
            }
            PixelFormat::Rgb24 => rgb24_to_image(frame)?,
            PixelFormat::Yuyv => yuyv_to_image(frame)?,
        };

        self.encode_image(&image)
    }

    /// Resize if needed and encode an RGB image
    pub fn encode_image(&self, image: &RgbImage) -> Result<Bytes, EncodeError> {
        if self.width > MAX_DIMENSION || self.height > MAX_DIMENSION {
            return Err(EncodeError::InvalidFrame(format!(
                "output size {}x{} exceeds {} pixels per side",
                self.width, self.height, MAX_DIMENSION
            )));
        }
        let pixels = (self.width as usize).saturating_mul(self.height as usize);
        let mut out = Vec::with_capacity(pixels / 8);
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut out, self.quality);
            if image.width() == self.width && image.height() == self.height {
                encoder.encode_image(image)?;
            } else {
                let resized =
                    image::imageops::resize(image, self.width, self.height, FilterType::Triangle);
                encoder.encode_image(&resized)?;
            }
        }

        Ok(Bytes::from(out))
    }
}

fn expect_len(frame: &RawFrame, bytes_per_pixel: usize) -> Result<(), EncodeError> {
    let expected = frame.width as usize * frame.height as usize * bytes_per_pixel;
    if frame.data.len() < expected {
        return Err(EncodeError::InvalidFrame(format!(
            "{} frame {}x{} needs {} bytes, got {}",
            frame.format,
            frame.width,
            frame.height,
            expected,
            frame.data.len()
        )));
    }
    Ok(())
}

fn rgb24_to_image(frame: &RawFrame) -> Result<RgbImage, EncodeError> {
    expect_len(frame, 3)?;
    let len = frame.width as usize * frame.height as usize * 3;
    RgbImage::from_raw(frame.width, frame.height, frame.data[..len].to_vec())
        .ok_or_else(|| EncodeError::InvalidFrame("RGB24 buffer size mismatch".into()))
}

fn yuyv_to_image(frame: &RawFrame) -> Result<RgbImage, EncodeError> {
    if frame.width % 2 != 0 {
        return Err(EncodeError::InvalidFrame(format!(
            "YUYV frame width {} is odd",
            frame.width
        )));
    }
    expect_len(frame, 2)?;

    let pixel_count = frame.width as usize * frame.height as usize;
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    for quad in frame.data[..pixel_count * 2].chunks_exact(4) {
        let (y0, u, y1, v) = (quad[0], quad[1], quad[2], quad[3]);
        rgb.extend_from_slice(&yuv_to_rgb(y0, u, v));
        rgb.extend_from_slice(&yuv_to_rgb(y1, u, v));
    }

    RgbImage::from_raw(frame.width, frame.height, rgb)
        .ok_or_else(|| EncodeError::InvalidFrame("YUYV buffer size mismatch".into()))
}

/// BT.601 limited-range conversion
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = i32::from(y) - 16;
    let d = i32::from(u) - 128;
    let e = i32::from(v) - 128;

    let clamp = |x: i32| x.clamp(0, 255) as u8;
    [
        clamp((298 * c + 409 * e + 128) >> 8),
        clamp((298 * c - 100 * d - 208 * e + 128) >> 8),
        clamp((298 * c + 516 * d + 128) >> 8),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_jpeg(data: &[u8]) -> bool {
        data.starts_with(&[0xFF, 0xD8]) && data.ends_with(&[0xFF, 0xD9])
    }

    fn decoded_size(data: &[u8]) -> (u32, u32) {
        let image = image::load_from_memory_with_format(data, ImageFormat::Jpeg).unwrap();
        (image.width(), image.height())
    }

    #[test]
    fn test_rgb24_encode() {
        let encoder = FrameEncoder::new(32, 24, 80);
        let frame = RawFrame::new(32, 24, PixelFormat::Rgb24, vec![128u8; 32 * 24 * 3]);

        let jpeg = encoder.encode(&frame).unwrap();
        assert!(is_jpeg(&jpeg));
        assert_eq!(decoded_size(&jpeg), (32, 24));
    }

    #[test]
    fn test_rgb24_resized_to_output() {
        let encoder = FrameEncoder::new(40, 30, 75);
        let frame = RawFrame::new(80, 60, PixelFormat::Rgb24, vec![10u8; 80 * 60 * 3]);

        let jpeg = encoder.encode(&frame).unwrap();
        assert_eq!(decoded_size(&jpeg), (40, 30));
    }

    #[test]
    fn test_yuyv_encode() {
        let encoder = FrameEncoder::new(16, 8, 75);
        let frame = RawFrame::new(16, 8, PixelFormat::Yuyv, vec![128u8; 16 * 8 * 2]);

        let jpeg = encoder.encode(&frame).unwrap();
        assert_eq!(decoded_size(&jpeg), (16, 8));
    }

    #[test]
    fn test_yuyv_conversion() {
        // Black and white in limited range
        assert_eq!(yuv_to_rgb(16, 128, 128), [0, 0, 0]);
        assert_eq!(yuv_to_rgb(235, 128, 128), [255, 255, 255]);
    }

    #[test]
    fn test_mjpeg_passthrough_at_output_size() {
        let encoder = FrameEncoder::new(640, 480, 75);
        let payload = Bytes::from_static(&[0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9]);
        let frame = RawFrame::new(640, 480, PixelFormat::Mjpeg, payload.clone());

        assert_eq!(encoder.encode(&frame).unwrap(), payload);
    }

    #[test]
    fn test_mjpeg_reencoded_when_size_differs() {
        let source = FrameEncoder::new(64, 48, 90)
            .encode_image(&RgbImage::from_pixel(64, 48, image::Rgb([200, 20, 20])))
            .unwrap();
        let frame = RawFrame::new(64, 48, PixelFormat::Mjpeg, source);

        let encoder = FrameEncoder::new(32, 24, 75);
        let jpeg = encoder.encode(&frame).unwrap();
        assert_eq!(decoded_size(&jpeg), (32, 24));
    }

    #[test]
    fn test_invalid_frames() {
        let encoder = FrameEncoder::new(32, 24, 75);

        let empty = RawFrame::new(32, 24, PixelFormat::Rgb24, Vec::new());
        assert!(matches!(encoder.encode(&empty), Err(EncodeError::InvalidFrame(_))));

        let short = RawFrame::new(32, 24, PixelFormat::Rgb24, vec![0u8; 10]);
        assert!(matches!(encoder.encode(&short), Err(EncodeError::InvalidFrame(_))));

        let garbage = RawFrame::new(32, 24, PixelFormat::Mjpeg, vec![1u8, 2, 3]);
        assert!(matches!(encoder.encode(&garbage), Err(EncodeError::InvalidFrame(_))));

        let odd = RawFrame::new(3, 2, PixelFormat::Yuyv, vec![0u8; 12]);
        assert!(encoder.encode(&odd).is_err());
    }

    #[test]
    fn test_oversized_output_rejected() {
        let encoder = FrameEncoder::new(70_000, 70_000, 75);
        let image = RgbImage::new(2, 2);
        assert!(matches!(
            encoder.encode_image(&image),
            Err(EncodeError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_quality_clamped() {
        assert_eq!(FrameEncoder::new(1, 1, 0).quality(), 1);
        assert_eq!(FrameEncoder::new(1, 1, 255).quality(), 100);
    }
}
