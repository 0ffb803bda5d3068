//! Frame encoding and wire framing
//!
//! This module provides:
//! - JPEG encoding of raw device frames, with resizing to the output size
//! - The `multipart/x-mixed-replace` part envelope sent to viewers

pub mod jpeg;
pub mod multipart;

use std::fmt;

pub use jpeg::{FrameEncoder, DEFAULT_QUALITY, MAX_DIMENSION};
pub use multipart::{encode_part, BOUNDARY, CONTENT_TYPE, PART_CONTENT_TYPE};

/// Error type for frame encoding
#[derive(Debug)]
pub enum EncodeError {
    /// The raw frame does not match its declared size or format
    InvalidFrame(String),
    /// The image codec rejected the frame
    Jpeg(image::ImageError),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
            EncodeError::Jpeg(e) => write!(f, "JPEG codec error: {}", e),
        }
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EncodeError::Jpeg(e) => Some(e),
            EncodeError::InvalidFrame(_) => None,
        }
    }
}

impl From<image::ImageError> for EncodeError {
    fn from(e: image::ImageError) -> Self {
        EncodeError::Jpeg(e)
    }
}
