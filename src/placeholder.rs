//! Placeholder frame shown while no live frame exists
//!
//! The placeholder is a solid canvas with a short status message drawn in a
//! built-in 5x7 bitmap font. It uses the same dimensions and JPEG encoding
//! as live frames, so viewers cannot tell the two apart by content type.
//!
//! Output is deterministic and computed once per [`Placeholder`].

use std::sync::OnceLock;

use bytes::Bytes;
use image::{Rgb, RgbImage};

use crate::codec::{FrameEncoder, DEFAULT_QUALITY};
use crate::error::{Error, Result};

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
/// Blank columns between glyphs
const GLYPH_SPACING: u32 = 1;
/// Largest share of the canvas width the message may cover, in percent
const MAX_TEXT_WIDTH_PCT: u32 = 80;

/// Placeholder appearance
#[derive(Debug, Clone)]
pub struct PlaceholderConfig {
    /// Canvas width (should match the capture output width)
    pub width: u32,

    /// Canvas height (should match the capture output height)
    pub height: u32,

    /// Canvas color
    pub background: [u8; 3],

    /// Text color
    pub foreground: [u8; 3],

    /// Status message
    pub message: String,

    /// JPEG quality
    pub quality: u8,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            background: [32, 32, 32],
            foreground: [220, 220, 220],
            message: "Camera offline - reconnecting".to_string(),
            quality: DEFAULT_QUALITY,
        }
    }
}

impl PlaceholderConfig {
    /// Set the canvas size
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the status message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Set the canvas and text colors
    pub fn colors(mut self, background: [u8; 3], foreground: [u8; 3]) -> Self {
        self.background = background;
        self.foreground = foreground;
        self
    }

    /// Check the config
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "placeholder size {}x{} has a zero dimension",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Placeholder frame generator
#[derive(Debug)]
pub struct Placeholder {
    config: PlaceholderConfig,
    encoded: OnceLock<Bytes>,
}

impl Placeholder {
    /// Create a generator
    pub fn new(config: PlaceholderConfig) -> Self {
        Self {
            config,
            encoded: OnceLock::new(),
        }
    }

    /// Generator configuration
    pub fn config(&self) -> &PlaceholderConfig {
        &self.config
    }

    /// The encoded placeholder image
    ///
    /// Never fails. If the message cannot be drawn the blank canvas is
    /// returned instead.
    pub fn generate(&self) -> Bytes {
        self.encoded.get_or_init(|| self.render()).clone()
    }

    fn render(&self) -> Bytes {
        let encoder = FrameEncoder::new(self.config.width, self.config.height, self.config.quality);
        let mut canvas = self.blank_canvas();

        if !draw_message(&mut canvas, &self.config.message, Rgb(self.config.foreground)) {
            tracing::debug!(
                message = %self.config.message,
                "Placeholder message does not fit, using blank canvas"
            );
        }

        match encoder.encode_image(&canvas) {
            Ok(jpeg) => jpeg,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode placeholder text, using blank canvas");
                encoder.encode_image(&self.blank_canvas()).unwrap_or_else(|e| {
                    tracing::error!(error = %e, "Failed to encode blank placeholder");
                    Bytes::new()
                })
            }
        }
    }

    fn blank_canvas(&self) -> RgbImage {
        RgbImage::from_pixel(
            self.config.width.max(1),
            self.config.height.max(1),
            Rgb(self.config.background),
        )
    }
}

impl Default for Placeholder {
    fn default() -> Self {
        Self::new(PlaceholderConfig::default())
    }
}

/// Draw `message` centered on the canvas
///
/// Returns false (leaving the canvas untouched) when the message is empty or
/// too wide to fit at the smallest scale.
fn draw_message(canvas: &mut RgbImage, message: &str, color: Rgb<u8>) -> bool {
    let chars: Vec<char> = message.chars().map(|c| c.to_ascii_uppercase()).collect();
    if chars.is_empty() {
        return false;
    }

    let count = chars.len() as u32;
    let unscaled_width = count * (GLYPH_WIDTH + GLYPH_SPACING) - GLYPH_SPACING;
    let max_width = canvas.width() * MAX_TEXT_WIDTH_PCT / 100;
    let scale = (max_width / unscaled_width).min(canvas.height() / (GLYPH_HEIGHT * 4));
    if scale == 0 {
        return false;
    }

    let text_width = unscaled_width * scale;
    let origin_x = (canvas.width() - text_width) / 2;
    let origin_y = (canvas.height() - GLYPH_HEIGHT * scale) / 2;

    for (index, c) in chars.iter().enumerate() {
        let Some(rows) = glyph(*c) else {
            continue;
        };
        let glyph_x = origin_x + index as u32 * (GLYPH_WIDTH + GLYPH_SPACING) * scale;

        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                let x0 = glyph_x + col * scale;
                let y0 = origin_y + row as u32 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        canvas.put_pixel(x0 + dx, y0 + dy, color);
                    }
                }
            }
        }
    }

    true
}

/// 5x7 glyph rows, most significant of the low 5 bits is the left column
///
/// Characters without a glyph render as a space.
fn glyph(c: char) -> Option<[u8; 7]> {
    let rows = match c {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '!' => [0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x04],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(data: &[u8]) -> image::DynamicImage {
        image::load_from_memory_with_format(data, image::ImageFormat::Jpeg).unwrap()
    }

    #[test]
    fn test_placeholder_is_jpeg_at_configured_size() {
        let placeholder = Placeholder::new(PlaceholderConfig::default().size(320, 240));
        let image = decode(&placeholder.generate());

        assert_eq!((image.width(), image.height()), (320, 240));
    }

    #[test]
    fn test_placeholder_is_byte_stable() {
        let config = PlaceholderConfig::default();
        let first = Placeholder::new(config.clone()).generate();
        let second = Placeholder::new(config).generate();

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_message_is_drawn() {
        let config = PlaceholderConfig::default().size(200, 100);
        let blank = Placeholder::new(config.clone().message("")).generate();
        let with_text = Placeholder::new(config.message("NO SIGNAL")).generate();

        assert_ne!(blank, with_text);
    }

    #[test]
    fn test_oversized_message_falls_back_to_blank() {
        let config = PlaceholderConfig::default().size(40, 30);
        let blank = Placeholder::new(config.clone().message("")).generate();
        let long = Placeholder::new(config.message("THIS MESSAGE IS FAR TOO LONG")).generate();

        assert_eq!(blank, long);
    }

    #[test]
    fn test_draw_message_scales_to_canvas() {
        let mut canvas = RgbImage::from_pixel(120, 70, Rgb([0, 0, 0]));
        assert!(draw_message(&mut canvas, "ok", Rgb([255, 255, 255])));

        let lit = canvas.pixels().filter(|p| p.0 == [255, 255, 255]).count();
        assert!(lit > 0);
    }

    #[test]
    fn test_unknown_characters_are_skipped() {
        assert!(glyph('A').is_some());
        assert!(glyph('~').is_none());

        let mut canvas = RgbImage::from_pixel(60, 40, Rgb([0, 0, 0]));
        assert!(draw_message(&mut canvas, "~~", Rgb([255, 255, 255])));
        assert!(canvas.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(PlaceholderConfig::default().size(0, 10).validate().is_err());
    }
}
