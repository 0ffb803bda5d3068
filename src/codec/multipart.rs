//! `multipart/x-mixed-replace` framing
//!
//! Each part on the wire is:
//!
//! ```text
//! --frame\r\n
//! Content-Type: image/jpeg\r\n
//! \r\n
//! <jpeg bytes>\r\n
//! \r\n
//! ```
//!
//! Browsers replace the displayed image with every complete part.

use bytes::{BufMut, Bytes, BytesMut};

/// Multipart boundary token
pub const BOUNDARY: &str = "frame";

/// Response content type for the stream endpoint
pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Content type of every part
pub const PART_CONTENT_TYPE: &str = "image/jpeg";

const PART_HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
const PART_TRAILER: &[u8] = b"\r\n\r\n";

/// Wrap a JPEG payload in one multipart part
pub fn encode_part(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(PART_HEADER.len() + payload.len() + PART_TRAILER.len());
    buf.put_slice(PART_HEADER);
    buf.put_slice(payload);
    buf.put_slice(PART_TRAILER);
    buf.freeze()
}

/// Size of a part carrying `payload_len` bytes
pub fn part_len(payload_len: usize) -> usize {
    PART_HEADER.len() + payload_len + PART_TRAILER.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_layout() {
        let part = encode_part(&[0xFF, 0xD8, 0xFF, 0xD9]);

        let mut expected = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        expected.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xD9]);
        expected.extend_from_slice(b"\r\n\r\n");

        assert_eq!(&part[..], &expected[..]);
        assert_eq!(part.len(), part_len(4));
    }

    #[test]
    fn test_header_matches_constants() {
        let header = format!("--{}\r\nContent-Type: {}\r\n\r\n", BOUNDARY, PART_CONTENT_TYPE);
        assert_eq!(header.as_bytes(), PART_HEADER);
        assert!(CONTENT_TYPE.ends_with(&format!("boundary={}", BOUNDARY)));
    }
}
