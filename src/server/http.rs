//! Minimal HTTP/1.1 plumbing
//!
//! Only what a camera feed needs: read one request head, answer with one
//! response, close. No keep-alive, no request bodies.

use std::fmt;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Headers sent with every response so browsers never cache a frame
pub const NO_CACHE_HEADERS: &[(&str, &str)] = &[
    ("Cache-Control", "no-cache, no-store, must-revalidate"),
    ("Pragma", "no-cache"),
    ("Expires", "0"),
];

/// Error reading a request head
#[derive(Debug)]
pub enum RequestError {
    /// The client did not send a full head in time
    TimedOut,
    /// The head exceeded the size limit
    TooLarge,
    /// The head could not be parsed
    Malformed(String),
    /// Socket failure
    Io(io::Error),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::TimedOut => write!(f, "request head timed out"),
            RequestError::TooLarge => write!(f, "request head too large"),
            RequestError::Malformed(msg) => write!(f, "malformed request: {}", msg),
            RequestError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RequestError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RequestError {
    fn from(e: io::Error) -> Self {
        RequestError::Io(e)
    }
}

/// A parsed request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Method, as sent
    pub method: String,
    /// Path with the query string removed
    pub path: String,
}

/// Read and parse one request head
pub async fn read_request<R>(
    reader: &mut R,
    max_bytes: usize,
    timeout: Duration,
) -> Result<Request, RequestError>
where
    R: AsyncRead + Unpin,
{
    match tokio::time::timeout(timeout, read_head(reader, max_bytes)).await {
        Ok(head) => parse_head(&head?),
        Err(_) => Err(RequestError::TimedOut),
    }
}

async fn read_head<R>(reader: &mut R, max_bytes: usize) -> Result<Vec<u8>, RequestError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            if data.is_empty() {
                return Err(RequestError::Io(io::ErrorKind::UnexpectedEof.into()));
            }
            return Err(RequestError::Malformed("connection closed mid-head".into()));
        }

        // Only the tail can complete a terminator split across reads
        let scan_from = data.len().saturating_sub(HEAD_TERMINATOR.len() - 1);
        data.extend_from_slice(&buf[..n]);

        if let Some(pos) = find(&data[scan_from..], HEAD_TERMINATOR) {
            data.truncate(scan_from + pos);
            return Ok(data);
        }
        if data.len() > max_bytes {
            return Err(RequestError::TooLarge);
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Parse a request head (without its terminating blank line)
pub fn parse_head(head: &[u8]) -> Result<Request, RequestError> {
    let text = std::str::from_utf8(head)
        .map_err(|_| RequestError::Malformed("request head is not UTF-8".into()))?;
    let request_line = text
        .split("\r\n")
        .next()
        .filter(|line| !line.is_empty())
        .ok_or_else(|| RequestError::Malformed("empty request line".into()))?;

    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(RequestError::Malformed(format!(
            "bad request line {:?}",
            request_line
        )));
    };

    if !version.starts_with("HTTP/1.") {
        return Err(RequestError::Malformed(format!("unsupported version {}", version)));
    }
    if !target.starts_with('/') {
        return Err(RequestError::Malformed(format!("bad request target {}", target)));
    }

    let path = target.split(['?', '#']).next().unwrap_or(target);

    Ok(Request {
        method: method.to_string(),
        path: path.to_string(),
    })
}

/// Status line text for the codes this server emits
pub fn status_line(status: u16) -> &'static str {
    match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        408 => "HTTP/1.1 408 Request Timeout",
        431 => "HTTP/1.1 431 Request Header Fields Too Large",
        503 => "HTTP/1.1 503 Service Unavailable",
        _ => "HTTP/1.1 500 Internal Server Error",
    }
}

/// Build a response head
///
/// `content_length` is omitted for streamed bodies, which end when the
/// connection closes.
pub fn response_head(
    status: u16,
    content_type: &str,
    content_length: Option<usize>,
    extra: &[(&str, &str)],
) -> String {
    let mut head = format!("{}\r\nContent-Type: {}\r\n", status_line(status), content_type);
    if let Some(len) = content_length {
        head.push_str(&format!("Content-Length: {}\r\n", len));
    }
    for (name, value) in NO_CACHE_HEADERS {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    for (name, value) in extra {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("Connection: close\r\n\r\n");
    head
}

/// Write a complete response with a body
pub async fn write_response<W>(
    writer: &mut W,
    status: u16,
    content_type: &str,
    body: &[u8],
    extra: &[(&str, &str)],
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let head = response_head(status, content_type, Some(body.len()), extra);
    writer.write_all(head.as_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await
}

/// Write a short plain-text response
pub async fn write_text<W>(
    writer: &mut W,
    status: u16,
    body: &str,
    extra: &[(&str, &str)],
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_response(writer, status, "text/plain; charset=utf-8", body.as_bytes(), extra).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_get() {
        let request = parse_head(b"GET /cam/stream HTTP/1.1\r\nHost: localhost").unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/cam/stream");
    }

    #[test]
    fn test_query_string_ignored() {
        let request = parse_head(b"GET /cam/test-frame?t=123 HTTP/1.1").unwrap();
        assert_eq!(request.path, "/cam/test-frame");
    }

    #[test]
    fn test_malformed_heads() {
        assert!(matches!(parse_head(b""), Err(RequestError::Malformed(_))));
        assert!(matches!(parse_head(b"GET /cam"), Err(RequestError::Malformed(_))));
        assert!(matches!(
            parse_head(b"GET /cam SPDY/3"),
            Err(RequestError::Malformed(_))
        ));
        assert!(matches!(
            parse_head(b"GET cam HTTP/1.1"),
            Err(RequestError::Malformed(_))
        ));
    }

    #[test]
    fn test_response_head_headers() {
        let head = response_head(200, "image/jpeg", Some(42), &[]);
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(head.contains("Content-Type: image/jpeg\r\n"));
        assert!(head.contains("Content-Length: 42\r\n"));
        assert!(head.contains("Cache-Control: no-cache, no-store, must-revalidate\r\n"));
        assert!(head.contains("Pragma: no-cache\r\n"));
        assert!(head.contains("Expires: 0\r\n"));
        assert!(head.ends_with("Connection: close\r\n\r\n"));
    }

    #[test]
    fn test_streamed_head_has_no_length() {
        let head = response_head(200, "multipart/x-mixed-replace; boundary=frame", None, &[]);
        assert!(!head.contains("Content-Length"));
    }

    #[tokio::test]
    async fn test_read_request_split_across_reads() {
        let mut client = tokio_test::io::Builder::new()
            .read(b"GET /cam HT")
            .read(b"TP/1.1\r\nHost: x\r")
            .read(b"\n\r\n")
            .build();

        let request = read_request(&mut client, 8192, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(request.path, "/cam");
    }

    #[tokio::test]
    async fn test_read_request_too_large() {
        let filler = vec![b'a'; 200];
        let mut client = tokio_test::io::Builder::new()
            .read(b"GET /cam HTTP/1.1\r\nX-Filler: ")
            .read(&filler)
            .build();

        let result = read_request(&mut client, 128, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(RequestError::TooLarge)));
    }

    #[tokio::test]
    async fn test_read_request_closed_early() {
        let mut client = tokio_test::io::Builder::new().build();
        let result = read_request(&mut client, 8192, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(RequestError::Io(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_request_times_out() {
        let mut client = tokio_test::io::Builder::new()
            .read(b"GET /cam")
            .wait(Duration::from_secs(60))
            .build();

        let result = read_request(&mut client, 8192, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(RequestError::TimedOut)));
    }

    #[tokio::test]
    async fn test_write_text_response() {
        let body = "not found";
        let expected = response_head(404, "text/plain; charset=utf-8", Some(body.len()), &[]);
        let mut client = tokio_test::io::Builder::new()
            .write(expected.as_bytes())
            .write(body.as_bytes())
            .build();

        write_text(&mut client, 404, body, &[]).await.unwrap();
    }
}
