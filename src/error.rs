//! Crate-level error type
//!
//! Device and encoder faults are recovered inside the capture loop and
//! viewer disconnects end a single session; this type only surfaces what a
//! caller can act on: bad configuration, bind failures and viewer limits.

use std::fmt;
use std::io;

use crate::codec::EncodeError;
use crate::device::DeviceError;

/// Result alias for fallible `camfeed` operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for `camfeed` operations
#[derive(Debug)]
pub enum Error {
    /// Socket or file I/O failure
    Io(io::Error),
    /// Invalid configuration value
    Config(String),
    /// Capture device failure
    Device(DeviceError),
    /// Frame encoding failure
    Encode(EncodeError),
    /// The viewer limit has been reached
    TooManyViewers(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::Device(e) => write!(f, "Device error: {}", e),
            Error::Encode(e) => write!(f, "Encode error: {}", e),
            Error::TooManyViewers(limit) => {
                write!(f, "Viewer limit reached ({} concurrent sessions)", limit)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Device(e) => Some(e),
            Error::Encode(e) => Some(e),
            Error::Config(_) | Error::TooManyViewers(_) => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<DeviceError> for Error {
    fn from(e: DeviceError) -> Self {
        Error::Device(e)
    }
}

impl From<EncodeError> for Error {
    fn from(e: EncodeError) -> Self {
        Error::Encode(e)
    }
}

/// Whether an I/O error means the peer went away
///
/// These are expected ends of a viewer connection, not failures.
pub fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::WriteZero
    )
}
