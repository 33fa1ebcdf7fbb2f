//! Error types for the SureElec LCD hardware library.

use crate::scroll::ScrollDirection;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when interacting with the hardware.
#[derive(Error, Debug)]
pub enum Error {
    /// The device path does not refer to a terminal.
    #[error("{0} is not a terminal device")]
    NotATerminal(String),

    /// The operating system refused to open the device.
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Line discipline (speed, framing, flow control) could not be applied.
    #[error("Failed to configure {path}: {source}")]
    ConfigFailed {
        path: String,
        #[source]
        source: tokio_serial::Error,
    },

    /// Serial write error.
    #[error("Cannot write to port: {0}")]
    WriteFailed(#[source] std::io::Error),

    /// Serial read error.
    #[error("Cannot read from port: {0}")]
    ReadFailed(#[source] std::io::Error),

    /// The device stopped answering before a full response arrived.
    #[error("No answer from device: expected {expected} bytes, got {received}")]
    Timeout { expected: usize, received: usize },

    /// The capability response could not be decoded.
    #[error("Malformed capability response: {0:?}")]
    CapabilityParse(String),

    /// A sensor or setting response could not be decoded.
    #[error("Malformed {sensor} response: {raw:?}")]
    SensorParse { sensor: &'static str, raw: String },

    /// Line number outside the display.
    #[error("Invalid line {line} (display has {height} lines)")]
    InvalidLine { line: usize, height: usize },

    /// Scroll direction without an implemented transform.
    #[error("Scrolling {0} is not supported")]
    UnsupportedDirection(ScrollDirection),

    /// Unknown scroll direction name.
    #[error("Invalid scroll direction: {0}")]
    InvalidDirection(String),

    /// Operation attempted on a session that is closed or never became ready.
    #[error("LCD session is closed")]
    SessionClosed,
}

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Open, configuration, write, read or timeout failure.
    Transport,
    /// The device answered with something that could not be decoded.
    Protocol,
    /// Rejected before any I/O took place.
    Input,
    /// The session is not usable.
    Session,
}

impl Error {
    /// Returns the class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotATerminal(_)
            | Error::OpenFailed { .. }
            | Error::ConfigFailed { .. }
            | Error::WriteFailed(_)
            | Error::ReadFailed(_)
            | Error::Timeout { .. } => ErrorKind::Transport,
            Error::CapabilityParse(_) | Error::SensorParse { .. } => ErrorKind::Protocol,
            Error::InvalidLine { .. }
            | Error::UnsupportedDirection(_)
            | Error::InvalidDirection(_) => ErrorKind::Input,
            Error::SessionClosed => ErrorKind::Session,
        }
    }

    /// Returns true for read timeouts, the usual sign of an unplugged device.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}
