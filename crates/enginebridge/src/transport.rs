//! # Transport Abstraction
//!
//! A minimal, async interface for moving frames between the host and the engine.
//!
//! ## Philosophy
//!
//! - **Byte-Oriented**: The Transport knows nothing about Call/Reply frames or
//!   wire values. It moves opaque, already-delimited buffers.
//! - **Full Duplex**: `send` and `recv` are independent so the peer can keep
//!   many requests in flight over one connection.

use std::fmt;

/// Errors that occur at the network/transport layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The engine is unreachable or the connection was dropped.
    ConnectionLost(String),
    /// The operation did not complete in time.
    Timeout,
    /// A frame exceeded the configured maximum size.
    PayloadTooLarge { size: usize, max: usize },
    /// Generic I/O error or internal transport failure.
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "connection lost: {}", msg),
            Self::Timeout => write!(f, "operation timed out"),
            Self::PayloadTooLarge { size, max } => {
                write!(f, "frame of {} bytes exceeds maximum {}", size, max)
            }
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof => Self::ConnectionLost(e.to_string()),
            ErrorKind::TimedOut => Self::Timeout,
            _ => Self::Io(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A bidirectional frame pipe.
///
/// This trait is object-safe (`Arc<dyn Transport>`).
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends one complete frame.
    async fn send(&self, payload: &[u8]) -> Result<()>;

    /// Receives the next complete frame.
    ///
    /// Returns `Ok(None)` when the remote closed the stream cleanly.
    async fn recv(&self) -> Result<Option<Vec<u8>>>;

    /// Releases the underlying connection. Further sends fail.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
