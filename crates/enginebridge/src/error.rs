//! # Error Definitions
//!
//! `BridgeError` is the single error type every bridge operation returns.
//! Lower layers keep their own error enums and convert into it at the
//! operation boundary.

use enginerpc::FailureKind;
use enginerpc::RemoteFailure;

use crate::peer;
use crate::transport;

/// Why the bridge could not talk to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// No port in the configured range accepted a connection.
    Unreachable,
    /// The connection failed while a request was being sent or awaited.
    Transport,
    /// The engine went away, or reported that it had.
    Disconnected,
    /// A connect attempt or request exceeded its time budget.
    Timeout,
}

impl std::fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unreachable => "unreachable",
            Self::Transport => "transport",
            Self::Disconnected => "disconnected",
            Self::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeError {
    Connection { kind: ConnectionErrorKind, detail: String },
    /// A host value could not be turned into a wire value. Nothing was sent.
    Encoding(String),
    /// A wire value could not be turned into a host value.
    Decoding(String),
    /// A class name has no registered proxy type.
    Lookup(String),
    /// The engine rejected an operation.
    RemoteOperation(RemoteFailure),
    /// The engine rejected a `newObject` request.
    ConstructionFailed(RemoteFailure),
    /// The bridge settings are unusable.
    Config(String),
}

impl BridgeError {
    pub fn connection(kind: ConnectionErrorKind, detail: impl Into<String>) -> Self {
        Self::Connection { kind, detail: detail.into() }
    }

    /// True for failures after which the next operation should reconnect.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection { kind, detail } => write!(f, "connection error ({}): {}", kind, detail),
            Self::Encoding(msg) => write!(f, "encoding error: {}", msg),
            Self::Decoding(msg) => write!(f, "decoding error: {}", msg),
            Self::Lookup(class) => write!(f, "no proxy class registered for '{}'", class),
            Self::RemoteOperation(failure) => write!(f, "{}", failure),
            Self::ConstructionFailed(failure) => write!(f, "construction failed: {}", failure),
            Self::Config(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<transport::Error> for BridgeError {
    fn from(e: transport::Error) -> Self {
        let kind = match e {
            transport::Error::Timeout => ConnectionErrorKind::Timeout,
            transport::Error::ConnectionLost(_) => ConnectionErrorKind::Disconnected,
            _ => ConnectionErrorKind::Transport,
        };
        Self::connection(kind, e.to_string())
    }
}

impl From<peer::Error> for BridgeError {
    fn from(e: peer::Error) -> Self {
        match e {
            peer::Error::Transport(e) => e.into(),
            peer::Error::Encode(e) => Self::Encoding(e.to_string()),
            peer::Error::Decode(e) => Self::Decoding(e.to_string()),
            peer::Error::Remote(failure) if failure.kind == FailureKind::Disconnected => {
                Self::connection(ConnectionErrorKind::Disconnected, failure.to_string())
            }
            peer::Error::Remote(failure) => Self::RemoteOperation(failure),
            peer::Error::Timeout => Self::connection(ConnectionErrorKind::Timeout, "no reply from engine"),
            peer::Error::Closed => Self::connection(ConnectionErrorKind::Disconnected, "connection closed"),
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
