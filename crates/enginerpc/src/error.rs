//! # Error Definitions
//!
//! Local protocol failures (`Error`) and failures reported by the engine
//! (`RemoteFailure`). The first means we could not speak the protocol; the
//! second means the engine understood us and said no.

use enginepack::Error as PackError;

/// Operational failures within the protocol layer itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The underlying enginepack encoding or decoding failed.
    Serialization(PackError),
    /// A message was missing a required field.
    MissingField(&'static str),
    /// An unknown argument kind, method, or frame type was encountered.
    UnknownVariant(String),
    /// The message was well-formed bytes but broke the protocol rules.
    ProtocolViolation(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialization(e) => write!(f, "serialization failed: {}", e),
            Self::MissingField(field) => write!(f, "missing field '{}'", field),
            Self::UnknownVariant(what) => write!(f, "unknown variant: {}", what),
            Self::ProtocolViolation(msg) => write!(f, "protocol violation: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PackError> for Error {
    fn from(e: PackError) -> Self { Self::Serialization(e) }
}

/// A specialized Result type for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Category of a failure reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request was understood and failed.
    Failed,
    /// The engine is temporarily unable to serve the request.
    Overloaded,
    /// The engine lost the connection or object it needed mid-request.
    Disconnected,
    /// The engine does not implement the request.
    Unimplemented,
}

impl FailureKind {
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Failed => "failed",
            Self::Overloaded => "overloaded",
            Self::Disconnected => "disconnected",
            Self::Unimplemented => "unimplemented",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "failed" => Ok(Self::Failed),
            "overloaded" => Ok(Self::Overloaded),
            "disconnected" => Ok(Self::Disconnected),
            "unimplemented" => Ok(Self::Unimplemented),
            other => Err(Error::UnknownVariant(format!("failure kind: {}", other))),
        }
    }
}

/// A failure reported by the engine, with its origin when the engine knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFailure {
    pub kind: FailureKind,
    pub description: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl RemoteFailure {
    pub fn new(kind: FailureKind, description: impl Into<String>) -> Self {
        Self { kind, description: description.into(), file: None, line: None }
    }

    pub fn failed(description: impl Into<String>) -> Self {
        Self::new(FailureKind::Failed, description)
    }

    /// Attaches the source location the engine reported.
    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }
}

impl std::fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "[{}]:[{}]: {}", file, line, self.description),
            (Some(file), None) => write!(f, "[{}]: {}", file, self.description),
            _ => write!(f, "{}", self.description),
        }
    }
}
