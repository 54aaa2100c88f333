//! Core error types for the lobby server

use std::io;
use std::time::Duration;

/// How far an error is allowed to propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Confined to the connection it happened on.
    Connection,
    /// A bug in the hub. The process exits and the supervisor restarts it after a cooldown.
    Major,
    /// The process exits and must not be restarted (bad configuration, unusable ports).
    Fatal,
}

impl Severity {
    /// Process exit code the supervisor keys its restart policy on
    pub fn exit_code(self) -> i32 {
        match self {
            Severity::Connection => 0,
            Severity::Major => 2,
            Severity::Fatal => 3,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("decode mismatch at offset {offset}: expected ident {expected:#06x}, found {actual:#06x}")]
    DecodeMismatch { expected: u16, actual: u16, offset: usize },

    #[error("unknown field ident {ident:#06x} at offset {offset}")]
    UnknownFieldIdent { ident: u16, offset: usize },

    #[error("truncated input at offset {offset}: {needed} more bytes needed")]
    Truncated { offset: usize, needed: usize },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("connection reset by peer")]
    ConnectionReset,

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("no inbound traffic for {0:?}")]
    IdleTimeout(Duration),

    #[error("more than one handler in state {state} matched request {ident:#06x}")]
    DuplicateHandlerMatch { ident: u16, state: &'static str },

    #[error("connection actor fault: {0}")]
    ActorFault(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(io::Error),
}

impl ServerError {
    pub fn severity(&self) -> Severity {
        match self {
            ServerError::DuplicateHandlerMatch { .. } => Severity::Major,
            ServerError::Config(_) => Severity::Fatal,
            _ => Severity::Connection,
        }
    }

    /// Resets and aborts are ordinary lifecycle events, not failures.
    pub fn is_connection_reset(&self) -> bool {
        matches!(self, ServerError::ConnectionReset)
    }
}

impl From<io::Error> for ServerError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe => ServerError::ConnectionReset,
            _ => ServerError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
