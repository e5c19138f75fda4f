//! Error Module
//!
//! Classifies every failure the socket core can report into five kinds.
//! Argument errors are detected before any OS resource is touched; the other
//! kinds carry the OS error text, when there is one, inside the message.

use thiserror::Error;

/// Socket error taxonomy
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SocketError {
    /// Caller supplied a missing or malformed parameter
    #[error("invalid argument: {0}")]
    Argument(String),

    /// Host name or port could not be turned into a transport address
    #[error("cannot resolve {host}:{port}: {reason}")]
    AddressResolution {
        host: String,
        port: i64,
        reason: String,
    },

    /// connect, bind, listen or accept failed
    #[error("connection error: {0}")]
    Connection(String),

    /// read or write failed mid-stream
    #[error("I/O error: {0}")]
    Io(String),

    /// Operation not valid for the socket's state, role or protocol
    #[error("invalid state: {0}")]
    State(String),
}

/// Discriminant of [`SocketError`], for callers that only care about the kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Argument,
    AddressResolution,
    Connection,
    Io,
    State,
}

impl SocketError {
    pub fn argument(message: impl Into<String>) -> Self {
        SocketError::Argument(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        SocketError::State(message.into())
    }

    pub fn resolution(host: &str, port: i64, reason: impl Into<String>) -> Self {
        SocketError::AddressResolution {
            host: host.to_string(),
            port,
            reason: reason.into(),
        }
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            SocketError::Argument(_) => ErrorKind::Argument,
            SocketError::AddressResolution { .. } => ErrorKind::AddressResolution,
            SocketError::Connection(_) => ErrorKind::Connection,
            SocketError::Io(_) => ErrorKind::Io,
            SocketError::State(_) => ErrorKind::State,
        }
    }
}

/// Result type used across the socket core
pub type Result<T> = std::result::Result<T, SocketError>;
