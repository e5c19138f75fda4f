//! Outcome Module
//!
//! Non-blocking sockets frequently have nothing to hand back. That is an
//! expected condition, not a fault, so it is reported as
//! [`Outcome::WouldBlock`] rather than as an error. An empty `Ready` read is
//! a different thing: the peer shut down in an orderly way.

/// Result of an operation that may have nothing to return yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The operation completed
    Ready(T),
    /// Non-blocking mode and nothing is available right now
    WouldBlock,
}

impl<T> Outcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Outcome::Ready(_))
    }

    pub fn is_would_block(&self) -> bool {
        matches!(self, Outcome::WouldBlock)
    }

    /// Convert into an `Option`, dropping the would-block distinction
    pub fn ready(self) -> Option<T> {
        match self {
            Outcome::Ready(value) => Some(value),
            Outcome::WouldBlock => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Ready(value) => Outcome::Ready(f(value)),
            Outcome::WouldBlock => Outcome::WouldBlock,
        }
    }
}

/// A datagram read by `read_from`, with the sender's endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub host: String,
    pub port: u16,
    pub data: Vec<u8>,
}
