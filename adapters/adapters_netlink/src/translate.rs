//! Error Translation Module
//!
//! Turns `std::io::Error` values coming back from the OS into the
//! [`SocketError`] taxonomy. The kind is decided by the operation that
//! failed, with a few OS error kinds overriding it. Would-block is never
//! translated: callers check [`is_would_block`] first and report
//! `Outcome::WouldBlock` instead.

use std::fmt;
use std::io::{self, ErrorKind as IoErrorKind};

use entities_netlink::SocketError;

/// The socket operation an OS error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Open,
    Connect,
    Bind,
    Listen,
    Accept,
    Read,
    Write,
    Blocking,
    Shutdown,
    Query,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Op::Open => "open",
            Op::Connect => "connect",
            Op::Bind => "bind",
            Op::Listen => "listen",
            Op::Accept => "accept",
            Op::Read => "read",
            Op::Write => "write",
            Op::Blocking => "set blocking",
            Op::Shutdown => "shutdown",
            Op::Query => "query",
        };
        f.write_str(name)
    }
}

/// Whether the error only means "try again later"
pub fn is_would_block(err: &io::Error) -> bool {
    err.kind() == IoErrorKind::WouldBlock
}

/// Whether a signal interrupted the call before it did anything
pub fn is_interrupted(err: &io::Error) -> bool {
    err.kind() == IoErrorKind::Interrupted
}

/// Translate an OS error raised by `op`
pub fn translate(op: Op, err: &io::Error) -> SocketError {
    let message = format!("{} failed: {}", op, err);
    match op {
        Op::Open | Op::Connect | Op::Bind | Op::Listen | Op::Accept | Op::Shutdown => {
            SocketError::Connection(message)
        }
        Op::Read | Op::Write => match err.kind() {
            IoErrorKind::NotConnected | IoErrorKind::InvalidInput => SocketError::State(message),
            _ => SocketError::Io(message),
        },
        Op::Blocking | Op::Query => SocketError::State(message),
    }
}

/// Closure form of [`translate`] for `map_err`
pub fn during(op: Op) -> impl Fn(io::Error) -> SocketError {
    move |err| translate(op, &err)
}

/// Translate a resolver failure for `host:port`
pub fn resolution_failure(host: &str, port: u16, err: &io::Error) -> SocketError {
    SocketError::resolution(host, i64::from(port), err.to_string())
}
