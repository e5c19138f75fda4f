//! Lifecycle State Module
//!
//! A client goes `Uninitialized → Connected`. A server goes
//! `Uninitialized → Bound → Listening` (TCP) or stops at `Bound` (UDP).
//! Any state may move to `Closed`, which is terminal. Accepting a connection
//! does not change the listener's state; the accepted socket starts life in
//! `Connected`.

use std::fmt;

use crate::error::{Result, SocketError};

/// Lifecycle state of a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketState {
    /// Created, no OS handle yet
    Uninitialized,
    /// Handle bound to a local endpoint
    Bound,
    /// Bound TCP handle accepting connections
    Listening,
    /// Connected to a peer (TCP) or given a fixed peer (UDP)
    Connected,
    /// Handle released; nothing further is allowed
    Closed,
}

impl SocketState {
    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(self, next: SocketState) -> bool {
        use SocketState::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Uninitialized, Connected) | (Uninitialized, Bound) | (Bound, Listening) => true,
            _ => false,
        }
    }

    /// Validate a transition, returning the new state
    pub fn transition(self, next: SocketState) -> Result<SocketState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SocketError::state(format!(
                "cannot move socket from {} to {}",
                self, next
            )))
        }
    }

    /// Whether an OS handle exists in this state
    pub fn has_handle(self) -> bool {
        matches!(
            self,
            SocketState::Bound | SocketState::Listening | SocketState::Connected
        )
    }

    pub fn is_closed(self) -> bool {
        self == SocketState::Closed
    }
}

impl fmt::Display for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SocketState::Uninitialized => "UNINITIALIZED",
            SocketState::Bound => "BOUND",
            SocketState::Listening => "LISTENING",
            SocketState::Connected => "CONNECTED",
            SocketState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}
