//! Socket Types Module
//!
//! The properties a socket is created with. None of them change once the
//! socket has been constructed.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Transport protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// TCP (stream, connection-oriented)
    Tcp,
    /// UDP (datagram, connectionless)
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
        }
    }
}

/// IP version, decided by address resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    Ipv4,
    Ipv6,
}

impl IpVersion {
    /// IP version of a resolved address
    pub fn of(addr: &SocketAddr) -> Self {
        match addr.ip() {
            IpAddr::V4(_) => IpVersion::Ipv4,
            IpAddr::V6(_) => IpVersion::Ipv6,
        }
    }

    /// Parse the textual form used by callers ("IPv4" / "IPv6", case-insensitive)
    pub fn parse(text: &str) -> Option<Self> {
        if text.eq_ignore_ascii_case("ipv4") {
            Some(IpVersion::Ipv4)
        } else if text.eq_ignore_ascii_case("ipv6") {
            Some(IpVersion::Ipv6)
        } else {
            None
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpVersion::Ipv4 => write!(f, "IPv4"),
            IpVersion::Ipv6 => write!(f, "IPv6"),
        }
    }
}

/// Socket role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Connects out to a peer
    Client,
    /// Binds a local endpoint and, for TCP, listens
    Server,
}
