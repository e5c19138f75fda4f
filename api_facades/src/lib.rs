//! API Facades Layer
//!
//! The operation table a host binding calls. Host environments hand over
//! loosely-typed values; every facade checks the count and kind of its
//! arguments first and fails with an argument error before any OS resource
//! exists. Everything else is forwarded to
//! [`adapters_netlink::Socket`](../adapters_netlink/socket/struct.Socket.html).
//!
//! No socket logic lives here.

pub mod host_value;
pub mod socket_facades;

pub use host_value::HostValue;
pub use socket_facades::*;
