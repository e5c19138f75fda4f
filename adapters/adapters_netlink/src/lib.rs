//! Adapters Layer: NetLink Socket Core
//!
//! One socket type for TCP and UDP over IPv4 and IPv6, built on the `socket2`
//! crate. The caller opens, accepts, reads from and writes to connections
//! through a single [`Socket`] without dealing with address families, buffer
//! sizing, blocking semantics or partial I/O.
//!
//! ## Overview
//!
//! The `adapters_netlink` crate provides:
//! - **Socket**: lifecycle (connect, bind, listen, disconnect), blocking mode
//!   and endpoint accessors ([`socket`](socket/index.html))
//! - **TCP operations**: accept, read, write ([`tcp`](tcp/index.html))
//! - **UDP operations**: read_from, write_to ([`udp`](udp/index.html))
//! - **Address resolution** with a fixed IPv6-first tie-break
//!   ([`resolver`](resolver/index.html))
//! - **Read sizing** from the bytes the OS reports as pending
//!   ([`read_sizer`](read_sizer/index.html))
//! - **Error translation** from `std::io::Error` into the `SocketError`
//!   taxonomy ([`translate`](translate/index.html))
//! - **Configuration** from `NETLINK_*` environment variables
//!   ([`config`](config/index.html))
//!
//! ## Example
//!
//! ```no_run
//! use adapters_netlink::Socket;
//!
//! let server = Socket::listen_tcp(Some("127.0.0.1"), 0, None, None)?;
//! let port = server.port_to()?;
//!
//! let mut client = Socket::connect_tcp("127.0.0.1", port)?;
//! client.write(b"ping")?;
//!
//! if let Some(mut peer) = server.accept()?.ready() {
//!     let data = peer.read(None)?.ready().unwrap_or_default();
//!     assert_eq!(data, b"ping");
//! }
//! # Ok::<(), adapters_netlink::SocketError>(())
//! ```
//!
//! ## See Also
//!
//! - [`entities_netlink`](../entities_netlink/index.html): domain model and errors

pub mod config;
pub mod read_sizer;
pub mod resolver;
pub mod socket;
pub mod tcp;
pub mod translate;
pub mod udp;

pub use config::SocketConfig;
pub use entities_netlink::{
    Datagram, ErrorKind, IpVersion, Outcome, Protocol, Result, Role, SocketError, SocketState,
};
pub use resolver::{AddressResolver, NameLookup, SystemLookup};
pub use socket::{InterruptHandle, RawHandle, Socket};
