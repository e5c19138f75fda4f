//! Entities Layer: NetLink Socket Model
//!
//! Pure domain model for the unified TCP/UDP socket core. Nothing in this
//! crate touches the operating system; it only describes what a socket is,
//! which lifecycle transitions are legal, and how failures are classified.
//!
//! ## Overview
//!
//! - **[`types`](types/index.html)**: `Protocol`, `IpVersion` and `Role`, the
//!   three properties fixed for the lifetime of a socket
//! - **[`state`](state/index.html)**: the lifecycle state machine
//!   (`UNINITIALIZED → CONNECTED`, `UNINITIALIZED → BOUND → LISTENING`,
//!   anything `→ CLOSED`)
//! - **[`outcome`](outcome/index.html)**: the explicit would-block result
//!   type and the `Datagram` value returned by connectionless reads
//! - **[`error`](error/index.html)**: the `SocketError` taxonomy
//!
//! ## See Also
//!
//! - [`adapters_netlink`](../adapters_netlink/index.html): OS-backed socket core

pub mod error;
pub mod outcome;
pub mod state;
pub mod types;

pub use error::{ErrorKind, Result, SocketError};
pub use outcome::{Datagram, Outcome};
pub use state::SocketState;
pub use types::{IpVersion, Protocol, Role};
