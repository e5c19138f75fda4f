//! Address Resolution Module
//!
//! Resolves a host string and port into concrete transport addresses. When
//! the platform resolver returns both families, IPv6 addresses are ordered
//! before IPv4 ones; within a family the platform order is kept. A caller
//! that already knows its family passes it as a hint and only matching
//! addresses are returned.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};

use entities_netlink::{IpVersion, Result, SocketError};
use log::debug;

use crate::translate::resolution_failure;

/// OS name lookup, the seam between the resolver and the platform
#[cfg_attr(test, mockall::automock)]
pub trait NameLookup {
    fn lookup(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>>;
}

/// Name lookup through the platform resolver (`getaddrinfo`)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLookup;

impl NameLookup for SystemLookup {
    fn lookup(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        Ok((host, port).to_socket_addrs()?.collect())
    }
}

/// Address resolver
#[derive(Debug, Clone, Default)]
pub struct AddressResolver<L = SystemLookup> {
    lookup: L,
}

impl AddressResolver<SystemLookup> {
    /// Resolver backed by the platform
    pub fn system() -> Self {
        Self { lookup: SystemLookup }
    }
}

impl<L: NameLookup> AddressResolver<L> {
    pub fn with_lookup(lookup: L) -> Self {
        Self { lookup }
    }

    /// Resolve `host:port` to the preferred address and its IP version
    pub fn resolve(&self, host: &str, port: u16) -> Result<(SocketAddr, IpVersion)> {
        self.resolve_hinted(host, port, None)
    }

    /// Resolve to the preferred address, restricted to `hint` when given
    pub fn resolve_hinted(
        &self,
        host: &str,
        port: u16,
        hint: Option<IpVersion>,
    ) -> Result<(SocketAddr, IpVersion)> {
        let candidates = self.resolve_all(host, port, hint)?;
        let addr = candidates[0];
        Ok((addr, IpVersion::of(&addr)))
    }

    /// Resolve every candidate address, in preference order
    ///
    /// The returned vector is never empty.
    pub fn resolve_all(
        &self,
        host: &str,
        port: u16,
        hint: Option<IpVersion>,
    ) -> Result<Vec<SocketAddr>> {
        let host = strip_brackets(host.trim());
        if host.is_empty() {
            return Err(SocketError::resolution(host, i64::from(port), "empty host"));
        }

        let found = self
            .lookup
            .lookup(host, port)
            .map_err(|e| resolution_failure(host, port, &e))?;

        let mut ordered: Vec<SocketAddr> = Vec::with_capacity(found.len());
        for wanted in [IpVersion::Ipv6, IpVersion::Ipv4] {
            if hint.is_some_and(|h| h != wanted) {
                continue;
            }
            for addr in found.iter().filter(|a| IpVersion::of(a) == wanted) {
                if !ordered.contains(addr) {
                    ordered.push(*addr);
                }
            }
        }

        if ordered.is_empty() {
            let reason = match hint {
                Some(version) => format!("no {} address", version),
                None => "no address".to_string(),
            };
            return Err(SocketError::resolution(host, i64::from(port), reason));
        }

        debug!("resolved {}:{} to {:?}", host, port, ordered);
        Ok(ordered)
    }
}

/// Wildcard (any) address of the given family
pub fn wildcard(ip_version: IpVersion, port: u16) -> SocketAddr {
    let ip: IpAddr = match ip_version {
        IpVersion::Ipv4 => Ipv4Addr::UNSPECIFIED.into(),
        IpVersion::Ipv6 => Ipv6Addr::UNSPECIFIED.into(),
    };
    SocketAddr::new(ip, port)
}

/// Check that a caller-supplied port number fits the 0-65535 range
pub fn checked_port(host: &str, port: i64) -> Result<u16> {
    u16::try_from(port)
        .map_err(|_| SocketError::resolution(host, port, "port out of range 0-65535"))
}

fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}
