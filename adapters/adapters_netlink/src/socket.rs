//! Socket Module
//!
//! The core socket entity. One `Socket` owns at most one OS handle and
//! tracks its protocol, IP version, role, blocking mode, lifecycle state and
//! endpoints. Protocol-specific operations live in [`tcp`](../tcp/index.html)
//! (accept, read, write) and [`udp`](../udp/index.html) (read_from, write_to);
//! this module covers construction, the lifecycle transitions, blocking mode,
//! teardown and the accessors.
//!
//! A socket is meant for a single owner. Nothing inside is synchronized; to
//! stop a blocked `accept` or `read` from another thread, hand that thread an
//! [`InterruptHandle`].

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use entities_netlink::{IpVersion, Protocol, Result, Role, SocketError, SocketState};
use log::{debug, trace, warn};
use socket2::{Domain, Protocol as Socket2Protocol, SockAddr, Socket as Socket2, Type};

use crate::config::SocketConfig;
use crate::read_sizer;
use crate::resolver::{wildcard, AddressResolver, NameLookup};
use crate::translate::{during, translate, Op};

/// Raw OS handle identifier, exposed for diagnostics only
#[cfg(unix)]
pub type RawHandle = std::os::unix::io::RawFd;
#[cfg(windows)]
pub type RawHandle = std::os::windows::io::RawSocket;

/// Unified TCP/UDP socket
#[derive(Debug)]
pub struct Socket {
    pub(crate) handle: Option<Arc<Socket2>>,
    pub(crate) protocol: Protocol,
    pub(crate) role: Role,
    pub(crate) ip_version: Option<IpVersion>,
    pub(crate) state: SocketState,
    pub(crate) blocking: bool,
    pub(crate) local: Option<SocketAddr>,
    pub(crate) remote: Option<SocketAddr>,
    pub(crate) listen_backlog: Option<u32>,
    pub(crate) config: SocketConfig,
}

pub(crate) fn domain_of(ip_version: IpVersion) -> Domain {
    match ip_version {
        IpVersion::Ipv4 => Domain::IPV4,
        IpVersion::Ipv6 => Domain::IPV6,
    }
}

fn type_of(protocol: Protocol) -> (Type, Socket2Protocol) {
    match protocol {
        Protocol::Tcp => (Type::STREAM, Socket2Protocol::TCP),
        Protocol::Udp => (Type::DGRAM, Socket2Protocol::UDP),
    }
}

pub(crate) fn socket_addr_of(addr: &SockAddr) -> Result<SocketAddr> {
    addr.as_socket()
        .ok_or_else(|| SocketError::Connection("peer address is not an IP address".to_string()))
}

impl Socket {
    /// Create an uninitialized client socket; call [`connect`](Self::connect) next
    pub fn client(protocol: Protocol) -> Self {
        Self::uninitialized(protocol, Role::Client, SocketConfig::default())
    }

    /// Uninitialized client with its own configuration
    ///
    /// Fails with an argument error when `config` does not validate.
    pub fn client_with_config(protocol: Protocol, config: SocketConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::uninitialized(protocol, Role::Client, config))
    }

    /// Create an uninitialized server socket; call [`bind`](Self::bind) or
    /// [`listen`](Self::listen) next
    pub fn server(protocol: Protocol) -> Self {
        Self::uninitialized(protocol, Role::Server, SocketConfig::default())
    }

    /// Uninitialized server with its own configuration
    ///
    /// Fails with an argument error when `config` does not validate.
    pub fn server_with_config(protocol: Protocol, config: SocketConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::uninitialized(protocol, Role::Server, config))
    }

    pub(crate) fn uninitialized(protocol: Protocol, role: Role, config: SocketConfig) -> Self {
        Self {
            handle: None,
            protocol,
            role,
            ip_version: None,
            state: SocketState::Uninitialized,
            blocking: config.blocking,
            local: None,
            remote: None,
            listen_backlog: None,
            config,
        }
    }

    /// Connected TCP client
    pub fn connect_tcp(host: &str, port: u16) -> Result<Self> {
        let mut socket = Self::client(Protocol::Tcp);
        socket.connect(host, port)?;
        Ok(socket)
    }

    /// UDP client with a fixed peer
    pub fn connect_udp(host: &str, port: u16) -> Result<Self> {
        let mut socket = Self::client(Protocol::Udp);
        socket.connect(host, port)?;
        Ok(socket)
    }

    /// Listening TCP server
    ///
    /// Without a host the wildcard address of `ip_version` is bound (IPv4
    /// when that is not given either). Without a backlog the configured
    /// default is used.
    pub fn listen_tcp(
        host: Option<&str>,
        port: u16,
        ip_version: Option<IpVersion>,
        backlog: Option<u32>,
    ) -> Result<Self> {
        let mut socket = Self::server(Protocol::Tcp);
        socket.check_listen_args(backlog)?;
        socket.bind(host, port, ip_version)?;
        socket.start_listening(backlog)?;
        Ok(socket)
    }

    /// Bound UDP socket; port 0 picks an ephemeral port
    pub fn bind_udp(host: Option<&str>, port: u16, ip_version: Option<IpVersion>) -> Result<Self> {
        let mut socket = Self::server(Protocol::Udp);
        socket.bind(host, port, ip_version)?;
        Ok(socket)
    }

    /// Resolve `host:port` and connect to it
    ///
    /// Valid only for an uninitialized client. Every resolved address is
    /// tried in preference order; the error from the last one is reported if
    /// none accepts the connection. Role and state are checked before the
    /// arguments, so a closed socket always reports a state error.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        self.connect_via(&AddressResolver::system(), host, port)
    }

    /// [`connect`](Self::connect) with a caller-supplied resolver
    pub fn connect_via<L: NameLookup>(
        &mut self,
        resolver: &AddressResolver<L>,
        host: &str,
        port: u16,
    ) -> Result<()> {
        self.require_role("connect", Role::Client)?;
        self.require_state("connect", &[SocketState::Uninitialized])?;
        if port == 0 {
            return Err(SocketError::argument("cannot connect to port 0"));
        }

        let candidates = resolver.resolve_all(host, port, None)?;
        let mut last_error = None;
        for addr in candidates {
            let handle = match self.open_handle(IpVersion::of(&addr)) {
                Ok(handle) => handle,
                Err(e) => {
                    debug!("cannot open {} handle for {}: {}", self.protocol, addr, e);
                    last_error = Some(e);
                    continue;
                }
            };
            match handle.connect(&SockAddr::from(addr)) {
                Ok(()) => {
                    let local = handle.local_addr().map_err(during(Op::Query))?;
                    self.adopt(handle, addr)?;
                    self.local = socket_addr_of(&local).ok();
                    self.remote = Some(addr);
                    self.state = self.state.transition(SocketState::Connected)?;
                    debug!("{} client connected {:?} -> {}", self.protocol, self.local, addr);
                    return Ok(());
                }
                Err(e) => {
                    debug!("{} connect to {} failed: {}", self.protocol, addr, e);
                    last_error = Some(translate(Op::Connect, &e));
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| SocketError::Connection(format!("no address for {}", host))))
    }

    /// Bind a local endpoint
    ///
    /// Valid only for an uninitialized server. `ip_version` restricts name
    /// resolution of `host`, or picks the wildcard family when `host` is
    /// absent or empty.
    pub fn bind(&mut self, host: Option<&str>, port: u16, ip_version: Option<IpVersion>) -> Result<()> {
        self.require_role("bind", Role::Server)?;
        self.require_state("bind", &[SocketState::Uninitialized])?;

        let addr = match host.map(str::trim).filter(|h| !h.is_empty()) {
            Some(host) => AddressResolver::system().resolve_hinted(host, port, ip_version)?.0,
            None => wildcard(ip_version.unwrap_or(IpVersion::Ipv4), port),
        };

        let handle = self.open_handle(IpVersion::of(&addr))?;
        if self.protocol == Protocol::Tcp && self.config.reuse_address {
            handle.set_reuse_address(true).map_err(during(Op::Bind))?;
        }
        handle.bind(&SockAddr::from(addr)).map_err(during(Op::Bind))?;
        let local = handle.local_addr().map_err(during(Op::Query))?;

        self.adopt(handle, addr)?;
        self.local = Some(socket_addr_of(&local)?);
        self.state = self.state.transition(SocketState::Bound)?;
        debug!("{} server bound to {:?}", self.protocol, self.local);
        Ok(())
    }

    /// Bind and start listening for TCP connections
    pub fn listen(&mut self, host: Option<&str>, port: u16, backlog: Option<u32>) -> Result<()> {
        self.check_listen_args(backlog)?;
        self.bind(host, port, None)?;
        self.start_listening(backlog)
    }

    /// Move a bound TCP server to listening
    pub fn start_listening(&mut self, backlog: Option<u32>) -> Result<()> {
        self.check_listen_args(backlog)?;
        self.require_state("listen", &[SocketState::Bound])?;

        let backlog = backlog.unwrap_or(self.config.listen_backlog);
        let os_backlog = i32::try_from(backlog).unwrap_or(i32::MAX);
        self.handle()?.listen(os_backlog).map_err(during(Op::Listen))?;

        self.listen_backlog = Some(backlog);
        self.state = self.state.transition(SocketState::Listening)?;
        debug!("listening on {:?} with backlog {}", self.local, backlog);
        Ok(())
    }

    fn check_listen_args(&self, backlog: Option<u32>) -> Result<()> {
        if backlog == Some(0) {
            return Err(SocketError::argument("listen backlog must be positive"));
        }
        self.require_protocol("listen", Protocol::Tcp)?;
        self.require_role("listen", Role::Server)
    }

    /// Release the handle and move to `Closed`
    ///
    /// Calling this on a closed socket does nothing. The handle is released
    /// even when the preceding shutdown reports an error; that error is then
    /// returned as a connection error. Outstanding [`InterruptHandle`]s do
    /// not keep the OS socket open.
    pub fn disconnect(&mut self) -> Result<()> {
        if self.state.is_closed() {
            trace!("disconnect on closed socket ignored");
            return Ok(());
        }
        let was = self.state;
        self.state = self.state.transition(SocketState::Closed)?;

        let Some(handle) = self.handle.take() else {
            debug!("closed {} socket that never opened", self.protocol);
            return Ok(());
        };

        let mut result = Ok(());
        if self.protocol == Protocol::Tcp && matches!(was, SocketState::Connected | SocketState::Listening) {
            if let Err(e) = handle.shutdown(std::net::Shutdown::Both) {
                if e.kind() != io::ErrorKind::NotConnected && was == SocketState::Connected {
                    warn!("shutdown before close failed: {}", e);
                    result = Err(translate(Op::Shutdown, &e));
                }
            }
        }
        drop(handle);
        debug!("{} socket {:?} closed (was {})", self.protocol, self.local, was);
        result
    }

    /// Handle that can interrupt this socket from another thread
    ///
    /// [`InterruptHandle::interrupt`] shuts the connection down, which makes
    /// a `read` blocked on the owning thread return, and on Linux makes a
    /// blocked `accept` fail. The owner still has to `disconnect`.
    pub fn interrupt_handle(&self) -> Result<InterruptHandle> {
        let handle = self.handle.as_ref().ok_or_else(|| self.missing_handle())?;
        Ok(InterruptHandle {
            handle: Arc::downgrade(handle),
        })
    }

    /// Current blocking mode
    pub fn blocking(&self) -> bool {
        self.blocking
    }

    /// Change blocking mode
    ///
    /// On an uninitialized socket the mode is remembered and applied when
    /// the handle is opened.
    pub fn set_blocking(&mut self, blocking: bool) -> Result<()> {
        if self.state.is_closed() {
            return Err(SocketError::state("cannot change blocking mode of a closed socket"));
        }
        if let Some(handle) = &self.handle {
            handle.set_nonblocking(!blocking).map_err(during(Op::Blocking))?;
        }
        self.blocking = blocking;
        Ok(())
    }

    /// Remote host (peer of a connected socket)
    pub fn host_from(&self) -> Result<String> {
        Ok(self.peer_addr()?.ip().to_string())
    }

    /// Remote port
    pub fn port_from(&self) -> Result<u16> {
        Ok(self.peer_addr()?.port())
    }

    /// Local host
    pub fn host_to(&self) -> Result<String> {
        Ok(self.local_addr()?.ip().to_string())
    }

    /// Local port
    pub fn port_to(&self) -> Result<u16> {
        Ok(self.local_addr()?.port())
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.require_open("local address")?;
        self.local
            .ok_or_else(|| SocketError::state("socket has no local endpoint"))
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.require_open("remote address")?;
        self.remote
            .ok_or_else(|| SocketError::state("socket has no fixed remote endpoint"))
    }

    /// Backlog of a listening server
    pub fn listen_queue(&self) -> Result<u32> {
        if self.role != Role::Server {
            return Err(SocketError::state("listen queue exists only on server sockets"));
        }
        self.listen_backlog
            .ok_or_else(|| SocketError::state("server socket is not listening"))
    }

    /// Buffer size a read without an explicit size would use
    pub fn next_read_size(&self) -> usize {
        match &self.handle {
            Some(handle) => read_sizer::next_read_size(handle, &self.config),
            None => self.config.default_read_size,
        }
    }

    /// Raw OS identifier of the handle, `None` when there is none
    ///
    /// For diagnostics only; ownership stays with this socket.
    #[cfg(unix)]
    pub fn socket_handler(&self) -> Option<RawHandle> {
        use std::os::unix::io::AsRawFd;
        self.handle.as_ref().map(|h| h.as_raw_fd())
    }

    #[cfg(windows)]
    pub fn socket_handler(&self) -> Option<RawHandle> {
        use std::os::windows::io::AsRawSocket;
        self.handle.as_ref().map(|h| h.as_raw_socket())
    }

    pub fn state(&self) -> SocketState {
        self.state
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// IP version, known once the address has been resolved
    pub fn ip_version(&self) -> Option<IpVersion> {
        self.ip_version
    }

    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    pub fn is_client(&self) -> bool {
        self.role == Role::Client
    }

    pub fn is_server(&self) -> bool {
        self.role == Role::Server
    }

    pub fn is_tcp(&self) -> bool {
        self.protocol == Protocol::Tcp
    }

    pub fn is_udp(&self) -> bool {
        self.protocol == Protocol::Udp
    }

    pub fn is_ipv4(&self) -> bool {
        self.ip_version == Some(IpVersion::Ipv4)
    }

    pub fn is_ipv6(&self) -> bool {
        self.ip_version == Some(IpVersion::Ipv6)
    }

    fn open_handle(&self, ip_version: IpVersion) -> Result<Socket2> {
        let (ty, proto) = type_of(self.protocol);
        Socket2::new(domain_of(ip_version), ty, Some(proto)).map_err(during(Op::Open))
    }

    /// Take ownership of a freshly opened handle and apply the blocking mode
    fn adopt(&mut self, handle: Socket2, addr: SocketAddr) -> Result<()> {
        handle.set_nonblocking(!self.blocking).map_err(during(Op::Blocking))?;
        self.ip_version = Some(IpVersion::of(&addr));
        self.handle = Some(Arc::new(handle));
        Ok(())
    }

    pub(crate) fn handle(&self) -> Result<&Socket2> {
        self.handle.as_deref().ok_or_else(|| self.missing_handle())
    }

    fn missing_handle(&self) -> SocketError {
        match self.state {
            SocketState::Closed => SocketError::state("socket is closed"),
            _ => SocketError::state("socket has no open handle"),
        }
    }

    pub(crate) fn require_state(&self, op: &str, allowed: &[SocketState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SocketError::state(format!(
                "{} is not valid on a {} socket",
                op, self.state
            )))
        }
    }

    pub(crate) fn require_protocol(&self, op: &str, protocol: Protocol) -> Result<()> {
        if self.protocol == protocol {
            Ok(())
        } else {
            Err(SocketError::state(format!(
                "{} requires a {} socket, this one is {}",
                op, protocol, self.protocol
            )))
        }
    }

    pub(crate) fn require_role(&self, op: &str, role: Role) -> Result<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(SocketError::state(format!(
                "{} requires a {:?} socket, this one is {:?}",
                op, role, self.role
            )))
        }
    }

    fn require_open(&self, what: &str) -> Result<()> {
        if self.state.is_closed() {
            Err(SocketError::state(format!("{} of a closed socket", what)))
        } else {
            Ok(())
        }
    }

    /// Buffer size for a read: the caller's, or the OS-suggested one, never
    /// above the configured maximum
    pub(crate) fn read_size(&self, max_bytes: Option<usize>) -> Result<usize> {
        match max_bytes {
            Some(0) => Err(SocketError::argument("read size must be positive")),
            Some(n) => Ok(n.min(self.config.max_read_size)),
            None => Ok(self.next_read_size()),
        }
    }

    /// Wait until the handle can take more data or the configured write
    /// timeout passes. Returns false on timeout.
    pub(crate) fn wait_writable(&self, started: Instant) -> Result<bool> {
        let remaining = self.config.write_timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Ok(false);
        }
        poll_writable(self.handle()?, remaining).map_err(during(Op::Write))
    }
}

#[cfg(unix)]
fn poll_writable(handle: &Socket2, timeout: Duration) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let mut fds = libc::pollfd {
        fd: handle.as_raw_fd(),
        events: libc::POLLOUT,
        revents: 0,
    };
    let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
    loop {
        // SAFETY: `fds` is a single live pollfd and the count passed is 1.
        let rc = unsafe { libc::poll(&mut fds, 1, millis) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        return Ok(rc > 0);
    }
}

#[cfg(not(unix))]
fn poll_writable(_handle: &Socket2, timeout: Duration) -> io::Result<bool> {
    std::thread::sleep(timeout.min(Duration::from_millis(1)));
    Ok(true)
}

impl Drop for Socket {
    fn drop(&mut self) {
        if self.handle.is_some() {
            debug!("dropping open {} socket {:?}", self.protocol, self.local);
        }
    }
}

/// Shuts a socket down from another thread
///
/// Holds only a weak reference: once the owner disconnects or drops the
/// socket, `interrupt` has nothing left to do.
#[derive(Debug)]
pub struct InterruptHandle {
    handle: Weak<Socket2>,
}

impl InterruptHandle {
    /// Shut down both directions; a connection that is already gone is not an error
    pub fn interrupt(&self) -> Result<()> {
        let Some(handle) = self.handle.upgrade() else {
            trace!("interrupt after close ignored");
            return Ok(());
        };
        match handle.shutdown(std::net::Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(translate(Op::Shutdown, &e)),
        }
    }
}
