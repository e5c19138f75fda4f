//! UDP Module
//!
//! Connectionless operations on [`Socket`]. Every `read_from` is an
//! independent datagram carrying its own sender; every `write_to` names its
//! own destination, regardless of any peer fixed by `connect`.

use std::mem::MaybeUninit;

use entities_netlink::{Datagram, Outcome, Protocol, Result, SocketError, SocketState};
use log::trace;
use socket2::SockAddr;

use crate::resolver::AddressResolver;
use crate::socket::{socket_addr_of, Socket};
use crate::tcp::SEND_FLAGS;
use crate::translate::{is_interrupted, is_would_block, translate, Op};

impl Socket {
    /// Read one datagram and its sender
    ///
    /// Valid on a bound or connected UDP socket. Without `max_bytes` the size
    /// comes from [`next_read_size`](Self::next_read_size); a larger one is
    /// capped to the configured maximum read size. A datagram longer than the
    /// buffer is truncated to it. In non-blocking mode with nothing
    /// queued the result is `Outcome::WouldBlock`.
    pub fn read_from(&mut self, max_bytes: Option<usize>) -> Result<Outcome<Datagram>> {
        if max_bytes == Some(0) {
            return Err(SocketError::argument("read size must be positive"));
        }
        self.require_protocol("read_from", Protocol::Udp)?;
        self.require_state("read_from", &[SocketState::Bound, SocketState::Connected])?;

        let size = self.read_size(max_bytes)?;
        let mut buffer = vec![0u8; size];
        let handle = self.handle()?;

        // SAFETY: the buffer is fully initialized and recv_from only ever
        // writes initialized bytes into it.
        let uninit: &mut [MaybeUninit<u8>] = unsafe {
            std::slice::from_raw_parts_mut(buffer.as_mut_ptr() as *mut MaybeUninit<u8>, buffer.len())
        };

        let (n, sender) = loop {
            match handle.recv_from(uninit) {
                Ok(received) => break received,
                Err(e) if is_would_block(&e) => return Ok(Outcome::WouldBlock),
                Err(e) if is_interrupted(&e) => continue,
                Err(e) => return Err(translate(Op::Read, &e)),
            }
        };
        let sender = socket_addr_of(&sender)?;
        buffer.truncate(n);
        trace!("read datagram of {} bytes from {}", n, sender);

        Ok(Outcome::Ready(Datagram {
            host: sender.ip().to_string(),
            port: sender.port(),
            data: buffer,
        }))
    }

    /// Send `data` as one datagram to `host:port`
    ///
    /// Valid on a bound or connected UDP socket. The destination is resolved
    /// within the socket's own IP version. In non-blocking mode a full send
    /// buffer yields `Outcome::WouldBlock` and nothing is sent.
    pub fn write_to(&mut self, host: &str, port: u16, data: &[u8]) -> Result<Outcome<()>> {
        if host.trim().is_empty() {
            return Err(SocketError::argument("write_to needs a destination host"));
        }
        if port == 0 {
            return Err(SocketError::argument("cannot send to port 0"));
        }
        self.require_protocol("write_to", Protocol::Udp)?;
        self.require_state("write_to", &[SocketState::Bound, SocketState::Connected])?;

        let (target, _) = AddressResolver::system().resolve_hinted(host, port, self.ip_version)?;
        self.send_datagram(Some(&SockAddr::from(target)), data)
    }

    /// Send one datagram, to `target` or to the fixed peer
    pub(crate) fn send_datagram(&self, target: Option<&SockAddr>, data: &[u8]) -> Result<Outcome<()>> {
        let handle = self.handle()?;
        let sent = loop {
            let attempt = match target {
                Some(addr) => handle.send_to_with_flags(data, addr, SEND_FLAGS),
                None => handle.send_with_flags(data, SEND_FLAGS),
            };
            match attempt {
                Ok(n) => break n,
                Err(e) if is_interrupted(&e) => continue,
                Err(e) if is_would_block(&e) => return Ok(Outcome::WouldBlock),
                Err(e) => return Err(translate(Op::Write, &e)),
            }
        };

        if sent != data.len() {
            return Err(SocketError::Io(format!(
                "datagram truncated: sent {} of {} bytes",
                sent,
                data.len()
            )));
        }
        trace!("sent datagram of {} bytes to {:?}", sent, target.and_then(|a| a.as_socket()));
        Ok(Outcome::Ready(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entities_netlink::{ErrorKind, IpVersion};

    fn bound() -> Socket {
        Socket::bind_udp(Some("127.0.0.1"), 0, None).unwrap()
    }

    #[test]
    fn test_bind_udp_defaults() {
        let socket = Socket::bind_udp(None, 0, None).unwrap();
        assert!(socket.is_udp());
        assert!(socket.is_server());
        assert!(socket.is_ipv4());
        assert_eq!(socket.state(), SocketState::Bound);
        assert_eq!(socket.host_to().unwrap(), "0.0.0.0");
        assert!(socket.port_to().unwrap() > 0);
        assert_eq!(socket.listen_queue().unwrap_err().kind(), ErrorKind::State);
    }

    #[test]
    fn test_write_to_then_read_from() {
        let mut receiver = bound();
        let mut sender = bound();
        let port = receiver.port_to().unwrap();

        sender.write_to("127.0.0.1", port, b"hello").unwrap();
        let datagram = receiver.read_from(None).unwrap().ready().unwrap();

        assert_eq!(datagram.data, b"hello");
        assert_eq!(datagram.host, "127.0.0.1");
        assert_eq!(datagram.port, sender.port_to().unwrap());
    }

    #[test]
    fn test_read_from_truncates_to_buffer() {
        let mut receiver = bound();
        let mut sender = bound();
        let port = receiver.port_to().unwrap();

        sender.write_to("127.0.0.1", port, b"0123456789").unwrap();
        let datagram = receiver.read_from(Some(4)).unwrap().ready().unwrap();
        assert_eq!(datagram.data, b"0123");
    }

    #[test]
    fn test_huge_read_from_size_is_capped() {
        let mut receiver = bound();
        let mut sender = bound();
        let port = receiver.port_to().unwrap();

        assert_eq!(
            sender.write_to("127.0.0.1", port, b"big ask").unwrap(),
            Outcome::Ready(())
        );
        let datagram = receiver.read_from(Some(usize::MAX)).unwrap().ready().unwrap();
        assert_eq!(datagram.data, b"big ask");
    }

    #[test]
    fn test_read_from_nothing_non_blocking() {
        let mut receiver = bound();
        receiver.set_blocking(false).unwrap();
        assert_eq!(receiver.read_from(None).unwrap(), Outcome::WouldBlock);
    }

    #[test]
    fn test_connected_udp_write_and_peer() {
        let mut receiver = bound();
        let port = receiver.port_to().unwrap();
        let mut client = Socket::connect_udp("127.0.0.1", port).unwrap();

        assert!(client.is_client());
        assert_eq!(client.state(), SocketState::Connected);
        assert_eq!(client.port_from().unwrap(), port);

        client.write(b"fixed peer").unwrap();
        let datagram = receiver.read_from(None).unwrap().ready().unwrap();
        assert_eq!(datagram.data, b"fixed peer");
        assert_eq!(datagram.port, client.port_to().unwrap());
    }

    #[test]
    fn test_write_to_ignores_fixed_peer() {
        let mut first = bound();
        let mut second = bound();
        let mut client = Socket::connect_udp("127.0.0.1", first.port_to().unwrap()).unwrap();

        client
            .write_to("127.0.0.1", second.port_to().unwrap(), b"elsewhere")
            .unwrap();
        let datagram = second.read_from(None).unwrap().ready().unwrap();
        assert_eq!(datagram.data, b"elsewhere");

        first.set_blocking(false).unwrap();
        assert_eq!(first.read_from(None).unwrap(), Outcome::WouldBlock);
    }

    #[test]
    fn test_ipv6_datagrams() {
        let mut receiver = Socket::bind_udp(Some("::1"), 0, Some(IpVersion::Ipv6)).unwrap();
        let mut sender = Socket::bind_udp(Some("::1"), 0, Some(IpVersion::Ipv6)).unwrap();
        assert!(receiver.is_ipv6());

        sender
            .write_to("::1", receiver.port_to().unwrap(), b"six")
            .unwrap();
        let datagram = receiver.read_from(None).unwrap().ready().unwrap();
        assert_eq!(datagram.host, "::1");
        assert_eq!(datagram.data, b"six");
    }

    #[test]
    fn test_write_to_argument_errors() {
        let mut socket = bound();
        assert_eq!(
            socket.write_to("", 9, b"x").unwrap_err().kind(),
            ErrorKind::Argument
        );
        assert_eq!(
            socket.write_to("127.0.0.1", 0, b"x").unwrap_err().kind(),
            ErrorKind::Argument
        );
    }

    #[test]
    fn test_udp_ops_on_tcp_are_state_errors() {
        let mut listener = Socket::listen_tcp(Some("127.0.0.1"), 0, None, None).unwrap();
        assert_eq!(listener.read_from(None).unwrap_err().kind(), ErrorKind::State);
        assert_eq!(
            listener.write_to("127.0.0.1", 9, b"x").unwrap_err().kind(),
            ErrorKind::State
        );
    }

    #[test]
    fn test_udp_ops_on_closed_socket_are_state_errors() {
        let mut socket = bound();
        socket.disconnect().unwrap();
        assert_eq!(socket.read_from(None).unwrap_err().kind(), ErrorKind::State);
        assert_eq!(
            socket.write_to("127.0.0.1", 9, b"x").unwrap_err().kind(),
            ErrorKind::State
        );
    }

    #[test]
    fn test_write_on_bound_udp_is_state_error() {
        let mut socket = bound();
        assert_eq!(socket.write(b"x").unwrap_err().kind(), ErrorKind::State);
    }
}
