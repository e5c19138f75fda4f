//! TCP Module
//!
//! Connection-oriented operations on [`Socket`]: accepting peers, reading
//! from a stream and writing to a connected peer. `write` also serves UDP
//! sockets that were given a fixed peer by `connect`.

use std::io::Read;
use std::sync::Arc;
use std::time::Instant;

use entities_netlink::{Outcome, Protocol, Result, Role, SocketError, SocketState};
use log::{debug, trace};

use crate::socket::{socket_addr_of, Socket};
use crate::translate::{during, is_interrupted, is_would_block, translate, Op};

/// Flags for `send`: no SIGPIPE on a connection the peer already closed
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) const SEND_FLAGS: i32 = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub(crate) const SEND_FLAGS: i32 = 0;

impl Socket {
    /// Accept a pending connection
    ///
    /// Valid only on a listening TCP server. The listener keeps listening;
    /// the returned socket owns its own handle, is `Connected`, blocking, and
    /// carries the peer as its remote endpoint. In non-blocking mode with no
    /// pending connection the result is `Outcome::WouldBlock`.
    pub fn accept(&self) -> Result<Outcome<Socket>> {
        self.require_protocol("accept", Protocol::Tcp)?;
        self.require_role("accept", Role::Server)?;
        self.require_state("accept", &[SocketState::Listening])?;
        let listener = self.handle()?;

        let (handle, peer) = loop {
            match listener.accept() {
                Ok(accepted) => break accepted,
                Err(e) if is_would_block(&e) => return Ok(Outcome::WouldBlock),
                Err(e) if is_interrupted(&e) => continue,
                Err(e) => return Err(translate(Op::Accept, &e)),
            }
        };

        handle.set_nonblocking(false).map_err(during(Op::Blocking))?;
        let peer = socket_addr_of(&peer)?;
        let local = handle.local_addr().map_err(during(Op::Query))?;

        let mut accepted = Socket::uninitialized(Protocol::Tcp, Role::Client, self.config);
        accepted.handle = Some(Arc::new(handle));
        accepted.ip_version = self.ip_version;
        accepted.blocking = true;
        accepted.local = socket_addr_of(&local).ok();
        accepted.remote = Some(peer);
        accepted.state = accepted.state.transition(SocketState::Connected)?;

        debug!("accepted {} on {:?}", peer, self.local);
        Ok(Outcome::Ready(accepted))
    }

    /// Read up to `max_bytes` from a connected TCP socket
    ///
    /// Without `max_bytes` the size comes from [`next_read_size`](Self::next_read_size).
    /// A larger `max_bytes` than the configured maximum read size is capped
    /// to it. An empty result means the peer shut the connection down. In
    /// non-blocking mode with nothing pending the result is
    /// `Outcome::WouldBlock`.
    pub fn read(&mut self, max_bytes: Option<usize>) -> Result<Outcome<Vec<u8>>> {
        if max_bytes == Some(0) {
            return Err(SocketError::argument("read size must be positive"));
        }
        self.require_protocol("read", Protocol::Tcp)?;
        self.require_state("read", &[SocketState::Connected])?;

        let size = self.read_size(max_bytes)?;
        let mut buffer = vec![0u8; size];
        let mut stream = self.handle()?;

        let n = loop {
            match stream.read(&mut buffer) {
                Ok(n) => break n,
                Err(e) if is_would_block(&e) => return Ok(Outcome::WouldBlock),
                Err(e) if is_interrupted(&e) => continue,
                Err(e) => return Err(translate(Op::Read, &e)),
            }
        };
        buffer.truncate(n);
        trace!("read {} of {} bytes from {:?}", n, size, self.remote);
        Ok(Outcome::Ready(buffer))
    }

    /// Write all of `data` to the connected peer
    ///
    /// A TCP write loops until every byte has been handed to the OS. In
    /// non-blocking mode a handle that cannot take a single byte yields
    /// `Outcome::WouldBlock` and nothing is sent. Once part of `data` is out
    /// the write has to finish: it waits for the handle to become writable
    /// again, up to the configured write timeout, and fails with an I/O error
    /// after that. It never reports a short write as success. On a UDP
    /// socket with a fixed peer `data` goes out as one datagram.
    pub fn write(&mut self, data: &[u8]) -> Result<Outcome<()>> {
        self.require_state("write", &[SocketState::Connected])?;
        if self.protocol == Protocol::Udp {
            return self.send_datagram(None, data);
        }

        let handle = self.handle()?;
        let started = Instant::now();
        let mut written = 0;
        while written < data.len() {
            match handle.send_with_flags(&data[written..], SEND_FLAGS) {
                Ok(0) => {
                    return Err(SocketError::Io(format!(
                        "connection stopped accepting data after {} of {} bytes",
                        written,
                        data.len()
                    )))
                }
                Ok(n) => written += n,
                Err(e) if is_interrupted(&e) => continue,
                Err(e) if is_would_block(&e) => {
                    if written == 0 {
                        return Ok(Outcome::WouldBlock);
                    }
                    if !self.wait_writable(started)? {
                        return Err(SocketError::Io(format!(
                            "write timed out after {} of {} bytes",
                            written,
                            data.len()
                        )));
                    }
                }
                Err(e) => return Err(translate(Op::Write, &e)),
            }
        }
        trace!("wrote {} bytes to {:?}", written, self.remote);
        Ok(Outcome::Ready(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SocketConfig;
    use entities_netlink::ErrorKind;
    use std::thread;
    use std::time::Duration;

    fn pair() -> (Socket, Socket, Socket) {
        let listener = Socket::listen_tcp(Some("127.0.0.1"), 0, None, None).unwrap();
        let port = listener.port_to().unwrap();
        let client = Socket::connect_tcp("127.0.0.1", port).unwrap();
        let accepted = listener.accept().unwrap().ready().unwrap();
        (listener, client, accepted)
    }

    fn read_exactly(socket: &mut Socket, len: usize) -> Vec<u8> {
        let mut received = Vec::new();
        while received.len() < len {
            let want = (len - received.len()).min(64 * 1024);
            let chunk = socket.read(Some(want)).unwrap().ready().unwrap();
            assert!(!chunk.is_empty(), "peer closed early");
            received.extend_from_slice(&chunk);
        }
        received
    }

    #[test]
    fn test_accept_yields_connected_socket() {
        let (listener, client, accepted) = pair();

        assert_eq!(listener.state(), SocketState::Listening);
        assert_eq!(accepted.state(), SocketState::Connected);
        assert!(accepted.is_tcp());
        assert!(accepted.is_client());
        assert!(accepted.is_ipv4());
        assert!(accepted.is_blocking());
        assert_eq!(accepted.port_from().unwrap(), client.port_to().unwrap());
        assert_eq!(accepted.port_to().unwrap(), listener.port_to().unwrap());
        assert_ne!(accepted.socket_handler(), listener.socket_handler());
    }

    #[test]
    fn test_listener_keeps_accepting() {
        let listener = Socket::listen_tcp(Some("127.0.0.1"), 0, None, None).unwrap();
        let port = listener.port_to().unwrap();
        let _first = Socket::connect_tcp("127.0.0.1", port).unwrap();
        let _second = Socket::connect_tcp("127.0.0.1", port).unwrap();

        assert!(listener.accept().unwrap().is_ready());
        assert!(listener.accept().unwrap().is_ready());
        assert_eq!(listener.state(), SocketState::Listening);
    }

    #[test]
    fn test_accept_non_blocking_without_peer() {
        let mut listener = Socket::listen_tcp(Some("127.0.0.1"), 0, None, None).unwrap();
        listener.set_blocking(false).unwrap();
        assert_eq!(listener.accept().unwrap().ready().map(|_| ()), None);
    }

    #[test]
    fn test_accept_on_client_is_state_error() {
        let (_listener, client, _accepted) = pair();
        assert_eq!(client.accept().unwrap_err().kind(), ErrorKind::State);
    }

    #[test]
    fn test_accept_on_udp_is_state_error() {
        let udp = Socket::bind_udp(Some("127.0.0.1"), 0, None).unwrap();
        assert_eq!(udp.accept().unwrap_err().kind(), ErrorKind::State);
    }

    #[test]
    fn test_accept_on_closed_listener_is_state_error() {
        let mut listener = Socket::listen_tcp(Some("127.0.0.1"), 0, None, None).unwrap();
        listener.disconnect().unwrap();
        assert_eq!(listener.accept().unwrap_err().kind(), ErrorKind::State);
    }

    #[test]
    fn test_write_then_read() {
        let (_listener, mut client, mut accepted) = pair();
        client.write(b"ping").unwrap();
        assert_eq!(read_exactly(&mut accepted, 4), b"ping");

        accepted.write(b"pong").unwrap();
        assert_eq!(read_exactly(&mut client, 4), b"pong");
    }

    #[test]
    fn test_read_after_peer_shutdown_is_empty() {
        let (_listener, mut client, mut accepted) = pair();
        client.disconnect().unwrap();
        let read = accepted.read(None).unwrap();
        assert_eq!(read, Outcome::Ready(Vec::new()));
    }

    #[test]
    fn test_non_blocking_read_without_data() {
        let (_listener, _client, mut accepted) = pair();
        accepted.set_blocking(false).unwrap();
        assert_eq!(accepted.read(None).unwrap(), Outcome::WouldBlock);
        assert_eq!(accepted.read(Some(16)).unwrap(), Outcome::WouldBlock);
    }

    #[test]
    fn test_read_zero_bytes_is_argument_error() {
        let (_listener, _client, mut accepted) = pair();
        assert_eq!(accepted.read(Some(0)).unwrap_err().kind(), ErrorKind::Argument);
    }

    #[test]
    fn test_read_on_listener_is_state_error() {
        let mut listener = Socket::listen_tcp(Some("127.0.0.1"), 0, None, None).unwrap();
        assert_eq!(listener.read(None).unwrap_err().kind(), ErrorKind::State);
        assert_eq!(listener.write(b"x").unwrap_err().kind(), ErrorKind::State);
    }

    #[test]
    fn test_read_on_udp_is_state_error() {
        let mut udp = Socket::bind_udp(Some("127.0.0.1"), 0, None).unwrap();
        assert_eq!(udp.read(None).unwrap_err().kind(), ErrorKind::State);
    }

    #[test]
    fn test_next_read_size_reports_pending_bytes() {
        let (_listener, mut client, accepted) = pair();
        client.write(&[9u8; 10]).unwrap();
        let mut size = 0;
        for _ in 0..50 {
            size = accepted.next_read_size();
            if size == 10 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(size, 10);
    }

    #[test]
    fn test_large_write_drains_in_non_blocking_mode() {
        let (_listener, mut client, mut accepted) = pair();
        client.set_blocking(false).unwrap();
        let payload: Vec<u8> = (0..4 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
        let expected = payload.clone();

        let reader = thread::spawn(move || read_exactly(&mut accepted, expected.len()) == expected);
        assert_eq!(client.write(&payload).unwrap(), Outcome::Ready(()));
        assert!(reader.join().unwrap());
    }

    /// Non-blocking client with a 50ms write timeout and a peer that never reads
    fn stalled_pair() -> (Socket, Socket, Socket) {
        let config = SocketConfig {
            write_timeout: Duration::from_millis(50),
            ..SocketConfig::default()
        };
        let listener = Socket::listen_tcp(Some("127.0.0.1"), 0, None, None).unwrap();
        let mut client = Socket::client_with_config(Protocol::Tcp, config).unwrap();
        client.connect("127.0.0.1", listener.port_to().unwrap()).unwrap();
        let idle_peer = listener.accept().unwrap().ready().unwrap();
        client.set_blocking(false).unwrap();
        (listener, client, idle_peer)
    }

    #[test]
    fn test_write_times_out_when_peer_never_reads() {
        let (_listener, mut client, _idle_peer) = stalled_pair();

        let payload = vec![5u8; 32 * 1024 * 1024];
        let err = client.write(&payload).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);

        // A second large write can never come back as a completed write.
        let again = client.write(&payload);
        assert!(!matches!(again, Ok(Outcome::Ready(()))));
    }

    #[test]
    fn test_write_would_block_when_send_buffer_full() {
        let (_listener, mut client, _idle_peer) = stalled_pair();
        let _ = client.write(&vec![5u8; 32 * 1024 * 1024]);

        let mut blocked = false;
        for _ in 0..1_000_000 {
            if client.write(b"x").unwrap().is_would_block() {
                blocked = true;
                break;
            }
        }
        assert!(blocked);
    }

    #[test]
    fn test_huge_read_size_is_capped() {
        let (_listener, mut client, mut accepted) = pair();
        client.write(b"capped").unwrap();
        let data = accepted.read(Some(usize::MAX)).unwrap().ready().unwrap();
        assert!(!data.is_empty());
        assert!(b"capped".starts_with(&data));
    }

    #[test]
    fn test_interrupt_unblocks_read() {
        let (_listener, _client, mut accepted) = pair();
        let interrupter = accepted.interrupt_handle().unwrap();

        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            interrupter.interrupt().unwrap();
        });
        let read = accepted.read(None).unwrap();
        assert_eq!(read, Outcome::Ready(Vec::new()));
        stopper.join().unwrap();
        accepted.disconnect().unwrap();
    }
}
