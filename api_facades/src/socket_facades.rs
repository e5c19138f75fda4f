//! Socket Facades
//!
//! One function per row of the host-facing operation table. Each checks its
//! arguments, then calls the socket core. Would-block results come back as
//! `None`, which a binding maps to its "nothing" value.

use adapters_netlink::resolver::checked_port;
use adapters_netlink::Socket;
use entities_netlink::{Datagram, IpVersion, Result, SocketError};
use log::debug;

use crate::host_value::HostValue;

static ABSENT: HostValue = HostValue::Undefined;

fn arg(args: &[HostValue], index: usize) -> &HostValue {
    args.get(index).unwrap_or(&ABSENT)
}

fn rejected(op: &str, position: usize, expected: &str, got: &HostValue) -> SocketError {
    let err = SocketError::argument(format!(
        "{}: argument {} must be {}, got {}",
        op,
        position + 1,
        expected,
        got.kind_name()
    ));
    debug!("{}", err);
    err
}

fn require_count(op: &str, args: &[HostValue], needed: usize) -> Result<()> {
    if args.len() < needed {
        let err = SocketError::argument(format!(
            "{} needs {} arguments, got {}",
            op,
            needed,
            args.len()
        ));
        debug!("{}", err);
        return Err(err);
    }
    Ok(())
}

fn require_string<'a>(op: &str, args: &'a [HostValue], index: usize) -> Result<&'a str> {
    match arg(args, index) {
        HostValue::String(s) => Ok(s.as_str()),
        other => Err(rejected(op, index, "a host string", other)),
    }
}

fn optional_string<'a>(op: &str, args: &'a [HostValue], index: usize) -> Result<Option<&'a str>> {
    match arg(args, index) {
        HostValue::Undefined => Ok(None),
        HostValue::String(s) => Ok(Some(s.as_str())),
        other => Err(rejected(op, index, "a host string", other)),
    }
}

fn integer(op: &str, index: usize, value: &HostValue, expected: &str) -> Result<i64> {
    match value {
        HostValue::Number(n) if n.is_finite() && n.fract() == 0.0 => Ok(*n as i64),
        other => Err(rejected(op, index, expected, other)),
    }
}

/// Port argument: must be an integral number; out-of-range values are
/// resolution errors, not argument errors
fn require_port(op: &str, args: &[HostValue], index: usize, host: &str) -> Result<u16> {
    let port = integer(op, index, arg(args, index), "a port number")?;
    checked_port(host, port)
}

fn optional_port(op: &str, args: &[HostValue], index: usize, host: &str) -> Result<u16> {
    if arg(args, index).is_absent() {
        return Ok(0);
    }
    require_port(op, args, index, host)
}

fn optional_positive(op: &str, args: &[HostValue], index: usize, what: &str) -> Result<Option<usize>> {
    let value = arg(args, index);
    if value.is_absent() {
        return Ok(None);
    }
    let expected = format!("a positive {}", what);
    let n = integer(op, index, value, &expected)?;
    match usize::try_from(n) {
        Ok(size) if size > 0 => Ok(Some(size)),
        _ => Err(rejected(op, index, &expected, value)),
    }
}

fn optional_ip_version(op: &str, args: &[HostValue], index: usize) -> Result<Option<IpVersion>> {
    match arg(args, index) {
        HostValue::Undefined => Ok(None),
        HostValue::String(s) => IpVersion::parse(s)
            .map(Some)
            .ok_or_else(|| rejected(op, index, "\"IPv4\" or \"IPv6\"", arg(args, index))),
        other => Err(rejected(op, index, "\"IPv4\" or \"IPv6\"", other)),
    }
}

fn require_payload<'a>(op: &str, args: &'a [HostValue], index: usize) -> Result<&'a [u8]> {
    match arg(args, index) {
        HostValue::String(s) => Ok(s.as_bytes()),
        HostValue::Bytes(b) => Ok(b.as_slice()),
        other => Err(rejected(op, index, "a string or byte buffer", other)),
    }
}

/// `new ClientTCP(host, port)`
pub fn new_client_tcp(args: &[HostValue]) -> Result<Socket> {
    const OP: &str = "client construction";
    require_count(OP, args, 2)?;
    let host = require_string(OP, args, 0)?;
    let port = require_port(OP, args, 1, host)?;
    Socket::connect_tcp(host, port)
}

/// `new ClientUDP(host, port)`: UDP socket with a fixed peer
pub fn new_client_udp(args: &[HostValue]) -> Result<Socket> {
    const OP: &str = "UDP client construction";
    require_count(OP, args, 2)?;
    let host = require_string(OP, args, 0)?;
    let port = require_port(OP, args, 1, host)?;
    Socket::connect_udp(host, port)
}

/// `new ServerTCP(port, host?, ipVersion?, backlog?)`
pub fn new_server_tcp(args: &[HostValue]) -> Result<Socket> {
    const OP: &str = "server construction";
    require_count(OP, args, 1)?;
    let host = optional_string(OP, args, 1)?;
    let port = require_port(OP, args, 0, host.unwrap_or(""))?;
    let ip_version = optional_ip_version(OP, args, 2)?;
    let backlog = optional_positive(OP, args, 3, "backlog")?
        .map(|b| u32::try_from(b).unwrap_or(u32::MAX));
    Socket::listen_tcp(host, port, ip_version, backlog)
}

/// `new UDP(port?, host?, ipVersion?)`
pub fn new_udp(args: &[HostValue]) -> Result<Socket> {
    const OP: &str = "UDP construction";
    let host = optional_string(OP, args, 1)?;
    let port = optional_port(OP, args, 0, host.unwrap_or(""))?;
    let ip_version = optional_ip_version(OP, args, 2)?;
    Socket::bind_udp(host, port, ip_version)
}

/// `accept()`: `None` when non-blocking and nothing is pending
pub fn accept(socket: &Socket) -> Result<Option<Socket>> {
    Ok(socket.accept()?.ready())
}

/// `disconnect()`
pub fn disconnect(socket: &mut Socket) -> Result<()> {
    socket.disconnect()
}

/// `read(maxBytes?)`: `None` when non-blocking and nothing is pending
pub fn read(socket: &mut Socket, args: &[HostValue]) -> Result<Option<Vec<u8>>> {
    let max_bytes = optional_positive("read", args, 0, "byte count")?;
    Ok(socket.read(max_bytes)?.ready())
}

/// `readFrom(maxBytes?)`: `None` when non-blocking and nothing is pending
pub fn read_from(socket: &mut Socket, args: &[HostValue]) -> Result<Option<Datagram>> {
    let max_bytes = optional_positive("readFrom", args, 0, "byte count")?;
    Ok(socket.read_from(max_bytes)?.ready())
}

/// `write(data)`: `false` when non-blocking and nothing could be sent
pub fn write(socket: &mut Socket, args: &[HostValue]) -> Result<bool> {
    require_count("write", args, 1)?;
    let data = require_payload("write", args, 0)?;
    Ok(socket.write(data)?.is_ready())
}

/// `writeTo(host, port, data)`: `false` when non-blocking and the datagram
/// could not be queued
pub fn write_to(socket: &mut Socket, args: &[HostValue]) -> Result<bool> {
    const OP: &str = "writeTo";
    require_count(OP, args, 3)?;
    let host = require_string(OP, args, 0)?;
    let port = require_port(OP, args, 1, host)?;
    let data = require_payload(OP, args, 2)?;
    Ok(socket.write_to(host, port, data)?.is_ready())
}

/// `isBlocking` getter
pub fn is_blocking(socket: &Socket) -> bool {
    socket.is_blocking()
}

/// `setBlocking(blocking)`
pub fn set_blocking(socket: &mut Socket, args: &[HostValue]) -> Result<()> {
    require_count("setBlocking", args, 1)?;
    match arg(args, 0) {
        HostValue::Bool(blocking) => socket.set_blocking(*blocking),
        other => Err(rejected("setBlocking", 0, "a boolean", other)),
    }
}

pub fn is_client(socket: &Socket) -> bool {
    socket.is_client()
}

pub fn is_server(socket: &Socket) -> bool {
    socket.is_server()
}

pub fn is_tcp(socket: &Socket) -> bool {
    socket.is_tcp()
}

pub fn is_udp(socket: &Socket) -> bool {
    socket.is_udp()
}

pub fn is_ipv4(socket: &Socket) -> bool {
    socket.is_ipv4()
}

pub fn is_ipv6(socket: &Socket) -> bool {
    socket.is_ipv6()
}

pub fn get_host_from(socket: &Socket) -> Result<String> {
    socket.host_from()
}

pub fn get_port_from(socket: &Socket) -> Result<u16> {
    socket.port_from()
}

pub fn get_host_to(socket: &Socket) -> Result<String> {
    socket.host_to()
}

pub fn get_port_to(socket: &Socket) -> Result<u16> {
    socket.port_to()
}

pub fn get_listen_queue(socket: &Socket) -> Result<u32> {
    socket.listen_queue()
}

pub fn get_next_read_size(socket: &Socket) -> usize {
    socket.next_read_size()
}

/// Raw handle number, -1 once the socket has no handle
pub fn get_socket_handler(socket: &Socket) -> i64 {
    socket.socket_handler().map(|h| h as i64).unwrap_or(-1)
}
