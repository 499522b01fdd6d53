//! Network utility functions
//!
//! This module provides utility functions for network operations, including
//! the best-effort socket-to-port query backing the SOCKS proxy accessors.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use socket2::Socket;

use super::error::{Result, SupervisorError};

/// Parse a host address
///
/// # Arguments
///
/// * `host` - The host string to parse (IPv4 or IPv6 literal)
///
/// # Returns
///
/// The parsed `IpAddr`
pub fn parse_host(host: &str) -> Result<IpAddr> {
    IpAddr::from_str(host)
        .map_err(|e| SupervisorError::Config(format!("failed to parse host {}: {}", host, e)))
}

/// Query the local port of an open socket handle
///
/// The query is best-effort: the handle may have been closed concurrently by
/// shutdown logic, in which case this fails cleanly instead of faulting.
/// A socket that was never bound reports port 0 and is treated as invalid.
///
/// # Arguments
///
/// * `socket` - An open socket handle
///
/// # Returns
///
/// The port the OS has bound the socket to
pub fn sock_port(socket: &Socket) -> Result<u16> {
    let addr = socket
        .local_addr()
        .map_err(|e| SupervisorError::InvalidSocket(e.to_string()))?;

    let addr = addr
        .as_socket()
        .ok_or_else(|| SupervisorError::InvalidSocket("not an inet socket".to_string()))?;

    match addr.port() {
        0 => Err(SupervisorError::InvalidSocket("socket is not bound".to_string())),
        port => Ok(port),
    }
}

/// Query the full local address of an open socket handle
///
/// Same best-effort contract as [`sock_port`].
pub fn sock_addr(socket: &Socket) -> Result<SocketAddr> {
    let addr = socket
        .local_addr()
        .map_err(|e| SupervisorError::InvalidSocket(e.to_string()))?;

    let addr = addr
        .as_socket()
        .ok_or_else(|| SupervisorError::InvalidSocket("not an inet socket".to_string()))?;

    if addr.port() == 0 {
        return Err(SupervisorError::InvalidSocket("socket is not bound".to_string()));
    }
    Ok(addr)
}

/// Format a proxy endpoint as `host:port`
///
/// Uses the standard library's `SocketAddr` formatting, so IPv6 hosts come
/// out bracketed.
pub fn format_proxy_addr(addr: &SocketAddr) -> String {
    addr.to_string()
}
