//! Port allocation
//!
//! Obtains an unused local ephemeral port for an engine about to bind. Pure
//! query, no retry policy; retries, if any, belong to the caller.
//!
//! The allocator briefly binds a throwaway socket to port 0 and reports
//! what the OS assigned. Between releasing that socket and the engine
//! binding the port there is an inherent reuse window; the engine's own
//! bind error covers the rare loss of that race.

use std::net::{IpAddr, SocketAddr};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::common::{net, Result, SupervisorError};

/// Port allocator trait
///
/// A trait seam so lifecycle tests can inject allocation failures.
#[cfg_attr(test, mockall::automock)]
pub trait PortAllocator: Send + Sync + 'static {
    /// Obtain an unused local ephemeral port
    fn allocate(&self) -> Result<u16>;
}

/// OS-assigned ephemeral port allocator
#[derive(Debug, Clone)]
pub struct EphemeralPortAllocator {
    host: IpAddr,
}

impl EphemeralPortAllocator {
    /// Create an allocator for the given host
    pub fn new(host: IpAddr) -> Self {
        Self { host }
    }
}

impl PortAllocator for EphemeralPortAllocator {
    fn allocate(&self) -> Result<u16> {
        let domain = if self.host.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&SockAddr::from(SocketAddr::new(self.host, 0)))?;

        net::sock_port(&socket).map_err(|e| SupervisorError::BindFailure(e.to_string()))
    }
}
