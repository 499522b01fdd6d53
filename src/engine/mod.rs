//! Proxy engine abstraction
//!
//! The supervisor treats the actual proxy implementations (HTTP CONNECT
//! handling, SOCKS5 handshakes, Shadowsocks transport) as opaque engines: a
//! thing that binds a port, serves until told otherwise, and stops. This
//! module defines that boundary.
//!
//! The capability set is deliberately small — `bind(port)` and the returned
//! handle's `stop()` — so the lifecycle state machine can be parameterized
//! over the engine variant instead of duplicated per kind.

mod http;
mod listener;
mod shadowsocks;

pub use http::HttpProxyEngine;
pub use listener::{ConnectionHandler, ListenerEngine, RejectHandler};
pub use shadowsocks::ShadowsocksEngine;

use std::fmt;
use std::net::SocketAddr;

use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::common::{Result, SupervisorError};

/// Engine kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// Local HTTP proxy
    Http,
    /// Local Shadowsocks client tunnel
    Shadowsocks,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Shadowsocks => write!(f, "shadowsocks"),
        }
    }
}

/// Proxy engine trait
///
/// This trait is the collaborator boundary consumed by the supervisor. It
/// allows different engine implementations (including test fakes) while the
/// lifecycle contract stays in one place.
pub trait ProxyEngine: Send + Sync + 'static {
    /// The kind of proxy this engine serves
    fn kind(&self) -> EngineKind;

    /// Bind the given port and start serving
    ///
    /// Resolves once the listener is bound. The returned handle owns the
    /// serving task; dropping it stops the engine, [`EngineHandle::stop`]
    /// stops it and waits for teardown.
    fn bind(&self, port: u16) -> BoxFuture<'static, Result<EngineHandle>>;
}

/// Handle to a running engine
///
/// Wraps the shutdown signal and the serving task, in the same way a
/// control handle wraps a message channel: the owner never touches the
/// engine's internals directly.
#[derive(Debug)]
pub struct EngineHandle {
    kind: EngineKind,
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    serve_task: JoinHandle<()>,
}

impl EngineHandle {
    /// Create a new engine handle
    ///
    /// # Parameters
    ///
    /// * `kind` - Engine kind
    /// * `local_addr` - Address the engine is actually bound to
    /// * `shutdown_tx` - Signal that makes the serving task wind down
    /// * `serve_task` - The serving task itself
    pub fn new(
        kind: EngineKind,
        local_addr: SocketAddr,
        shutdown_tx: oneshot::Sender<()>,
        serve_task: JoinHandle<()>,
    ) -> Self {
        Self {
            kind,
            local_addr,
            shutdown_tx,
            serve_task,
        }
    }

    /// Engine kind
    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// The address the engine is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop the engine and wait for teardown to resolve
    ///
    /// The signal send may fail if the serving task already exited; that is
    /// fine, joining the task is what matters.
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        self.serve_task
            .await
            .map_err(|e| SupervisorError::Other(format!("engine task join error: {}", e)))
    }
}
