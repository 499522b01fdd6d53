//! Proxy manager
//!
//! Single point of truth for engine lifecycle. One explicitly constructed
//! instance is owned by the host application's composition root and passed
//! by reference to call sites; single-instance-per-process semantics come
//! from the owner's lifetime, not from a global accessor.

use std::sync::{Arc, RwLock};

use log::{debug, warn};
use socket2::Socket;
use tokio::sync::{mpsc, oneshot, watch};

use crate::common::{format_proxy_addr, net, Result, SupervisorError};
use crate::config::SupervisorConfig;
use crate::engine::{
    ConnectionHandler, EngineKind, HttpProxyEngine, ProxyEngine, ShadowsocksEngine,
};
use super::actor::{Command, EngineSupervisor};
use super::port::{EphemeralPortAllocator, PortAllocator};
use super::state::LifecycleSnapshot;

/// Command sender and status subscription for one engine kind
struct EngineController {
    kind: EngineKind,
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<LifecycleSnapshot>,
}

impl EngineController {
    fn new(
        kind: EngineKind,
        engine: Arc<dyn ProxyEngine>,
        allocator: Arc<dyn PortAllocator>,
    ) -> Self {
        debug_assert_eq!(engine.kind(), kind);
        let (commands, status) = EngineSupervisor::spawn(kind, engine, allocator);
        Self {
            kind,
            commands,
            status,
        }
    }

    async fn start(&self) -> Result<u16> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Start { reply })
            .await
            .map_err(|_| SupervisorError::ChannelClosed)?;
        rx.await.map_err(|_| SupervisorError::ChannelClosed)?
    }

    fn stop(&self) {
        // Fire-and-forget; a full mailbox only happens when lifecycle
        // commands are issued faster than engines can bind.
        if self.commands.try_send(Command::Stop).is_err() {
            warn!("{} stop request dropped, supervisor busy or gone", self.kind);
        }
    }

    fn snapshot(&self) -> LifecycleSnapshot {
        self.status.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<LifecycleSnapshot> {
        self.status.clone()
    }
}

/// Lifecycle manager for the locally-bound proxy listeners
///
/// Coordinates the HTTP proxy and the Shadowsocks tunnel engines, and
/// answers best-effort SOCKS port queries against a host-attached socket
/// handle. Operations on one engine kind are serialized; the two kinds
/// progress independently. Status accessors never block on in-flight work.
///
/// Must be created inside a tokio runtime: construction spawns the
/// per-kind supervisor tasks.
pub struct ProxyManager {
    http: EngineController,
    shadowsocks: EngineController,
    socks_socket: RwLock<Option<Socket>>,
}

impl ProxyManager {
    /// Create a manager from injected collaborators
    ///
    /// # Parameters
    ///
    /// * `allocator` - Port allocator shared by both engine kinds
    /// * `http_engine` - HTTP proxy engine
    /// * `shadowsocks_engine` - Shadowsocks tunnel engine
    pub fn new(
        allocator: Arc<dyn PortAllocator>,
        http_engine: Arc<dyn ProxyEngine>,
        shadowsocks_engine: Arc<dyn ProxyEngine>,
    ) -> Self {
        Self {
            http: EngineController::new(EngineKind::Http, http_engine, Arc::clone(&allocator)),
            shadowsocks: EngineController::new(
                EngineKind::Shadowsocks,
                shadowsocks_engine,
                allocator,
            ),
            socks_socket: RwLock::new(None),
        }
    }

    /// Create a manager with the stock engines and allocator
    ///
    /// # Parameters
    ///
    /// * `config` - Supervisor configuration
    /// * `handler` - Per-connection entry point shared by both engines
    pub fn with_stock_engines(
        config: &SupervisorConfig,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Self {
        let host = config.listen_host;
        let allocator = Arc::new(EphemeralPortAllocator::new(host));
        let http = Arc::new(HttpProxyEngine::new(
            host,
            config.http.clone(),
            Arc::clone(&handler),
        ));
        let shadowsocks = Arc::new(ShadowsocksEngine::new(
            host,
            config.shadowsocks.clone(),
            handler,
        ));
        Self::new(allocator, http, shadowsocks)
    }

    /// Start the HTTP proxy
    ///
    /// Resolves with the bound port. Idempotent: if the proxy is already
    /// running the existing port comes back with no second bind; if a start
    /// is already in flight this call coalesces onto it.
    pub async fn start_http_proxy(&self) -> Result<u16> {
        self.http.start().await
    }

    /// Stop the HTTP proxy, fire-and-forget
    ///
    /// A stop issued while a start is in flight is honored once the start
    /// resolves and overrides the resulting running state immediately.
    pub fn stop_http_proxy(&self) {
        self.http.stop();
    }

    /// Start the Shadowsocks tunnel
    ///
    /// Same contract as [`start_http_proxy`](Self::start_http_proxy),
    /// independent state.
    pub async fn start_shadowsocks(&self) -> Result<u16> {
        self.shadowsocks.start().await
    }

    /// Stop the Shadowsocks tunnel, fire-and-forget
    pub fn stop_shadowsocks(&self) {
        self.shadowsocks.stop();
    }

    /// Whether the HTTP proxy is running
    pub fn http_proxy_running(&self) -> bool {
        self.http.snapshot().is_running()
    }

    /// Bound HTTP proxy port, `None` unless running
    pub fn http_proxy_port(&self) -> Option<u16> {
        self.http.snapshot().bound_port
    }

    /// Current HTTP proxy lifecycle snapshot
    pub fn http_proxy_state(&self) -> LifecycleSnapshot {
        self.http.snapshot()
    }

    /// Subscribe to HTTP proxy lifecycle transitions
    pub fn subscribe_http_proxy(&self) -> watch::Receiver<LifecycleSnapshot> {
        self.http.subscribe()
    }

    /// Whether the Shadowsocks tunnel is running
    pub fn shadowsocks_proxy_running(&self) -> bool {
        self.shadowsocks.snapshot().is_running()
    }

    /// Bound Shadowsocks port, `None` unless running
    pub fn shadowsocks_proxy_port(&self) -> Option<u16> {
        self.shadowsocks.snapshot().bound_port
    }

    /// Current Shadowsocks lifecycle snapshot
    pub fn shadowsocks_proxy_state(&self) -> LifecycleSnapshot {
        self.shadowsocks.snapshot()
    }

    /// Subscribe to Shadowsocks lifecycle transitions
    pub fn subscribe_shadowsocks_proxy(&self) -> watch::Receiver<LifecycleSnapshot> {
        self.shadowsocks.subscribe()
    }

    /// Attach the socket handle backing the SOCKS port queries
    ///
    /// The SOCKS endpoint is not lifecycle-managed here: its socket is
    /// created and owned by the host networking layer, which hands the
    /// handle over for querying. Replaces any previously attached handle.
    pub fn attach_socks_socket(&self, socket: Socket) {
        debug!("Attaching SOCKS socket handle");
        *self.socks_socket.write().expect("socks socket lock poisoned") = Some(socket);
    }

    /// Detach the SOCKS socket handle
    ///
    /// Subsequent queries fail with an invalid-socket error.
    pub fn detach_socks_socket(&self) {
        debug!("Detaching SOCKS socket handle");
        *self.socks_socket.write().expect("socks socket lock poisoned") = None;
    }

    /// Bound SOCKS port, `None` if the handle is missing or unbound
    ///
    /// Best-effort: the handle may be closed concurrently by shutdown
    /// logic, in which case the query fails cleanly.
    pub fn socks_proxy_port(&self) -> Option<u16> {
        let guard = self.socks_socket.read().expect("socks socket lock poisoned");
        guard.as_ref().and_then(|socket| net::sock_port(socket).ok())
    }

    /// SOCKS endpoint as a `host:port` string
    ///
    /// Derived from the live socket handle's bound address; fails with
    /// `InvalidSocket` if the handle is missing or unbound.
    pub fn socks_proxy(&self) -> Result<String> {
        let guard = self.socks_socket.read().expect("socks socket lock poisoned");
        let socket = guard
            .as_ref()
            .ok_or_else(|| SupervisorError::InvalidSocket("no socket attached".to_string()))?;
        let addr = net::sock_addr(socket)?;
        Ok(format_proxy_addr(&addr))
    }
}
