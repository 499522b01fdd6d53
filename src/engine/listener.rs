//! Listener engine harness
//!
//! This module implements the accept loop shared by the concrete engines.
//! The loop owns a `JoinSet` of connection tasks and winds down when the
//! shutdown signal fires, draining in-flight connections with a bounded
//! grace period.
//!
//! Per-connection work goes through the [`ConnectionHandler`] seam; that is
//! where the host application plugs in the actual proxy protocol engine.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::select;
use tokio::sync::oneshot;
use tokio::task::JoinSet;

use crate::common::{Result, SupervisorError};
use super::{EngineHandle, EngineKind, ProxyEngine};

/// Grace period for in-flight connections during shutdown
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-connection entry point supplied by the host application
///
/// The supervisor never interprets traffic; whatever protocol work happens
/// on an accepted stream lives behind this trait.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Handle one accepted connection
    fn handle(&self, stream: TcpStream, peer: SocketAddr) -> BoxFuture<'static, Result<()>>;
}

/// Handler that logs and closes every connection
///
/// Useful for the demo binary and for tests, where only the lifecycle is
/// under scrutiny.
#[derive(Debug, Default)]
pub struct RejectHandler;

impl ConnectionHandler for RejectHandler {
    fn handle(&self, stream: TcpStream, peer: SocketAddr) -> BoxFuture<'static, Result<()>> {
        async move {
            debug!("Rejecting connection from {}", peer);
            drop(stream);
            Ok(())
        }
        .boxed()
    }
}

/// Accept-loop engine
///
/// Binds a TCP listener and feeds accepted connections to the handler until
/// the shutdown signal fires.
pub struct ListenerEngine {
    kind: EngineKind,
    host: IpAddr,
    handler: Arc<dyn ConnectionHandler>,
}

impl ListenerEngine {
    /// Create a new listener engine
    ///
    /// # Parameters
    ///
    /// * `kind` - Engine kind, used for logging and the handle
    /// * `host` - Host to bind listeners on
    /// * `handler` - Per-connection entry point
    pub fn new(kind: EngineKind, host: IpAddr, handler: Arc<dyn ConnectionHandler>) -> Self {
        Self {
            kind,
            host,
            handler,
        }
    }

    /// Serve until the shutdown signal fires, then drain
    async fn serve(
        kind: EngineKind,
        listener: TcpListener,
        handler: Arc<dyn ConnectionHandler>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        let mut tasks: JoinSet<Result<()>> = JoinSet::new();

        loop {
            select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            debug!("{} engine accepted connection from {}", kind, peer);
                            let handler = Arc::clone(&handler);
                            tasks.spawn(async move { handler.handle(stream, peer).await });
                        }
                        Err(e) => {
                            error!("{} engine accept error: {}", kind, e);
                        }
                    }
                }

                // Fires on explicit stop and when the handle is dropped
                _ = &mut shutdown_rx => {
                    info!("{} engine received shutdown signal", kind);
                    break;
                }

                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Ok(Err(e)) = result {
                        debug!("{} engine connection error: {}", kind, e);
                    }
                }
            }
        }

        // Listener is closed here; drain in-flight connections
        drop(listener);
        let drain = async {
            while let Some(result) = tasks.join_next().await {
                if let Ok(Err(e)) = result {
                    debug!("{} engine connection error during shutdown: {}", kind, e);
                }
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
            warn!(
                "{} engine shutdown timeout reached, {} connections still active",
                kind,
                tasks.len()
            );
            tasks.abort_all();
        }

        info!("{} engine shutdown complete", kind);
    }
}

impl ProxyEngine for ListenerEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn bind(&self, port: u16) -> BoxFuture<'static, Result<EngineHandle>> {
        let kind = self.kind;
        let addr = SocketAddr::new(self.host, port);
        let handler = Arc::clone(&self.handler);

        async move {
            let listener = TcpListener::bind(addr)
                .await
                .map_err(|e| SupervisorError::BindFailure(format!("{}: {}", addr, e)))?;

            let local_addr = listener
                .local_addr()
                .map_err(|e| SupervisorError::BindFailure(e.to_string()))?;

            let (shutdown_tx, shutdown_rx) = oneshot::channel();
            let serve_task = tokio::spawn(Self::serve(kind, listener, handler, shutdown_rx));

            info!("{} engine listening on {}", kind, local_addr);
            Ok(EngineHandle::new(kind, local_addr, shutdown_tx, serve_task))
        }
        .boxed()
    }
}
