//! Shared helpers for lifecycle unit tests

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{oneshot, watch};

use crate::common::{Result, SupervisorError};
use crate::engine::{EngineHandle, EngineKind, ProxyEngine};
use crate::supervisor::state::{LifecycleSnapshot, ProxyStatus};

/// Scriptable in-memory engine
///
/// Counts binds, tracks live instances, and can delay or fail a bind to
/// exercise the coalescing and cancellation paths.
pub(crate) struct FakeEngine {
    kind: EngineKind,
    bind_delay: Duration,
    fail_next: Arc<AtomicBool>,
    bind_count: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
}

impl FakeEngine {
    pub(crate) fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            bind_delay: Duration::ZERO,
            fail_next: Arc::new(AtomicBool::new(false)),
            bind_count: Arc::new(AtomicUsize::new(0)),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make every bind take this long before resolving
    pub(crate) fn with_bind_delay(mut self, delay: Duration) -> Self {
        self.bind_delay = delay;
        self
    }

    /// Fail the next bind attempt, then succeed
    pub(crate) fn fail_first_bind(self) -> Self {
        self.fail_next.store(true, Ordering::SeqCst);
        self
    }

    /// Number of successful binds so far
    pub(crate) fn bind_count(&self) -> usize {
        self.bind_count.load(Ordering::SeqCst)
    }

    /// Number of engine instances currently serving
    pub(crate) fn live_instances(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl ProxyEngine for FakeEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn bind(&self, port: u16) -> BoxFuture<'static, Result<EngineHandle>> {
        let kind = self.kind;
        let delay = self.bind_delay;
        let fail = self.fail_next.swap(false, Ordering::SeqCst);
        let bind_count = Arc::clone(&self.bind_count);
        let live = Arc::clone(&self.live);

        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if fail {
                return Err(SupervisorError::BindFailure(
                    "simulated bind failure".to_string(),
                ));
            }

            bind_count.fetch_add(1, Ordering::SeqCst);
            live.fetch_add(1, Ordering::SeqCst);

            let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
            let live_in_task = Arc::clone(&live);
            let serve_task = tokio::spawn(async move {
                let _ = shutdown_rx.await;
                live_in_task.fetch_sub(1, Ordering::SeqCst);
            });

            let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
            Ok(EngineHandle::new(kind, addr, shutdown_tx, serve_task))
        }
        .boxed()
    }
}

/// Await a specific status on a subscription, with a test timeout
pub(crate) async fn wait_for_status(
    mut rx: watch::Receiver<LifecycleSnapshot>,
    status: ProxyStatus,
) -> LifecycleSnapshot {
    tokio::time::timeout(Duration::from_secs(2), async move {
        loop {
            let snapshot = rx.borrow().clone();
            if snapshot.status == status {
                return snapshot;
            }
            rx.changed().await.expect("status channel open");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("status {} not reached in time", status))
}
