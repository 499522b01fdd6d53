//! Per-kind supervisor task
//!
//! Every engine kind gets one supervisor task owning its lifecycle record
//! and its engine handle. All mutations go through the task's command
//! mailbox, which serializes start/stop for one kind while the two kinds
//! progress independently. Status is published as whole snapshots through a
//! watch channel, so readers never block on in-flight work and never see a
//! torn status/port pair.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot, watch};

use crate::common::{Result, SupervisorError};
use crate::engine::{EngineHandle, EngineKind, ProxyEngine};
use super::port::PortAllocator;
use super::state::{transition_allowed, LifecycleSnapshot};

/// Command mailbox capacity
///
/// Lifecycle commands are rare; a full mailbox means the caller is issuing
/// starts and stops faster than engines can bind.
pub(crate) const MAILBOX_CAPACITY: usize = 32;

/// Commands accepted by an engine supervisor
pub(crate) enum Command {
    /// Start the engine; the reply fires exactly once with the outcome
    Start {
        reply: oneshot::Sender<Result<u16>>,
    },
    /// Stop the engine, best-effort
    Stop,
}

/// Supervisor task state for one engine kind
pub(crate) struct EngineSupervisor {
    kind: EngineKind,
    engine: Arc<dyn ProxyEngine>,
    allocator: Arc<dyn PortAllocator>,
    status_tx: watch::Sender<LifecycleSnapshot>,
    rx: mpsc::Receiver<Command>,
    handle: Option<EngineHandle>,
}

impl EngineSupervisor {
    /// Spawn the supervisor task for one engine kind
    ///
    /// Returns the command sender and the status subscription backing the
    /// manager's accessors.
    pub(crate) fn spawn(
        kind: EngineKind,
        engine: Arc<dyn ProxyEngine>,
        allocator: Arc<dyn PortAllocator>,
    ) -> (mpsc::Sender<Command>, watch::Receiver<LifecycleSnapshot>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(MAILBOX_CAPACITY);
        let (status_tx, status_rx) = watch::channel(LifecycleSnapshot::stopped());

        let supervisor = Self {
            kind,
            engine,
            allocator,
            status_tx,
            rx: cmd_rx,
            handle: None,
        };
        tokio::spawn(supervisor.run());

        (cmd_tx, status_rx)
    }

    async fn run(mut self) {
        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                Command::Start { reply } => self.handle_start(reply).await,
                Command::Stop => self.handle_stop().await,
            }
        }

        // Mailbox closed: the owner dropped the manager. Tear down anything
        // still serving so the port is released.
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.stop().await {
                warn!("{} teardown error on shutdown: {}", self.kind, e);
            }
        }
        debug!("{} supervisor exited", self.kind);
    }

    /// Publish a new snapshot
    ///
    /// The port in a `Running` snapshot is bound strictly before the send,
    /// which is what gives readers the happens-before edge.
    fn publish(&self, next: LifecycleSnapshot) {
        let prev = self.status_tx.borrow().status;
        debug_assert!(
            prev == next.status || transition_allowed(prev, next.status),
            "lifecycle transition {} -> {} is not part of the contract",
            prev,
            next.status
        );
        self.status_tx.send_replace(next);
    }

    async fn handle_start(&mut self, reply: oneshot::Sender<Result<u16>>) {
        if let Some(handle) = &self.handle {
            // Idempotent success: already running, same port, no second bind
            let port = handle.local_addr().port();
            debug!("{} already running on port {}", self.kind, port);
            let _ = reply.send(Ok(port));
            return;
        }

        self.publish(LifecycleSnapshot::starting());

        let mut waiters = vec![reply];

        let port = match self.allocator.allocate() {
            Ok(port) => port,
            Err(e) => {
                error!("{} port allocation failed: {}", self.kind, e);
                self.publish(LifecycleSnapshot::failed(e.clone()));
                Self::notify(waiters, Err(e));
                return;
            }
        };
        debug!("{} allocated port {}", self.kind, port);

        let mut bind = self.engine.bind(port);
        let mut stop_requested = false;

        // Keep draining the mailbox while the bind is in flight: later
        // starts coalesce onto this attempt, a stop is latched and applied
        // once the bind resolves. The bind future is never dropped
        // mid-flight, so a half-bound listener cannot leak.
        let outcome = loop {
            tokio::select! {
                outcome = &mut bind => break outcome,
                cmd = self.rx.recv() => match cmd {
                    Some(Command::Start { reply }) => waiters.push(reply),
                    Some(Command::Stop) => stop_requested = true,
                    None => stop_requested = true,
                },
            }
        };

        match outcome {
            Ok(handle) if stop_requested => {
                info!("{} stop requested during start, tearing down", self.kind);
                self.publish(LifecycleSnapshot::stopping());
                let teardown_error = handle.stop().await.err();
                if let Some(e) = &teardown_error {
                    warn!("{} teardown error: {}", self.kind, e);
                }
                self.publish(LifecycleSnapshot::stopped_with(teardown_error));
                Self::notify(waiters, Err(SupervisorError::StoppedBeforeReady));
            }
            Ok(handle) => {
                let bound = handle.local_addr().port();
                self.handle = Some(handle);
                self.publish(LifecycleSnapshot::running(bound));
                info!("{} proxy running on port {}", self.kind, bound);
                Self::notify(waiters, Ok(bound));
            }
            Err(e) => {
                error!("{} engine launch failed: {}", self.kind, e);
                self.publish(LifecycleSnapshot::failed(e.clone()));
                if stop_requested {
                    self.publish(LifecycleSnapshot::stopped_with(Some(e.clone())));
                }
                Self::notify(waiters, Err(e));
            }
        }
    }

    async fn handle_stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            debug!("{} stop with nothing running, no-op", self.kind);
            return;
        };

        self.publish(LifecycleSnapshot::stopping());
        let teardown_error = handle.stop().await.err();
        if let Some(e) = &teardown_error {
            warn!("{} teardown error: {}", self.kind, e);
        }
        // Best-effort: a teardown failure stays in the snapshot as a
        // diagnostic, but the state still reaches stopped with the port
        // cleared.
        self.publish(LifecycleSnapshot::stopped_with(teardown_error));
    }

    /// Deliver one outcome to every coalesced waiter, in call order
    fn notify(waiters: Vec<oneshot::Sender<Result<u16>>>, outcome: Result<u16>) {
        for waiter in waiters {
            // A waiter may have gone away; nothing to do then
            let _ = waiter.send(outcome.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::port::MockPortAllocator;
    use crate::supervisor::state::ProxyStatus;
    use crate::supervisor::test_support::{wait_for_status, FakeEngine};
    use std::time::Duration;

    async fn start(tx: &mpsc::Sender<Command>) -> oneshot::Receiver<Result<u16>> {
        let (reply, rx) = oneshot::channel();
        tx.send(Command::Start { reply }).await.expect("mailbox open");
        rx
    }

    fn fixed_allocator(port: u16) -> Arc<MockPortAllocator> {
        let mut allocator = MockPortAllocator::new();
        allocator.expect_allocate().returning(move || Ok(port));
        Arc::new(allocator)
    }

    #[tokio::test]
    async fn test_concurrent_starts_coalesce_into_one_bind() {
        let engine = Arc::new(FakeEngine::new(EngineKind::Http).with_bind_delay(Duration::from_millis(50)));
        let (tx, _status) = EngineSupervisor::spawn(
            EngineKind::Http,
            Arc::clone(&engine) as Arc<dyn ProxyEngine>,
            fixed_allocator(4000),
        );

        let first = start(&tx).await;
        let second = start(&tx).await;
        let third = start(&tx).await;

        let p1 = first.await.unwrap().expect("first start succeeds");
        let p2 = second.await.unwrap().expect("second start succeeds");
        let p3 = third.await.unwrap().expect("third start succeeds");

        assert_eq!(p1, 4000);
        assert_eq!(p1, p2);
        assert_eq!(p2, p3);
        assert_eq!(engine.bind_count(), 1, "Exactly one underlying bind");
    }

    #[tokio::test]
    async fn test_stop_during_starting_settles_at_stopped() {
        let engine = Arc::new(FakeEngine::new(EngineKind::Http).with_bind_delay(Duration::from_millis(50)));
        let (tx, status) = EngineSupervisor::spawn(
            EngineKind::Http,
            Arc::clone(&engine) as Arc<dyn ProxyEngine>,
            fixed_allocator(4001),
        );

        let pending = start(&tx).await;
        // Let the bind get in flight, then stop
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(Command::Stop).await.expect("mailbox open");

        let outcome = pending.await.expect("reply delivered exactly once");
        assert_eq!(outcome, Err(SupervisorError::StoppedBeforeReady));

        let snapshot = wait_for_status(status, ProxyStatus::Stopped).await;
        assert_eq!(snapshot.bound_port, None);
        assert_eq!(engine.live_instances(), 0, "The raced listener was torn down");
    }

    #[tokio::test]
    async fn test_allocation_failure_reports_bind_failure() {
        let mut allocator = MockPortAllocator::new();
        allocator
            .expect_allocate()
            .returning(|| Err(SupervisorError::BindFailure("out of ports".to_string())));

        let engine = Arc::new(FakeEngine::new(EngineKind::Shadowsocks));
        let (tx, status) = EngineSupervisor::spawn(
            EngineKind::Shadowsocks,
            Arc::clone(&engine) as Arc<dyn ProxyEngine>,
            Arc::new(allocator),
        );

        let outcome = start(&tx).await.await.expect("reply delivered");
        assert!(matches!(outcome, Err(SupervisorError::BindFailure(_))));
        assert_eq!(engine.bind_count(), 0, "No engine launch after allocation failure");

        let snapshot = wait_for_status(status, ProxyStatus::Failed).await;
        assert!(matches!(
            snapshot.last_error,
            Some(SupervisorError::BindFailure(_))
        ));
        assert_eq!(snapshot.bound_port, None);
    }

    #[tokio::test]
    async fn test_failed_state_allows_retry() {
        let engine = Arc::new(FakeEngine::new(EngineKind::Http).fail_first_bind());
        let (tx, status) = EngineSupervisor::spawn(
            EngineKind::Http,
            Arc::clone(&engine) as Arc<dyn ProxyEngine>,
            fixed_allocator(4002),
        );

        let outcome = start(&tx).await.await.expect("reply delivered");
        assert!(matches!(outcome, Err(SupervisorError::BindFailure(_))));
        wait_for_status(status.clone(), ProxyStatus::Failed).await;

        // A new start call retries from failed
        let port = start(&tx).await.await.expect("reply delivered").expect("retry succeeds");
        assert_eq!(port, 4002);
        let snapshot = wait_for_status(status, ProxyStatus::Running).await;
        assert_eq!(snapshot.bound_port, Some(4002));
    }

    #[tokio::test]
    async fn test_mailbox_close_tears_down_running_engine() {
        let engine = Arc::new(FakeEngine::new(EngineKind::Http));
        let (tx, status) = EngineSupervisor::spawn(
            EngineKind::Http,
            Arc::clone(&engine) as Arc<dyn ProxyEngine>,
            fixed_allocator(4003),
        );

        start(&tx).await.await.expect("reply").expect("start succeeds");
        assert_eq!(engine.live_instances(), 1);

        drop(tx);
        // The supervisor tears the engine down on mailbox close
        tokio::time::timeout(Duration::from_secs(1), async {
            while engine.live_instances() != 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("engine should be torn down after the mailbox closes");
        drop(status);
    }
}
