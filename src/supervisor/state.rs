//! Engine lifecycle state
//!
//! One lifecycle record per engine kind. Snapshots are published as whole
//! values, so a reader can never observe a status/port pair that was only
//! partially updated.
//!
//! The state machine per kind:
//!
//! ```text
//! Stopped -> Starting -> Running -> Stopping -> Stopped
//!            Starting -> Failed    (bind or launch error)
//!            Failed   -> Starting  (retry via a new start call)
//!            any      -> Stopping  (explicit stop)
//! ```

use std::fmt;

use crate::common::SupervisorError;

/// Lifecycle status of one engine kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyStatus {
    /// Not running, no port held
    Stopped,
    /// A start is in flight; the port is not published yet
    Starting,
    /// Bound and serving
    Running,
    /// Teardown in flight
    Stopping,
    /// The last start attempt failed; a new start may retry
    Failed,
}

impl fmt::Display for ProxyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Whether a status transition is part of the lifecycle contract
pub fn transition_allowed(from: ProxyStatus, to: ProxyStatus) -> bool {
    use ProxyStatus::*;
    match (from, to) {
        // Explicit stop is honored from any state
        (_, Stopping) => true,
        (Stopped, Starting) => true,
        (Failed, Starting) => true,
        (Starting, Running) => true,
        (Starting, Failed) => true,
        // A start that gets latched down by a racing stop, and teardown
        // resolving, both settle at Stopped
        (Starting, Stopped) => true,
        (Stopping, Stopped) => true,
        (Failed, Stopped) => true,
        _ => false,
    }
}

/// Published lifecycle snapshot for one engine kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleSnapshot {
    /// Current status
    pub status: ProxyStatus,
    /// Bound port; `Some` only while running
    pub bound_port: Option<u16>,
    /// Last error; set on failure, retained through a best-effort teardown
    pub last_error: Option<SupervisorError>,
}

impl LifecycleSnapshot {
    /// Initial state
    pub fn stopped() -> Self {
        Self {
            status: ProxyStatus::Stopped,
            bound_port: None,
            last_error: None,
        }
    }

    /// A start is in flight
    pub fn starting() -> Self {
        Self {
            status: ProxyStatus::Starting,
            bound_port: None,
            last_error: None,
        }
    }

    /// Bound and serving on `port`
    pub fn running(port: u16) -> Self {
        Self {
            status: ProxyStatus::Running,
            bound_port: Some(port),
            last_error: None,
        }
    }

    /// Teardown in flight
    pub fn stopping() -> Self {
        Self {
            status: ProxyStatus::Stopping,
            bound_port: None,
            last_error: None,
        }
    }

    /// Terminal stop, optionally retaining a teardown diagnostic
    pub fn stopped_with(last_error: Option<SupervisorError>) -> Self {
        Self {
            status: ProxyStatus::Stopped,
            bound_port: None,
            last_error,
        }
    }

    /// The last start attempt failed
    pub fn failed(error: SupervisorError) -> Self {
        Self {
            status: ProxyStatus::Failed,
            bound_port: None,
            last_error: Some(error),
        }
    }

    /// Whether the engine is running
    pub fn is_running(&self) -> bool {
        self.status == ProxyStatus::Running
    }
}
