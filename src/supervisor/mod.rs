//! Lifecycle supervision
//!
//! This module contains the lifecycle state machine, the port allocator,
//! the per-kind supervisor tasks, and the [`ProxyManager`] facade the host
//! application talks to.

mod actor;
mod manager;
pub mod port;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use manager::ProxyManager;
pub use port::{EphemeralPortAllocator, PortAllocator};
pub use state::{LifecycleSnapshot, ProxyStatus};
