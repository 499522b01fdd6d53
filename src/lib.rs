//! Proxy Supervisor: lifecycle management for locally-bound proxy listeners
//!
//! This library supervises the proxy engines a host application routes its
//! outbound traffic through: a local HTTP proxy, a Shadowsocks client
//! tunnel, and a SOCKS5 endpoint whose port is derived from a host-owned
//! socket handle. It owns the start/stop state machine, serializes
//! concurrent lifecycle calls per engine kind, and reports dynamically
//! assigned ports without ever exposing a half-updated state.
//!
//! The proxy protocols themselves are not implemented here; engines are
//! opaque collaborators behind the [`ProxyEngine`] trait, and per-connection
//! work is plugged in through [`ConnectionHandler`].
//!
//! # Main Features
//!
//! - Idempotent, coalescing starts: concurrent start calls for one kind
//!   resolve with the same port from a single underlying bind
//! - Safe cancellation: a stop racing an in-flight start settles at a clean
//!   stopped state and every pending caller hears about it exactly once
//! - Non-blocking status reads and watchable lifecycle transitions
//! - Best-effort SOCKS port queries against a host-attached socket handle
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use proxy_supervisor::{ProxyManager, RejectHandler, Result};
//! use proxy_supervisor::config::SupervisorConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = SupervisorConfig::default();
//!     let manager = ProxyManager::with_stock_engines(&config, Arc::new(RejectHandler));
//!
//!     let port = manager.start_http_proxy().await?;
//!     println!("http proxy listening on {}:{}", config.listen_host, port);
//!
//!     manager.stop_http_proxy();
//!     Ok(())
//! }
//! ```

// Public modules
pub mod common;
pub mod config;
pub mod engine;
pub mod supervisor;

// Re-export commonly used structures and functions for convenience
pub use common::{Result, SupervisorError};
pub use engine::{
    ConnectionHandler, EngineHandle, EngineKind, HttpProxyEngine, ProxyEngine, RejectHandler,
    ShadowsocksEngine,
};
pub use supervisor::{
    EphemeralPortAllocator, LifecycleSnapshot, PortAllocator, ProxyManager, ProxyStatus,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
