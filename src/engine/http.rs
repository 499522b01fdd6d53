//! HTTP proxy engine
//!
//! Thin wrapper around the listener harness carrying the HTTP engine
//! configuration. The CONNECT/forwarding logic itself is host-provided
//! through the [`ConnectionHandler`] seam.

use std::net::IpAddr;
use std::sync::Arc;

use futures::future::BoxFuture;
use log::debug;

use crate::common::Result;
use crate::config::HttpProxyConfig;
use super::listener::{ConnectionHandler, ListenerEngine};
use super::{EngineHandle, EngineKind, ProxyEngine};

/// Local HTTP proxy engine
pub struct HttpProxyEngine {
    inner: ListenerEngine,
    config: HttpProxyConfig,
}

impl HttpProxyEngine {
    /// Create a new HTTP proxy engine
    ///
    /// # Parameters
    ///
    /// * `host` - Host to bind the listener on
    /// * `config` - HTTP engine section of the supervisor configuration
    /// * `handler` - Per-connection protocol entry point
    pub fn new(host: IpAddr, config: HttpProxyConfig, handler: Arc<dyn ConnectionHandler>) -> Self {
        Self {
            inner: ListenerEngine::new(EngineKind::Http, host, handler),
            config,
        }
    }
}

impl ProxyEngine for HttpProxyEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Http
    }

    fn bind(&self, port: u16) -> BoxFuture<'static, Result<EngineHandle>> {
        debug!(
            "Launching http proxy engine (global_mode: {})",
            self.config.global_mode
        );
        self.inner.bind(port)
    }
}
