//! Shadowsocks client tunnel engine
//!
//! Thin wrapper around the listener harness carrying the upstream tunnel
//! configuration. The cipher and transport work is host-provided through
//! the [`ConnectionHandler`] seam; this engine only checks that the
//! upstream section is complete before it lets the tunnel come up.

use std::net::IpAddr;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use log::debug;

use crate::common::Result;
use crate::config::ShadowsocksConfig;
use super::listener::{ConnectionHandler, ListenerEngine};
use super::{EngineHandle, EngineKind, ProxyEngine};

/// Local Shadowsocks client tunnel engine
pub struct ShadowsocksEngine {
    inner: ListenerEngine,
    config: ShadowsocksConfig,
}

impl ShadowsocksEngine {
    /// Create a new Shadowsocks engine
    ///
    /// # Parameters
    ///
    /// * `host` - Host to bind the local tunnel endpoint on
    /// * `config` - Shadowsocks section of the supervisor configuration
    /// * `handler` - Per-connection transport entry point
    pub fn new(
        host: IpAddr,
        config: ShadowsocksConfig,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Self {
        Self {
            inner: ListenerEngine::new(EngineKind::Shadowsocks, host, handler),
            config,
        }
    }
}

impl ProxyEngine for ShadowsocksEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Shadowsocks
    }

    fn bind(&self, port: u16) -> BoxFuture<'static, Result<EngineHandle>> {
        // An incomplete upstream section is a launch failure, reported
        // through the same path as a bind error.
        if let Err(e) = self.config.validate() {
            return async move { Err(e) }.boxed();
        }

        debug!("Launching shadowsocks engine, upstream {}", self.config);
        self.inner.bind(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SupervisorError;
    use crate::engine::RejectHandler;

    #[tokio::test]
    async fn test_incomplete_config_fails_launch() {
        let engine = ShadowsocksEngine::new(
            "127.0.0.1".parse().unwrap(),
            ShadowsocksConfig::default(),
            Arc::new(RejectHandler),
        );

        let err = engine.bind(0).await.unwrap_err();
        assert!(matches!(err, SupervisorError::Config(_)));
    }

    #[tokio::test]
    async fn test_complete_config_binds() {
        let config = ShadowsocksConfig {
            server: Some("ss.example.com".to_string()),
            server_port: Some(8388),
            password: Some("secret".to_string()),
            method: "aes-256-gcm".to_string(),
        };
        let engine = ShadowsocksEngine::new(
            "127.0.0.1".parse().unwrap(),
            config,
            Arc::new(RejectHandler),
        );

        let handle = engine.bind(0).await.expect("bind");
        assert_eq!(handle.kind(), EngineKind::Shadowsocks);
        handle.stop().await.expect("stop resolves");
    }
}
