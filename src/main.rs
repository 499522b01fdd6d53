//! Proxy Supervisor Command Line Tool
//!
//! This binary runs the supervisor standalone: it starts the managed
//! listeners with the stock reject handler and keeps them up until Ctrl+C.
//! Useful for poking at the lifecycle without a host application.

use clap::Parser;
use log::{info, warn};

use proxy_supervisor::common::init_logger;
use proxy_supervisor::config::{SupervisorConfig, DEFAULT_CONFIG_FILE};
use proxy_supervisor::{
    ProxyManager, ProxyStatus, RejectHandler, Result, SupervisorError, APP_NAME, VERSION,
};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Proxy Supervisor: lifecycle manager for locally-bound proxy listeners
#[derive(Parser, Debug)]
#[clap(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Load configuration from a file
    #[clap(long)]
    config_file: Option<PathBuf>,

    /// Log level
    #[clap(long, default_value = "info")]
    log_level: String,

    /// Start only the HTTP proxy
    #[clap(long)]
    http_only: bool,

    /// Start only the Shadowsocks tunnel
    #[clap(long)]
    shadowsocks_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger
    init_logger(&args.log_level);

    info!("Starting {} v{}", APP_NAME, VERSION);

    // Load configuration: defaults, optional file, environment overrides.
    // Without an explicit --config-file the default file is picked up only
    // if it exists.
    let config_file = args.config_file.clone().or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    });
    let config = SupervisorConfig::load(config_file.as_deref())?;
    info!("Listen host: {}", config.listen_host);

    let manager = ProxyManager::with_stock_engines(&config, Arc::new(RejectHandler));

    let start_http = !args.shadowsocks_only;
    let start_shadowsocks = !args.http_only;

    if start_http {
        match manager.start_http_proxy().await {
            Ok(port) => info!("HTTP proxy listening on {}:{}", config.listen_host, port),
            Err(e) => warn!("HTTP proxy failed to start: {}", e),
        }
    }

    if start_shadowsocks {
        match manager.start_shadowsocks().await {
            Ok(port) => info!(
                "Shadowsocks tunnel listening on {}:{}",
                config.listen_host, port
            ),
            Err(e) => warn!("Shadowsocks tunnel failed to start: {}", e),
        }
    }

    info!("Proxy supervisor ready, press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| SupervisorError::Other(format!("failed to listen for shutdown signal: {}", e)))?;

    info!("Shutting down");

    let mut http_status = manager.subscribe_http_proxy();
    let mut shadowsocks_status = manager.subscribe_shadowsocks_proxy();
    manager.stop_http_proxy();
    manager.stop_shadowsocks();

    // Wait for both kinds to settle; a kind that never started is already
    // stopped.
    let drained = async {
        loop {
            let http_stopped = http_status.borrow().status == ProxyStatus::Stopped;
            let shadowsocks_stopped =
                shadowsocks_status.borrow().status == ProxyStatus::Stopped;
            if http_stopped && shadowsocks_stopped {
                break;
            }
            tokio::select! {
                changed = http_status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = shadowsocks_status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    };
    if tokio::time::timeout(Duration::from_secs(10), drained).await.is_err() {
        warn!("Shutdown timeout reached before all proxies stopped");
    }

    info!("Shutdown complete");
    Ok(())
}
