//! Default configuration values
//!
//! This module provides default values for configuration options.
//! It is designed to be a single source of truth for defaults,
//! making it easier to maintain consistent defaults across the application.

use std::net::IpAddr;
use std::str::FromStr;

/// Environment variable prefix for all configuration options
pub const ENV_PREFIX: &str = "PROXY_SUPERVISOR_";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Default listen host as string
///
/// Listeners are loopback-only; the supervisor manages local proxies for a
/// host application, not publicly reachable services.
pub const LISTEN_HOST_STR: &str = "127.0.0.1";

/// Default log level as string
pub const LOG_LEVEL_STR: &str = "info";

/// Default Shadowsocks cipher method
pub const SHADOWSOCKS_METHOD_STR: &str = "aes-256-gcm";

/// Default listen host
pub fn listen_host() -> IpAddr {
    IpAddr::from_str(LISTEN_HOST_STR)
        .expect("Default listen host should be valid")
}

/// Default log level
pub fn log_level() -> String {
    LOG_LEVEL_STR.to_string()
}

/// Default Shadowsocks cipher method
pub fn shadowsocks_method() -> String {
    SHADOWSOCKS_METHOD_STR.to_string()
}
