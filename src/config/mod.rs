//! Configuration module
//!
//! This module handles application configuration, including loading from
//! different sources (files, environment variables) and validating the
//! configuration.
//!
//! The per-engine sections carry the settings the opaque proxy engines are
//! bootstrapped with; the supervisor itself only needs the listen host and
//! the log level.

mod defaults;

pub use defaults::{DEFAULT_CONFIG_FILE, ENV_PREFIX};

use std::env;
use std::fmt;
use std::fs;
use std::net::IpAddr;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Deserializer, Serialize};

use crate::common::{parse_host, Result, SupervisorError};

/// Custom deserializer for host addresses
fn deserialize_host<'de, D>(deserializer: D) -> std::result::Result<IpAddr, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_host(&s).map_err(serde::de::Error::custom)
}

/// HTTP proxy engine settings
///
/// These mirror the knobs the embedded HTTP proxy engine is configured with;
/// the supervisor passes them through opaquely.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpProxyConfig {
    /// Route all traffic through the upstream proxy instead of per-rule
    pub global_mode: bool,
}

/// Shadowsocks client tunnel settings
///
/// The upstream server the local tunnel forwards to. All of `server`,
/// `server_port` and `password` must be present before the engine may start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShadowsocksConfig {
    /// Upstream server host
    pub server: Option<String>,
    /// Upstream server port
    pub server_port: Option<u16>,
    /// Shared password
    pub password: Option<String>,
    /// Cipher method
    pub method: String,
}

impl Default for ShadowsocksConfig {
    fn default() -> Self {
        Self {
            server: None,
            server_port: None,
            password: None,
            method: defaults::shadowsocks_method(),
        }
    }
}

impl ShadowsocksConfig {
    /// Validate that the section is complete enough to launch the tunnel
    pub fn validate(&self) -> Result<()> {
        if self.server.as_deref().unwrap_or("").is_empty() {
            return Err(SupervisorError::Config(
                "missing shadowsocks server".to_string(),
            ));
        }
        if self.server_port.unwrap_or(0) == 0 {
            return Err(SupervisorError::Config(
                "missing shadowsocks server port".to_string(),
            ));
        }
        if self.password.as_deref().unwrap_or("").is_empty() {
            return Err(SupervisorError::Config(
                "missing shadowsocks password".to_string(),
            ));
        }
        if self.method.is_empty() {
            return Err(SupervisorError::Config(
                "missing shadowsocks cipher method".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for ShadowsocksConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the password
        write!(
            f,
            "{}:{} ({})",
            self.server.as_deref().unwrap_or("-"),
            self.server_port.unwrap_or(0),
            self.method
        )
    }
}

/// Supervisor configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Host the managed listeners bind on
    #[serde(deserialize_with = "deserialize_host")]
    pub listen_host: IpAddr,
    /// Log level
    pub log_level: String,
    /// HTTP proxy engine section
    pub http: HttpProxyConfig,
    /// Shadowsocks engine section
    pub shadowsocks: ShadowsocksConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            listen_host: defaults::listen_host(),
            log_level: defaults::log_level(),
            http: HttpProxyConfig::default(),
            shadowsocks: ShadowsocksConfig::default(),
        }
    }
}

impl SupervisorConfig {
    /// Load configuration from a JSON file
    ///
    /// # Parameters
    ///
    /// * `path` - Path to the configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SupervisorError::Config(format!(
                "failed to read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            SupervisorError::Config(format!(
                "failed to parse configuration file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Apply environment variable overrides
    ///
    /// Each recognized variable is prefixed with [`ENV_PREFIX`], e.g.
    /// `PROXY_SUPERVISOR_LISTEN_HOST`.
    pub fn apply_env(&mut self) -> Result<()> {
        let get_env = |name: &str| -> Option<String> {
            env::var(format!("{}{}", ENV_PREFIX, name)).ok()
        };

        if let Some(host) = get_env("LISTEN_HOST") {
            self.listen_host = parse_host(&host)?;
        }
        if let Some(level) = get_env("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(global_mode) = get_env("HTTP_GLOBAL_MODE") {
            self.http.global_mode = global_mode.to_lowercase() == "true";
        }
        if let Some(server) = get_env("SS_SERVER") {
            self.shadowsocks.server = Some(server);
        }
        if let Some(port) = get_env("SS_PORT") {
            let port = port.parse::<u16>().map_err(|e| {
                SupervisorError::Config(format!("invalid shadowsocks port: {}", e))
            })?;
            self.shadowsocks.server_port = Some(port);
        }
        if let Some(password) = get_env("SS_PASSWORD") {
            self.shadowsocks.password = Some(password);
        }
        if let Some(method) = get_env("SS_METHOD") {
            self.shadowsocks.method = method;
        }

        Ok(())
    }

    /// Load configuration: defaults, then an optional file, then environment
    ///
    /// Later sources override earlier ones, matching the usual
    /// defaults < file < environment precedence.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(path)?
            }
            Some(path) => {
                warn!("Configuration file not found: {}", path.display());
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// The shadowsocks section is validated lazily by its engine instead,
    /// so a host that only runs the HTTP proxy does not need to fill it in.
    pub fn validate(&self) -> Result<()> {
        if !self.listen_host.is_loopback() {
            warn!(
                "Listen host {} is not loopback; managed proxies will be reachable from other hosts",
                self.listen_host
            );
        }
        if self.log_level.is_empty() {
            return Err(SupervisorError::Config("empty log level".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SupervisorConfig::default();
        assert!(config.listen_host.is_loopback());
        assert_eq!(config.log_level, "info");
        assert!(!config.http.global_mode);
        assert!(config.shadowsocks.validate().is_err());
    }

    #[test]
    fn test_parse_config_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        write!(
            file,
            r#"{{
                "listen_host": "127.0.0.1",
                "log_level": "debug",
                "http": {{ "global_mode": true }},
                "shadowsocks": {{
                    "server": "ss.example.com",
                    "server_port": 8388,
                    "password": "secret",
                    "method": "chacha20-ietf-poly1305"
                }}
            }}"#
        )
        .expect("write config");

        let config = SupervisorConfig::from_file(file.path()).expect("parse config");
        assert_eq!(config.log_level, "debug");
        assert!(config.http.global_mode);
        assert_eq!(config.shadowsocks.server.as_deref(), Some("ss.example.com"));
        assert_eq!(config.shadowsocks.server_port, Some(8388));
        assert!(config.shadowsocks.validate().is_ok());
    }

    #[test]
    fn test_invalid_host_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        write!(file, r#"{{ "listen_host": "not-a-host" }}"#).expect("write config");

        let err = SupervisorConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, SupervisorError::Config(_)));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("PROXY_SUPERVISOR_SS_SERVER", "env.example.com");
        std::env::set_var("PROXY_SUPERVISOR_SS_PORT", "9000");
        std::env::set_var("PROXY_SUPERVISOR_SS_PASSWORD", "env-secret");

        let mut config = SupervisorConfig::default();
        config.apply_env().expect("apply env");

        std::env::remove_var("PROXY_SUPERVISOR_SS_SERVER");
        std::env::remove_var("PROXY_SUPERVISOR_SS_PORT");
        std::env::remove_var("PROXY_SUPERVISOR_SS_PASSWORD");

        assert_eq!(config.shadowsocks.server.as_deref(), Some("env.example.com"));
        assert_eq!(config.shadowsocks.server_port, Some(9000));
        assert!(config.shadowsocks.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_env_invalid_port() {
        std::env::set_var("PROXY_SUPERVISOR_SS_PORT", "not-a-port");

        let mut config = SupervisorConfig::default();
        let result = config.apply_env();

        std::env::remove_var("PROXY_SUPERVISOR_SS_PORT");

        assert!(matches!(result, Err(SupervisorError::Config(_))));
    }

    #[test]
    fn test_display_hides_password() {
        let config = ShadowsocksConfig {
            server: Some("ss.example.com".to_string()),
            server_port: Some(8388),
            password: Some("secret".to_string()),
            method: "aes-256-gcm".to_string(),
        };
        let printed = format!("{}", config);
        assert!(!printed.contains("secret"));
        assert!(printed.contains("ss.example.com:8388"));
    }
}
