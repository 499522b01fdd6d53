//! Error handling module
//!
//! This module defines the error types and result type aliases used in the
//! application.
//!
//! The error type is `Clone` on purpose: when several concurrent start
//! requests coalesce onto one in-flight bind, the single outcome has to be
//! delivered to every waiter.

use thiserror::Error;

/// Proxy supervisor error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    /// Port allocation or engine bind failed
    #[error("bind failure: {0}")]
    BindFailure(String),

    /// SOCKS port query on a missing, closed or unbound socket handle
    #[error("invalid socket: {0}")]
    InvalidSocket(String),

    /// A stop request raced a pending start; the listener never became ready
    #[error("proxy stopped before it became ready")]
    StoppedBeforeReady,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The supervisor task for this engine kind is gone
    #[error("supervisor channel closed")]
    ChannelClosed,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for SupervisorError {
    fn from(err: std::io::Error) -> Self {
        SupervisorError::BindFailure(err.to_string())
    }
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `SupervisorError`.
pub type Result<T> = std::result::Result<T, SupervisorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_conversion() {
        // IO errors map onto the bind failure taxonomy
        let io_err = io::Error::new(io::ErrorKind::AddrInUse, "address in use");
        let err: SupervisorError = io_err.into();

        match err {
            SupervisorError::BindFailure(msg) => assert!(msg.contains("address in use")),
            _ => panic!("Should convert to a bind failure"),
        }
    }

    #[test]
    fn test_error_display() {
        let err = SupervisorError::Config("missing shadowsocks server".to_string());
        let err_str = format!("{}", err);
        assert!(err_str.contains("missing shadowsocks server"));
    }

    #[test]
    fn test_error_clone_fans_out() {
        // One outcome, several waiters
        let err = SupervisorError::StoppedBeforeReady;
        let copies: Vec<SupervisorError> = (0..3).map(|_| err.clone()).collect();
        assert!(copies.iter().all(|e| *e == SupervisorError::StoppedBeforeReady));
    }
}
