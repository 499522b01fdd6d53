//! Common module
//!
//! This module contains shared types, errors, and utility functions used
//! throughout the application.

pub mod error;
pub mod log;
pub mod net;

// Re-export commonly used types and functions
pub use error::{Result, SupervisorError};
pub use log::init_logger;
pub use net::{format_proxy_addr, parse_host, sock_addr, sock_port};
