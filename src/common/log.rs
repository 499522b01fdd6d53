//! Logging utilities
//!
//! This module provides helpers for initializing the logging system.

/// Initialize the logging system
///
/// # Parameters
///
/// * `level` - Default log level, overridable through `RUST_LOG`
pub fn init_logger(level: &str) {
    let env = env_logger::Env::default()
        .filter_or("RUST_LOG", level);

    env_logger::init_from_env(env);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logger() {
        // Initializes the global logger; just make sure it does not panic,
        // even when another test got there first.
        init_logger("debug");
    }
}
