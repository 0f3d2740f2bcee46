//! Error types for Cerberus Monitor

use thiserror::Error;

/// Application-level errors
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Transport-level failure (connect, subscribe, read, write)
    #[error("Transport error: {0}")]
    Transport(String),

    /// RPC/REST fetch failure
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Malformed wire message
    #[error("Parse error: {0}")]
    Parse(String),

    /// Notifier delivery failure
    #[error("Notification error: {0}")]
    Notify(String),
}

/// Result type alias for convenience
pub type MonitorResult<T> = Result<T, MonitorError>;
