//! Error types for the printer library

use thiserror::Error;

/// Printer device error types
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Network connection error
    #[error("Connection failed: {0}")]
    Connection(String),

    /// IO error during printing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout waiting for printer
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid printer configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type for printer operations
pub type DeviceResult<T> = Result<T, DeviceError>;
