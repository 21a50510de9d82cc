//! Error types for the Gateward service.

use thiserror::Error;

/// Main error type for Gateward operations.
#[derive(Error, Debug)]
pub enum GatewardError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backing store transport or backend failure
    #[error("Store unavailable: {0}")]
    Store(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Gateward operations.
pub type Result<T> = std::result::Result<T, GatewardError>;
