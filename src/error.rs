//! Error types for romdb
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using RomError
pub type Result<T> = std::result::Result<T, RomError>;

/// Unified error type for romdb operations
#[derive(Debug, Error)]
pub enum RomError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Loader Errors
    // -------------------------------------------------------------------------
    /// Source file is missing, unreadable, or does not match the backend layout
    #[error("Format error: {0}")]
    Format(String),

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Malformed response seen by a client
    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    /// Store is stopped, or a background unit failed to stop in time
    #[error("Shutdown error: {0}")]
    Shutdown(String),

    #[error("Lifecycle error: {0}")]
    Lifecycle(String),
}

impl RomError {
    /// Build a format error that names the offending file
    pub fn format(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        RomError::Format(format!("{}: {}", path.display(), reason))
    }
}
