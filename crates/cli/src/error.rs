//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Unrecognised `--consent-state`
    #[error("Unknown consent state: {name}")]
    InvalidConsentState { name: String },

    /// The config failed validation, no callouts were sent
    #[error("RTC config {path} is invalid, batch aborted")]
    BatchAborted { path: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_consent_state(name: impl Into<String>) -> Self {
        Self::InvalidConsentState { name: name.into() }
    }

    pub fn batch_aborted(path: impl Into<String>) -> Self {
        Self::BatchAborted { path: path.into() }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
