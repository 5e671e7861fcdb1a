//! Layered error definitions
//!
//! Categorized by source: config / macro / expansion / transport

use thiserror::Error;

/// Configuration-level error. Any of these aborts the whole RTC batch.
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration parse error carrying the underlying cause
    pub fn config_parse_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Failure of a single macro resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MacroError {
    /// A keyed macro such as `CONSENT_METADATA(key)` was used without a key
    #[error("macro '{macro_name}' requires a key argument")]
    MissingKey { macro_name: String },
}

impl MacroError {
    pub fn missing_key(macro_name: impl Into<String>) -> Self {
        Self::MissingKey {
            macro_name: macro_name.into(),
        }
    }
}

/// Failure of asynchronous URL template expansion.
#[derive(Debug, Error)]
pub enum ExpandError {
    #[error(transparent)]
    Macro(#[from] MacroError),

    /// The surrounding ad request went away while expanding
    #[error("expansion cancelled")]
    Cancelled,
}

/// Failure reported by an `HttpClient`.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Messages of this variant always start with `timeout`
    #[error("timeout: {0}")]
    Timeout(String),

    #[error("request failed with status {status}")]
    Status { status: u16 },

    #[error("network error: {0}")]
    Network(String),

    /// No sandboxed-script runtime is available to serve the URI
    #[error("script runtime unavailable for '{uri}'")]
    ScriptUnavailable { uri: String },

    #[error("request cancelled")]
    Cancelled,
}

impl TransportError {
    /// Whether the failure carries the timeout signature.
    pub fn is_timeout(&self) -> bool {
        self.to_string().starts_with("timeout")
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_signature() {
        assert!(TransportError::Timeout("deadline elapsed".into()).is_timeout());
        assert!(!TransportError::Network("connection reset".into()).is_timeout());
        assert!(!TransportError::Status { status: 504 }.is_timeout());
    }

    #[test]
    fn test_config_errors_display() {
        let err = ContractError::config_validation("timeoutMillis", "out of range");
        assert_eq!(
            err.to_string(),
            "config validation error at 'timeoutMillis': out of range"
        );
        let err = ContractError::config_parse("unexpected end of input");
        assert!(err.to_string().starts_with("config parse error"));
    }
}
