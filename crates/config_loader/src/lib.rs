//! # Config Loader
//!
//! RTC configuration loading, validation and consent filtering.
//!
//! Responsibilities:
//! - Parse the raw `rtc-config` JSON string
//! - Validate and normalize it into an `RtcConfig`
//! - Drop callouts the current consent state does not allow
//!
//! # Example
//!
//! ```no_run
//! use adapters::StandardUrlValidator;
//! use config_loader::ConfigLoader;
//!
//! let config = ConfigLoader::load_from_str(
//!     r#"{"urls": ["https://a.test/x"], "timeoutMillis": 500}"#,
//!     &StandardUrlValidator,
//! )
//! .unwrap();
//! assert_eq!(config.timeout_millis, 500);
//! ```

mod consent;
mod parser;
mod validator;

pub use consent::{filter_for_consent, is_valid_for_consent_state};
pub use contracts::RtcConfig;
pub use parser::is_truthy;

use contracts::{ContractError, UrlValidator};
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// # Errors
    /// - File read failure
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path<V>(path: &Path, url_validator: &V) -> Result<RtcConfig, ContractError>
    where
        V: UrlValidator + ?Sized,
    {
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, url_validator)
    }

    /// Load configuration from string
    ///
    /// Validating the same string twice yields equal configs.
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str<V>(content: &str, url_validator: &V) -> Result<RtcConfig, ContractError>
    where
        V: UrlValidator + ?Sized,
    {
        let raw = parser::parse(content)?;
        validator::validate(&raw, url_validator)
    }

    /// Serialize RtcConfig to JSON string
    pub fn to_json(config: &RtcConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }
}
