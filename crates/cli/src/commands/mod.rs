//! Command implementations.

mod run;
mod validate;
mod vendors;

pub use run::run_batch;
pub use validate::run_validate;
pub use vendors::run_vendors;

use std::path::Path;

use crate::error::{CliError, Result};

/// Fail early when the config file does not exist
pub(crate) fn ensure_config_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }
    Ok(())
}

/// Read a config file, failing early when it does not exist
pub(crate) fn read_config(path: &Path) -> Result<String> {
    ensure_config_exists(path)?;
    Ok(std::fs::read_to_string(path)?)
}
