//! `validate` command implementation.

use adapters::StandardUrlValidator;
use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{RtcConfig, UrlEntry};
use serde::Serialize;
use tracing::info;

use super::ensure_config_exists;
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<RtcConfig>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating RTC config");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result)?;
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("RTC config validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    let loaded = ensure_config_exists(&args.config)
        .map_err(|e| e.to_string())
        .and_then(|()| {
            ConfigLoader::load_from_path(&args.config, &StandardUrlValidator)
                .map_err(|e| e.to_string())
        });

    match loaded {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                config: Some(config),
            }
        }
        Err(error) => ValidationResult {
            valid: false,
            config_path,
            error: Some(error),
            warnings: None,
            config: None,
        },
    }
}

/// Collect non-fatal issues
fn collect_warnings(config: &RtcConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    let malformed = config
        .urls
        .iter()
        .filter(|entry| matches!(entry, UrlEntry::Malformed(_)))
        .count();
    if malformed > 0 {
        warnings.push(format!("{malformed} url entries are malformed and will be skipped"));
    }

    let callouts = config.callouts().count();
    if callouts > contracts::MAX_RTC_CALLOUTS {
        warnings.push(format!(
            "{callouts} callouts declared, only {} will be sent",
            contracts::MAX_RTC_CALLOUTS
        ));
    }

    let registry = dispatcher::VendorRegistry::builtin();
    for vendor in &config.vendors {
        if registry.lookup(&vendor.name).is_none() {
            warnings.push(format!("Vendor '{}' is not in the built-in registry", vendor.name));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) -> Result<()> {
    if result.valid {
        println!("✓ RTC config is valid: {}", result.config_path);

        if let Some(ref config) = result.config {
            println!("\n{}", ConfigLoader::to_json(config)?);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ RTC config is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
    Ok(())
}
