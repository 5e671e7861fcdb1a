//! `vendors` command implementation.

use anyhow::{Context, Result};
use dispatcher::VendorRegistry;
use serde::Serialize;

use crate::cli::VendorsArgs;

#[derive(Serialize)]
struct VendorInfo<'a> {
    name: &'a str,
    url: &'a str,
    macros: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    error_reporting_url: Option<&'a str>,
    disable_key_append: bool,
}

/// Execute the `vendors` command
pub fn run_vendors(args: &VendorsArgs) -> Result<()> {
    let registry = VendorRegistry::builtin();
    let vendors = collect_vendors(&registry);

    if args.json {
        let json =
            serde_json::to_string_pretty(&vendors).context("Failed to serialize vendor list")?;
        println!("{}", json);
        return Ok(());
    }

    println!("\n=== Built-in RTC Vendors ({}) ===\n", vendors.len());
    for vendor in &vendors {
        println!("  {}", vendor.name);
        println!("    URL: {}", vendor.url);
        if !vendor.macros.is_empty() {
            println!("    Macros: {}", vendor.macros.join(", "));
        }
        if let Some(url) = vendor.error_reporting_url {
            println!("    Error reporting: {}", url);
        }
        if vendor.disable_key_append {
            println!("    Targeting keys kept as returned");
        }
    }
    println!();
    Ok(())
}

fn collect_vendors(registry: &VendorRegistry) -> Vec<VendorInfo<'_>> {
    registry
        .iter()
        .map(|(name, definition)| VendorInfo {
            name,
            url: &definition.url,
            macros: &definition.macros,
            error_reporting_url: definition.error_reporting_url.as_deref(),
            disable_key_append: definition.disable_key_append,
        })
        .collect()
}
