//! `run` command implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use adapters::{ReqwestHttpClient, StandardUrlValidator, TemplateResolver};
use anyhow::{Context, Result};
use contracts::{
    CalloutResult, ConsentSnapshot, ConsentState, MacroTable, MacroValue, StillCurrent,
};
use dispatcher::{merge_rtc_responses, RealTimeConfigManager, ReporterConfig, RtcParams};
use observability::BatchMetricsAggregator;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::read_config;
use crate::cli::RunArgs;
use crate::error::CliError;

/// Batch output for JSON mode
#[derive(Serialize)]
struct BatchOutput<'a> {
    results: &'a [CalloutResult],
    params: Option<RtcParams>,
    targeting: Map<String, Value>,
}

/// Execute the `run` command
pub async fn run_batch(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading RTC config");
    let raw_config = read_config(&args.config)?;

    let consent = consent_from_args(args)?;
    let macros = macros_from_args(args);

    let mut http = ReqwestHttpClient::new().context("Failed to build HTTP client")?;
    if let Some(ref cookie) = args.cookie {
        http = http.with_cookie(cookie.clone());
    }
    let manager = RealTimeConfigManager::new(TemplateResolver, http, StandardUrlValidator)
        .with_reporter_config(ReporterConfig {
            page_href: args.href.clone(),
            always_report: args.always_report,
            ..ReporterConfig::default()
        });

    // Ctrl+C marks the batch as no longer current.
    let current = Arc::new(AtomicBool::new(true));
    let still_current = {
        let current = current.clone();
        StillCurrent::new(move || current.load(Ordering::SeqCst))
    };
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received interrupt, cancelling outstanding callouts");
            current.store(false, Ordering::SeqCst);
        }
    });

    let results = manager
        .execute(&raw_config, macros, &consent, still_current)
        .await;
    interrupt.abort();

    let Some(results) = results else {
        return Err(CliError::batch_aborted(args.config.display().to_string()).into());
    };

    let mut targeting = Map::new();
    let params = merge_rtc_responses(Some(&results), &mut targeting, manager.registry());

    let mut aggregator = BatchMetricsAggregator::new();
    aggregator.update(Some(&results));

    if args.json {
        let output = BatchOutput {
            results: &results,
            params,
            targeting,
        };
        let json =
            serde_json::to_string_pretty(&output).context("Failed to serialize batch output")?;
        println!("{}", json);
    } else {
        print_batch(&results, params.as_ref(), &targeting)?;
        println!("{}", aggregator.summary());
    }

    info!(callouts = results.len(), "RTC batch completed");
    Ok(())
}

fn consent_from_args(args: &RunArgs) -> Result<ConsentSnapshot, CliError> {
    let state = args
        .consent_state
        .as_deref()
        .map(|name| {
            ConsentState::from_name(&name.to_uppercase())
                .ok_or_else(|| CliError::invalid_consent_state(name))
        })
        .transpose()?;

    Ok(ConsentSnapshot {
        state,
        string: args.consent_string.clone(),
        metadata: None,
    })
}

fn macros_from_args(args: &RunArgs) -> MacroTable {
    args.macros
        .iter()
        .map(|(key, value)| (key.clone(), MacroValue::constant(value.clone())))
        .collect()
}

fn print_batch(
    results: &[CalloutResult],
    params: Option<&RtcParams>,
    targeting: &Map<String, Value>,
) -> Result<()> {
    println!("\n=== RTC Results ({}) ===\n", results.len());
    for result in results {
        match result.error {
            Some(error) => println!(
                "  ✗ {:<50} {:>5} ms  {} ({})",
                result.callout,
                result.rtc_time,
                error,
                error.wire_code()
            ),
            None => println!(
                "  ✓ {:<50} {:>5} ms  {}",
                result.callout,
                result.rtc_time,
                result
                    .response
                    .as_ref()
                    .map(Value::to_string)
                    .unwrap_or_else(|| "(no response)".to_string())
            ),
        }
    }

    if let Some(params) = params {
        println!("\nAd request parameters:");
        println!("  artc = {}", params.artc.as_deref().unwrap_or(""));
        println!("  ati  = {}", params.ati);
        println!("  ard  = {}", params.ard);
    }

    if !targeting.is_empty() {
        println!("\nMerged targeting:");
        println!("{}", serde_json::to_string_pretty(targeting)?);
    }
    println!();
    Ok(())
}
