//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// RTC - run Real-Time Config callout batches from the command line
#[derive(Parser, Debug)]
#[command(
    name = "rtc",
    author,
    version,
    about = "Real-Time Config callout runner",
    long_about = "Validates RTC configurations and executes RTC batches.\n\n\
                  A batch sends up to five callouts to vendor and publisher \n\
                  endpoints within one shared timeout and reports one result per callout."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "RTC_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "RTC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Expose Prometheus metrics on this port
    #[arg(long, global = true, env = "RTC_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute one RTC batch
    Run(RunArgs),

    /// Validate an RTC config without sending callouts
    Validate(ValidateArgs),

    /// List the built-in vendor registry
    Vendors(VendorsArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to the RTC config (JSON)
    #[arg(env = "RTC_CONFIG")]
    pub config: PathBuf,

    /// Consent state (SUFFICIENT, INSUFFICIENT, UNKNOWN_NOT_REQUIRED, UNKNOWN)
    #[arg(long, env = "RTC_CONSENT_STATE")]
    pub consent_state: Option<String>,

    /// Consent string substituted for CONSENT_STRING
    #[arg(long, env = "RTC_CONSENT_STRING")]
    pub consent_string: Option<String>,

    /// Publisher macro, may be repeated
    #[arg(long = "macro", value_name = "KEY=VALUE", value_parser = parse_macro)]
    pub macros: Vec<(String, String)>,

    /// Page URL substituted for HREF in error beacons
    #[arg(long, default_value = "", env = "RTC_HREF")]
    pub href: String,

    /// Cookie header sent with credentialed callouts
    #[arg(long, env = "RTC_COOKIE")]
    pub cookie: Option<String>,

    /// Send an error beacon for every error instead of sampling
    #[arg(long)]
    pub always_report: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to the RTC config (JSON)
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `vendors` command
#[derive(Parser, Debug)]
pub struct VendorsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

/// Parse `KEY=VALUE`
fn parse_macro(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{arg}'")),
    }
}
