//! # RTC CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - RTC 配置验证
//! - 对真实端点执行单个 RTC 批次
//! - 内置 vendor 列表

mod cli;
mod commands;
mod error;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_batch, run_validate, run_vendors};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "RTC CLI starting");

    let result = match &cli.command {
        Commands::Run(args) => run_batch(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Vendors(args) => run_vendors(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging and metrics based on CLI options
fn init_logging(cli: &Cli) -> Result<()> {
    let config = ObservabilityConfig::new(cli.log_format.into())
        .with_verbosity(cli.quiet, cli.verbose)
        .with_metrics_port(cli.metrics_port);
    observability::init_with_config(config)
}
