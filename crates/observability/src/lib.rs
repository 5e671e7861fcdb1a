//! # Observability
//!
//! RTC 运行时的日志与指标。
//!
//! - 日志：`tracing` 订阅器，级别由 `-q` / `-v` 决定，可被 `RTC_LOG` 或 `RUST_LOG` 覆盖
//! - 指标：callout 结果、批次统计、错误 beacon；仅在配置了端口时暴露 Prometheus 端点
//!
//! ## 使用示例
//!
//! ```ignore
//! use observability::{LogFormat, ObservabilityConfig};
//!
//! let config = ObservabilityConfig::new(LogFormat::Compact)
//!     .with_verbosity(false, 1)
//!     .with_metrics_port(Some(9898));
//! observability::init_with_config(config)?;
//! ```

pub mod metrics;

use std::net::{Ipv4Addr, SocketAddr};

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

pub use crate::metrics::{
    record_batch_aborted, record_batch_completed, record_callout_result, record_error_beacon,
    BatchMetricsAggregator, MetricsSummary, RunningStats, StatsSummary,
};

/// 优先于 `RUST_LOG` 的日志过滤环境变量
pub const LOG_FILTER_ENV: &str = "RTC_LOG";

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    /// 单行，不带 target
    Compact,
}

/// 可观测性配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// 未设置过滤环境变量时的级别
    pub default_log_level: &'static str,
    /// Prometheus 端口 (None = 不导出)
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self::new(LogFormat::default())
    }
}

impl ObservabilityConfig {
    pub fn new(log_format: LogFormat) -> Self {
        Self {
            log_format,
            default_log_level: "info",
            metrics_port: None,
        }
    }

    /// `quiet` 只保留 warn 以上；每个 `-v` 提升一级，最多到 trace
    pub fn with_verbosity(mut self, quiet: bool, verbose: u8) -> Self {
        self.default_log_level = level_for(quiet, verbose);
        self
    }

    pub fn with_metrics_port(mut self, port: Option<u16>) -> Self {
        self.metrics_port = port;
        self
    }

    /// Prometheus 端点地址，监听所有接口
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_port
            .map(|port| SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
    }
}

fn level_for(quiet: bool, verbose: u8) -> &'static str {
    if quiet {
        return "warn";
    }
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn fmt_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    }
}

/// 安装全局 tracing 订阅器，并按需启动 Prometheus 导出
///
/// 每个进程只能成功调用一次。
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = env_filter(config.default_log_level);

    tracing_subscriber::registry()
        .with(fmt_layer(config.log_format).with_filter(filter))
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(addr) = config.metrics_addr() {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus recorder")?;
        tracing::info!(%addr, "Prometheus metrics endpoint listening");
    }

    tracing::debug!(
        log_format = ?config.log_format,
        level = config.default_log_level,
        "Observability initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_exports_nothing() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.default_log_level, "info");
        assert_eq!(config.metrics_port, None);
        assert_eq!(config.metrics_addr(), None);
    }

    #[test]
    fn test_verbosity_levels() {
        let level = |quiet, verbose| {
            ObservabilityConfig::new(LogFormat::Pretty)
                .with_verbosity(quiet, verbose)
                .default_log_level
        };
        assert_eq!(level(false, 0), "info");
        assert_eq!(level(false, 1), "debug");
        assert_eq!(level(false, 2), "trace");
        assert_eq!(level(false, 7), "trace");
        assert_eq!(level(true, 0), "warn");
    }

    #[test]
    fn test_metrics_addr() {
        let config = ObservabilityConfig::default().with_metrics_port(Some(9898));
        assert_eq!(
            config.metrics_addr(),
            Some(SocketAddr::from(([0, 0, 0, 0], 9898)))
        );
    }

    #[test]
    fn test_second_init_fails() {
        let config = ObservabilityConfig::new(LogFormat::Compact).with_verbosity(true, 0);
        // 全局订阅器每个进程只能安装一次
        let first = init_with_config(config.clone());
        let second = init_with_config(config);
        assert!(first.is_ok());
        assert!(second.is_err());
    }
}
