//! RTC 指标收集模块
//!
//! 记录每个 callout 的结果与耗时，以及批次级别的计数。

use std::collections::BTreeMap;

use contracts::CalloutResult;
use metrics::{counter, gauge, histogram};

/// callout 成功时的 outcome 标签
pub const OUTCOME_SUCCESS: &str = "success";

/// 记录单个 callout 结果
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_callout_result;
///
/// for result in &results {
///     record_callout_result(result);
/// }
/// ```
pub fn record_callout_result(result: &CalloutResult) {
    let outcome = result
        .error
        .map(|e| e.as_str())
        .unwrap_or(OUTCOME_SUCCESS);

    counter!("rtc_callouts_total", "outcome" => outcome).increment(1);
    histogram!("rtc_callout_time_ms", "outcome" => outcome).record(result.rtc_time as f64);
}

/// 记录配置无效导致的批次放弃
pub fn record_batch_aborted() {
    counter!("rtc_batches_total", "status" => "aborted").increment(1);
}

/// 记录完成的批次
///
/// `attempted` 为发起的 callout 数，`returned` 为实际返回的结果数 (被取消的 callout 不返回结果)。
pub fn record_batch_completed(attempted: usize, returned: usize) {
    counter!("rtc_batches_total", "status" => "completed").increment(1);
    gauge!("rtc_batch_callouts").set(attempted as f64);
    if returned < attempted {
        counter!("rtc_callouts_cancelled_total").increment((attempted - returned) as u64);
    }
}

/// 记录错误 beacon 发送
pub fn record_error_beacon() {
    counter!("rtc_error_beacons_total").increment(1);
}

/// 批次指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct BatchMetricsAggregator {
    /// 完成的批次数
    pub total_batches: u64,

    /// 被放弃的批次数
    pub aborted_batches: u64,

    /// 返回的 callout 结果数
    pub total_callouts: u64,

    /// 成功的 callout 数
    pub successful_callouts: u64,

    /// 各错误码次数
    pub error_counts: BTreeMap<String, u64>,

    /// rtcTime 统计 (毫秒)
    pub rtc_time_stats: RunningStats,
}

impl BatchMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 合并一个批次的结果，`None` 表示批次被放弃
    pub fn update(&mut self, results: Option<&[CalloutResult]>) {
        let Some(results) = results else {
            self.aborted_batches += 1;
            return;
        };

        self.total_batches += 1;
        for result in results {
            self.total_callouts += 1;
            match result.error {
                Some(error) => {
                    *self.error_counts.entry(error.as_str().to_string()).or_insert(0) += 1;
                }
                None => self.successful_callouts += 1,
            }
            self.rtc_time_stats.push(result.rtc_time as f64);
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_batches: self.total_batches,
            aborted_batches: self.aborted_batches,
            total_callouts: self.total_callouts,
            successful_callouts: self.successful_callouts,
            success_rate: if self.total_callouts > 0 {
                self.successful_callouts as f64 / self.total_callouts as f64 * 100.0
            } else {
                0.0
            },
            rtc_time_ms: StatsSummary::from(&self.rtc_time_stats),
            error_counts: self.error_counts.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_batches: u64,
    pub aborted_batches: u64,
    pub total_callouts: u64,
    pub successful_callouts: u64,
    pub success_rate: f64,
    pub rtc_time_ms: StatsSummary,
    pub error_counts: BTreeMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== RTC Metrics Summary ===")?;
        writeln!(
            f,
            "Batches: {} completed, {} aborted",
            self.total_batches, self.aborted_batches
        )?;
        writeln!(
            f,
            "Callouts: {} ({} succeeded, {:.2}%)",
            self.total_callouts, self.successful_callouts, self.success_rate
        )?;
        writeln!(f, "rtcTime (ms): {}", self.rtc_time_ms)?;

        if !self.error_counts.is_empty() {
            writeln!(f, "Errors:")?;
            for (error, count) in &self.error_counts {
                writeln!(f, "  {}: {}", error, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.0}, max={:.0}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
