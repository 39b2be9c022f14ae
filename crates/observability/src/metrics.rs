//! 网关指标收集模块
//!
//! 发送、动作和旁路发布的 Prometheus 计数器/直方图，
//! 以及用于运行摘要的内存聚合器。

use std::collections::HashMap;
use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// 记录一次分发的结果
///
/// 标签：通道类型、通道 uuid、最终状态。
pub fn record_msg_sent(channel_type: &str, channel_uuid: &str, status: &str, elapsed: Duration) {
    counter!(
        "gateway_msgs_sent_total",
        "channel_type" => channel_type.to_string(),
        "channel_uuid" => channel_uuid.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        "gateway_msg_send_duration_seconds",
        "channel_type" => channel_type.to_string(),
        "channel_uuid" => channel_uuid.to_string(),
        "status" => status.to_string()
    )
    .record(elapsed.as_secs_f64());
}

/// 记录动作分发 (typing indicator 等)
pub fn record_action(channel_type: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(
        "gateway_actions_total",
        "channel_type" => channel_type.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a side-channel publish lifecycle stage (`queued`, `started`, `finished`)
pub fn record_side_channel_publish(kind: &str, stage: &str) {
    counter!(
        "gateway_side_channel_publish_total",
        "kind" => kind.to_string(),
        "stage" => stage.to_string()
    )
    .increment(1);
}

/// Record the final outcome of a publish on one broker target
pub fn record_publisher_outcome(target: &str, outcome: &str) {
    counter!(
        "gateway_publisher_outcome_total",
        "target" => target.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 记录后端轮询失败
pub fn record_backend_poll_error() {
    counter!("gateway_scheduler_backend_errors_total").increment(1);
}

/// 当前空闲 worker 数
pub fn record_idle_workers(idle: usize) {
    gauge!("gateway_idle_workers").set(idle as f64);
}

/// 发送指标聚合器
///
/// 在内存中聚合指标，便于运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct SendMetricsAggregator {
    /// 分发结果总数
    pub total: u64,

    /// 按状态统计
    pub by_status: HashMap<String, u64>,

    /// 按通道类型统计
    pub by_channel_type: HashMap<String, u64>,

    /// 发送耗时统计 (毫秒)
    pub duration_stats: RunningStats,
}

impl SendMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one outcome
    pub fn update(&mut self, channel_type: &str, status: &str, elapsed: Duration) {
        self.total += 1;
        *self.by_status.entry(status.to_string()).or_insert(0) += 1;
        *self
            .by_channel_type
            .entry(channel_type.to_string())
            .or_insert(0) += 1;
        self.duration_stats.push(elapsed.as_secs_f64() * 1000.0);
    }

    /// Count for a status label
    pub fn count(&self, status: &str) -> u64 {
        self.by_status.get(status).copied().unwrap_or(0)
    }

    pub fn summary(&self) -> SendSummary {
        let failures = self.count("errored") + self.count("failed");
        SendSummary {
            total: self.total,
            failures,
            failure_rate: if self.total > 0 {
                failures as f64 / self.total as f64 * 100.0
            } else {
                0.0
            },
            duration_ms: StatsSummary::from(&self.duration_stats),
            by_status: self.by_status.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 运行摘要
#[derive(Debug, Clone, Default)]
pub struct SendSummary {
    pub total: u64,
    pub failures: u64,
    pub failure_rate: f64,
    pub duration_ms: StatsSummary,
    pub by_status: HashMap<String, u64>,
}

impl std::fmt::Display for SendSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Send Summary ===")?;
        writeln!(f, "Messages handled: {}", self.total)?;
        writeln!(
            f,
            "Failures: {} ({:.2}%)",
            self.failures, self.failure_rate
        )?;
        writeln!(f, "Send duration (ms): {}", self.duration_ms)?;

        if !self.by_status.is_empty() {
            let mut statuses: Vec<_> = self.by_status.iter().collect();
            statuses.sort();
            writeln!(f, "By status:")?;
            for (status, count) in statuses {
                writeln!(f, "  {}: {}", status, count)?;
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
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计 (Welford 算法)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
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

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = SendMetricsAggregator::new();
        aggregator.update("WAC", "wired", Duration::from_millis(100));
        aggregator.update("WAC", "errored", Duration::from_millis(300));
        aggregator.update("TG", "wired", Duration::from_millis(200));

        assert_eq!(aggregator.total, 3);
        assert_eq!(aggregator.count("wired"), 2);
        assert_eq!(aggregator.by_channel_type.get("WAC"), Some(&2));

        let summary = aggregator.summary();
        assert_eq!(summary.failures, 1);
        assert!((summary.duration_ms.mean - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = SendMetricsAggregator::new();
        aggregator.update("WAC", "wired", Duration::from_millis(50));
        aggregator.update("WAC", "failed", Duration::from_millis(50));

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Messages handled: 2"));
        assert!(output.contains("50.00%"));
        assert!(output.contains("failed: 1"));
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: calls are no-ops and must not panic
        record_msg_sent("WAC", "uuid", "wired", Duration::from_millis(1));
        record_action("WAC", false);
        record_side_channel_publish("billing", "queued");
        record_publisher_outcome("redis", "published");
        record_backend_poll_error();
        record_idle_workers(3);
    }
}
