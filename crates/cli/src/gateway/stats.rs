//! Run statistics.

use std::time::Duration;

use observability::SendMetricsAggregator;
use publisher::MetricsSnapshot;
use sender::BackendCalls;

/// Statistics from a gateway run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Messages queued from the fixture
    pub messages_queued: usize,

    /// Messages left in the queue when the run ended
    pub messages_left: usize,

    /// Number of workers
    pub workers: usize,

    /// Total duration of the run
    pub duration: Duration,

    /// Send outcomes
    pub sends: SendMetricsAggregator,

    /// Per-target publisher counters
    pub publishers: Vec<(String, MetricsSnapshot)>,

    /// Backend call counters
    pub backend_calls: BackendCalls,
}

impl RunStats {
    /// Messages per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.sends.total as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Gateway Run ===\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Workers: {}", self.workers);
        println!("   ├─ Messages queued: {}", self.messages_queued);
        println!("   ├─ Messages left: {}", self.messages_left);
        println!("   └─ Throughput: {:.2} msg/s", self.throughput());

        println!("\n{}", self.sends.summary());

        if !self.publishers.is_empty() {
            println!("Side-channel publishers");
            for (i, (name, snapshot)) in self.publishers.iter().enumerate() {
                let prefix = if i == self.publishers.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {}: queued={} published={} failed={} dropped={} hook_panics={} connects={}",
                    prefix,
                    name,
                    snapshot.queued_count,
                    snapshot.published_count,
                    snapshot.failed_count,
                    snapshot.dropped_count,
                    snapshot.hook_panic_count,
                    snapshot.connect_count
                );
            }
        }

        let calls = &self.backend_calls;
        println!("\nBackend calls");
        println!("   ├─ Pops: {}", calls.pop);
        println!("   ├─ Status writes: {}", calls.write_msg_status);
        println!("   ├─ Log writes: {}", calls.write_channel_logs);
        println!("   └─ Completions: {}", calls.mark_complete);

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput() {
        let mut stats = RunStats {
            duration: Duration::from_secs(2),
            ..Default::default()
        };
        for _ in 0..10 {
            stats.sends.update("WAC", "wired", Duration::from_millis(5));
        }
        assert!((stats.throughput() - 5.0).abs() < 1e-9);
        assert_eq!(RunStats::default().throughput(), 0.0);
    }
}
