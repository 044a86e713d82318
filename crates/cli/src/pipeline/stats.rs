//! Pipeline statistics and metrics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::DeliveryAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Input lines that held a record
    pub records_read: u64,

    /// Input lines that could not be decoded
    pub invalid_records: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Number of configured sinks
    pub active_sinks: usize,

    /// Delivery outcome aggregator
    pub delivery: DeliveryAggregator,

    /// Final per-sink counters
    pub sink_metrics: Vec<(String, MetricsSnapshot)>,
}

impl PipelineStats {
    /// Delivered records per second
    pub fn records_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.delivery.total_records as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n+--------------------------------------------------------------+");
        println!("|                    Delivery Statistics                       |");
        println!("+--------------------------------------------------------------+\n");

        println!("Overview");
        println!("   |- Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   |- Records read: {}", self.records_read);
        println!("   |- Invalid records: {}", self.invalid_records);
        println!("   |- Records/s: {:.2}", self.records_per_sec());
        println!("   `- Sinks: {}", self.active_sinks);

        println!("\n{}", self.delivery.summary());

        if !self.sink_metrics.is_empty() {
            println!("Per sink");
            for (i, (name, snapshot)) in self.sink_metrics.iter().enumerate() {
                let prefix = if i == self.sink_metrics.len() - 1 { "`-" } else { "|-" };
                println!(
                    "   {} {}: delivered={}, skipped={}, fatal={}",
                    prefix,
                    name,
                    snapshot.delivered_count,
                    snapshot.skipped_count,
                    snapshot.fatal_count
                );
            }
        }
        println!();
    }
}
