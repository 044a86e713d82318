//! Delivery metrics
//!
//! Prometheus counters for the fan-out path plus an in-memory aggregator that
//! summarises a run.

use metrics::{counter, gauge, histogram};

/// Record one formatted record
pub fn record_record_formatted(bytes: usize) {
    counter!("dsv_fanout_records_total").increment(1);
    histogram!("dsv_fanout_record_bytes").record(bytes as f64);
}

/// Record the outcome counts of one delivery call
pub fn record_delivery(delivered: usize, skipped: usize) {
    if delivered > 0 {
        counter!("dsv_fanout_sink_deliveries_total", "status" => "delivered")
            .increment(delivered as u64);
    }
    if skipped > 0 {
        counter!("dsv_fanout_sink_deliveries_total", "status" => "skipped")
            .increment(skipped as u64);
    }
}

/// Record a fatal sink outcome
pub fn record_sink_fatal(sink_name: &str) {
    counter!(
        "dsv_fanout_sink_fatal_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
}

/// Publish the cumulative counters of one sink
pub fn record_sink_snapshot(sink_name: &str, delivered: u64, skipped: u64, fatal: u64) {
    for (status, value) in [("delivered", delivered), ("skipped", skipped), ("fatal", fatal)] {
        gauge!(
            "dsv_fanout_sink_records",
            "sink" => sink_name.to_string(),
            "status" => status
        )
        .set(value as f64);
    }
}

/// Record the time one delivery call took, in microseconds
pub fn record_delivery_latency_us(latency_us: f64) {
    histogram!("dsv_fanout_delivery_latency_us").record(latency_us);
}

/// Run-level delivery aggregator
///
/// Aggregates in memory for a summary printed at the end of a run.
#[derive(Debug, Clone, Default)]
pub struct DeliveryAggregator {
    /// Records handed to the dispatcher
    pub total_records: u64,

    /// Sink deliveries that succeeded
    pub total_delivered: u64,

    /// Sink deliveries skipped by sink policy
    pub total_skipped: u64,

    /// Records whose delivery was aborted by a fatal sink
    pub fatal_records: u64,

    /// Formatted record size
    pub record_bytes: RunningStats,

    /// Delivery call duration
    pub latency_us: RunningStats,
}

impl DeliveryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one completed delivery call
    pub fn update(&mut self, bytes: usize, delivered: usize, skipped: usize, latency_us: f64) {
        self.total_records += 1;
        self.total_delivered += delivered as u64;
        self.total_skipped += skipped as u64;
        self.record_bytes.push(bytes as f64);
        self.latency_us.push(latency_us);
    }

    /// Account for one aborted delivery call
    pub fn record_fatal(&mut self) {
        self.total_records += 1;
        self.fatal_records += 1;
    }

    pub fn summary(&self) -> DeliverySummary {
        let attempts = self.total_delivered + self.total_skipped;
        DeliverySummary {
            total_records: self.total_records,
            total_delivered: self.total_delivered,
            total_skipped: self.total_skipped,
            fatal_records: self.fatal_records,
            skip_rate: if attempts > 0 {
                self.total_skipped as f64 / attempts as f64 * 100.0
            } else {
                0.0
            },
            record_bytes: StatsSummary::from(&self.record_bytes),
            latency_us: StatsSummary::from(&self.latency_us),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Run summary
#[derive(Debug, Clone, Default)]
pub struct DeliverySummary {
    pub total_records: u64,
    pub total_delivered: u64,
    pub total_skipped: u64,
    pub fatal_records: u64,
    pub skip_rate: f64,
    pub record_bytes: StatsSummary,
    pub latency_us: StatsSummary,
}

impl std::fmt::Display for DeliverySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Delivery Summary ===")?;
        writeln!(f, "Records: {}", self.total_records)?;
        writeln!(f, "Sink deliveries: {}", self.total_delivered)?;
        writeln!(
            f,
            "Sink skips: {} ({:.2}%)",
            self.total_skipped, self.skip_rate
        )?;
        writeln!(f, "Aborted records: {}", self.fatal_records)?;
        writeln!(f, "Record size (bytes): {}", self.record_bytes)?;
        writeln!(f, "Delivery latency (us): {}", self.latency_us)?;
        Ok(())
    }
}

/// Statistics summary
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

/// Online statistics (Welford's algorithm)
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

    /// Sample variance
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

        stats.push(1.0);
        stats.push(2.0);
        stats.push(3.0);
        stats.push(4.0);
        stats.push(5.0);

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = DeliveryAggregator::new();

        aggregator.update(120, 3, 1, 15.0);
        aggregator.update(80, 4, 0, 5.0);
        aggregator.record_fatal();

        assert_eq!(aggregator.total_records, 3);
        assert_eq!(aggregator.total_delivered, 7);
        assert_eq!(aggregator.total_skipped, 1);
        assert_eq!(aggregator.fatal_records, 1);

        let summary = aggregator.summary();
        assert!((summary.skip_rate - 12.5).abs() < 1e-10);
        assert!((summary.record_bytes.mean - 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = DeliveryAggregator::new();
        for _ in 0..100 {
            aggregator.update(64, 2, 0, 10.0);
        }

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Records: 100"));
        assert!(output.contains("0.00%"));
    }

    #[test]
    fn test_recording_without_exporter() {
        // No recorder installed: calls are no-ops
        record_record_formatted(64);
        record_delivery(2, 1);
        record_sink_fatal("archive");
        record_sink_snapshot("archive", 1, 2, 3);
        record_delivery_latency_us(12.0);
    }
}
