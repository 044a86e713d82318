//! Pipeline orchestrator - reads records and drives the dispatcher.
//!
//! Runs synchronously; the `run` command puts it on a blocking task and flips
//! the stop flag on shutdown signals.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::{FlowRecord, OutputsBlueprint, RecordFormatter};
use dispatcher::{create_dispatcher, Dispatcher, DispatcherError};
use formatter::DsvFormatter;
use observability::metrics::{
    record_delivery, record_delivery_latency_us, record_record_formatted, record_sink_fatal,
    record_sink_snapshot,
};
use tracing::{debug, info, warn};

use super::PipelineStats;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Formatter and sink configuration
    pub blueprint: OutputsBlueprint,

    /// JSON-lines input (None = stdin)
    pub input: Option<PathBuf>,

    /// Continue after fatal sink outcomes
    pub keep_going: bool,

    /// Maximum number of records to deliver (None = unlimited)
    pub max_records: Option<u64>,

    /// Flush sinks every N records (None = only at the end)
    pub flush_every: Option<u64>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
    stop: Arc<AtomicBool>,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that ends the pipeline after the current record
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Run the pipeline to completion on the configured input
    pub fn run(self) -> Result<PipelineStats> {
        let input = self.config.input.clone();
        match input.as_deref() {
            Some(path) if path != Path::new("-") => {
                let file = File::open(path)
                    .with_context(|| format!("Failed to open input {}", path.display()))?;
                info!(input = %path.display(), "Reading records from file");
                self.run_with_reader(BufReader::new(file))
            }
            _ => {
                info!("Reading records from stdin");
                self.run_with_reader(io::stdin().lock())
            }
        }
    }

    /// Run the pipeline on an arbitrary JSON-lines reader
    pub fn run_with_reader<R: BufRead>(self, reader: R) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        let formatter = DsvFormatter::with_iana(blueprint.format.clone());
        let mut dispatcher =
            create_dispatcher(&blueprint.sinks, formatter).context("Failed to create dispatcher")?;

        let mut stats = PipelineStats {
            active_sinks: dispatcher.sink_count(),
            ..Default::default()
        };
        info!(sinks = stats.active_sinks, "Dispatcher ready");

        let delivered = self.deliver_all(reader, &mut dispatcher, &mut stats);

        // Sinks are closed on every path so files are finalized
        dispatcher.flush();
        stats.sink_metrics = dispatcher.metrics();
        for (name, snapshot) in &stats.sink_metrics {
            record_sink_snapshot(
                name,
                snapshot.delivered_count,
                snapshot.skipped_count,
                snapshot.fatal_count,
            );
        }
        let closed = dispatcher.shutdown();

        delivered?;
        closed.context("Failed to close sinks")?;

        stats.duration = start_time.elapsed();
        info!(
            records = stats.delivery.total_records,
            duration_secs = stats.duration.as_secs_f64(),
            "Pipeline finished"
        );
        Ok(stats)
    }

    fn deliver_all<R: BufRead, F: RecordFormatter>(
        &self,
        reader: R,
        dispatcher: &mut Dispatcher<F>,
        stats: &mut PipelineStats,
    ) -> Result<(), CliError> {
        for (idx, line) in reader.lines().enumerate() {
            if self.stop.load(Ordering::Acquire) {
                info!("Stop requested");
                break;
            }
            if let Some(max) = self.config.max_records {
                if stats.delivery.total_records >= max {
                    info!(records = max, "Reached max records limit");
                    break;
                }
            }

            let line = line?;
            let line_no = idx as u64 + 1;
            if line.trim().is_empty() {
                continue;
            }

            let record: FlowRecord = match serde_json::from_str(&line) {
                Ok(record) => record,
                Err(e) => {
                    stats.invalid_records += 1;
                    let err = CliError::invalid_record(line_no, e.to_string());
                    warn!(error = %err, "Skipping record");
                    continue;
                }
            };
            stats.records_read += 1;

            let formatted = dispatcher.format(&record);
            record_record_formatted(formatted.len());

            let started = Instant::now();
            match dispatcher.deliver_formatted(&formatted) {
                Ok(report) => {
                    let latency_us = started.elapsed().as_secs_f64() * 1e6;
                    record_delivery(report.delivered, report.skipped);
                    record_delivery_latency_us(latency_us);
                    stats
                        .delivery
                        .update(formatted.len(), report.delivered, report.skipped, latency_us);
                }
                Err(e) => {
                    if let DispatcherError::SinkFatal { name, .. } = &e {
                        record_sink_fatal(name);
                    }
                    stats.delivery.record_fatal();
                    if !self.config.keep_going {
                        return Err(CliError::delivery_aborted(stats.delivery.total_records, e));
                    }
                    warn!(line = line_no, error = %e, "Record not fully delivered, continuing");
                }
            }

            if let Some(every) = self.config.flush_every {
                if stats.delivery.total_records.is_multiple_of(every) {
                    debug!(records = stats.delivery.total_records, "Flushing sinks");
                    dispatcher.flush();
                }
            }
        }
        Ok(())
    }
}
