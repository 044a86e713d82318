//! Dispatcher - formats each record once and fans it out to every sink

use bytes::BytesMut;
use tracing::{debug, error, info, instrument, trace, warn};

use contracts::{DataSink, Delivery, FlowRecord, FormattedRecord, RecordFormatter, SinkConfig};

use crate::error::DispatcherError;
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::sinks::Sink;

/// Scratch capacity reserved for one formatted record
const RECORD_CAPACITY: usize = 512;

/// Outcome counts of one successful delivery call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub skipped: usize,
}

/// A registered sink and its counters
struct SinkSlot {
    sink: Sink,
    metrics: SinkMetrics,
}

/// The Dispatcher that owns the sink registry
pub struct Dispatcher<F> {
    formatter: F,
    sinks: Vec<SinkSlot>,
    scratch: BytesMut,
    records: u64,
}

impl<F: RecordFormatter> Dispatcher<F> {
    /// Create a dispatcher without sinks
    pub fn new(formatter: F) -> Self {
        Self {
            formatter,
            sinks: Vec::new(),
            scratch: BytesMut::with_capacity(RECORD_CAPACITY),
            records: 0,
        }
    }

    /// Append a sink; sinks receive records in registration order
    pub fn register_sink(&mut self, sink: impl Into<Sink>) {
        let sink = sink.into();
        debug!(sink = %sink.name(), position = self.sinks.len(), "Sink registered");
        self.sinks.push(SinkSlot {
            sink,
            metrics: SinkMetrics::new(),
        });
    }

    /// Number of registered sinks
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn formatter(&self) -> &F {
        &self.formatter
    }

    /// Render a record once into a shareable buffer
    pub fn format(&mut self, record: &FlowRecord) -> FormattedRecord {
        self.scratch.reserve(RECORD_CAPACITY);
        self.formatter.format(record, &mut self.scratch);
        FormattedRecord::new(self.scratch.split().freeze())
    }

    /// Format `record` and deliver it to every sink
    pub fn deliver(&mut self, record: &FlowRecord) -> Result<DispatchReport, DispatcherError> {
        let formatted = self.format(record);
        self.deliver_formatted(&formatted)
    }

    /// Deliver an already formatted record to every sink
    ///
    /// A fatal outcome of one sink stops the call; sinks after it do not see the
    /// record.
    pub fn deliver_formatted(
        &mut self,
        record: &FormattedRecord,
    ) -> Result<DispatchReport, DispatcherError> {
        self.records += 1;
        let mut report = DispatchReport::default();

        for slot in &mut self.sinks {
            match slot.sink.deliver(record) {
                Ok(Delivery::Delivered) => {
                    slot.metrics.inc_delivered_count();
                    report.delivered += 1;
                }
                Ok(Delivery::Skipped) => {
                    slot.metrics.inc_skipped_count();
                    trace!(sink = %slot.sink.name(), "Record skipped");
                    report.skipped += 1;
                }
                Err(e) => {
                    slot.metrics.inc_fatal_count();
                    error!(sink = %slot.sink.name(), error = %e, "Sink failed, delivery aborted");
                    return Err(DispatcherError::sink_fatal(slot.sink.name(), e));
                }
            }
        }

        if self.records.is_multiple_of(10_000) {
            debug!(records = self.records, "Dispatcher progress");
        }
        Ok(report)
    }

    /// Flush every sink
    pub fn flush(&mut self) {
        for slot in &mut self.sinks {
            slot.sink.flush();
        }
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.sinks
            .iter()
            .map(|slot| (slot.sink.name().to_string(), slot.metrics.snapshot()))
            .collect()
    }

    /// Close every sink in registration order
    ///
    /// All sinks are closed even if one fails; the first failure is returned.
    #[instrument(name = "dispatcher_shutdown", skip(self), fields(sinks = self.sinks.len()))]
    pub fn shutdown(mut self) -> Result<(), DispatcherError> {
        let mut first_error = None;
        for mut slot in self.sinks.drain(..) {
            if let Err(e) = slot.sink.close() {
                warn!(sink = %slot.sink.name(), error = %e, "Sink close failed");
                first_error.get_or_insert(e);
            }
        }
        info!(records = self.records, "Dispatcher shutdown complete");
        first_error.map_or(Ok(()), |e| Err(e.into()))
    }
}

/// Convenience function to create a dispatcher from sink configs
///
/// Sinks are built in order; if one cannot be built, the ones already built are
/// closed again.
#[instrument(name = "dispatcher_create", skip(sink_configs, formatter), fields(sink_count = sink_configs.len()))]
pub fn create_dispatcher<F: RecordFormatter>(
    sink_configs: &[SinkConfig],
    formatter: F,
) -> Result<Dispatcher<F>, DispatcherError> {
    let mut dispatcher = Dispatcher::new(formatter);
    for config in sink_configs {
        match Sink::build(config) {
            Ok(sink) => dispatcher.register_sink(sink),
            Err(e) => {
                if let Err(close_err) = dispatcher.shutdown() {
                    warn!(error = %close_err, "Teardown after failed sink creation failed");
                }
                return Err(DispatcherError::sink_creation(&config.name, e.to_string()));
            }
        }
    }
    info!(sinks = dispatcher.sink_count(), "Dispatcher created");
    Ok(dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::{ConsoleSink, FileSink};
    use contracts::{
        Compression, FieldValue, FileSinkConfig, FormatConfig, SinkKind,
    };
    use formatter::DsvFormatter;
    use std::io::{self, Write};
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn record(port: u64) -> FlowRecord {
        FlowRecord::new()
            .with(8, FieldValue::Ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))))
            .with(7, FieldValue::Unsigned(port))
    }

    fn dispatcher() -> Dispatcher<DsvFormatter> {
        Dispatcher::new(DsvFormatter::with_iana(FormatConfig::default()))
    }

    #[test]
    fn test_dispatcher_fanout() {
        let first = Captured::default();
        let second = Captured::default();
        let mut dispatcher = dispatcher();
        dispatcher.register_sink(ConsoleSink::with_writer("first", first.clone()));
        dispatcher.register_sink(ConsoleSink::with_writer("second", second.clone()));

        for port in 0..5 {
            let report = dispatcher.deliver(&record(port)).unwrap();
            assert_eq!(report, DispatchReport { delivered: 2, skipped: 0 });
        }

        assert_eq!(first.contents(), second.contents());
        assert_eq!(first.contents().lines().count(), 5);
        assert!(first.contents().starts_with("10.0.0.1,0\n"));

        let metrics = dispatcher.metrics();
        assert_eq!(metrics[0].0, "first");
        assert_eq!(metrics[0].1.delivered_count, 5);
        dispatcher.shutdown().unwrap();
    }

    #[test]
    fn test_format_produces_independent_buffers() {
        let mut dispatcher = dispatcher();
        let a = dispatcher.format(&record(1));
        let b = dispatcher.format(&record(2));
        assert_eq!(a.as_bytes(), b"10.0.0.1,1\n");
        assert_eq!(b.as_bytes(), b"10.0.0.1,2\n");
    }

    #[test]
    fn test_fatal_aborts_remaining_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileSinkConfig {
            path_pattern: format!("{}/", dir.path().display()),
            prefix: "flows.".to_string(),
            window_size: 60,
            window_align: true,
            compression: Compression::None,
            rotation_tick_ms: 1000,
        };
        let mut file = FileSink::new("archive", &config).unwrap();
        // A closed FileSink has no window and reports a fatal outcome
        file.close().unwrap();

        let before = Captured::default();
        let after = Captured::default();
        let mut dispatcher = dispatcher();
        dispatcher.register_sink(ConsoleSink::with_writer("before", before.clone()));
        dispatcher.register_sink(file);
        dispatcher.register_sink(ConsoleSink::with_writer("after", after.clone()));

        let err = dispatcher.deliver(&record(80)).unwrap_err();
        assert!(err.is_sink_fatal());
        assert!(matches!(err, DispatcherError::SinkFatal { ref name, .. } if name == "archive"));

        assert_eq!(before.contents(), "10.0.0.1,80\n");
        assert!(after.contents().is_empty());

        let metrics = dispatcher.metrics();
        assert_eq!(metrics[1].1.fatal_count, 1);
        assert_eq!(metrics[2].1.delivered_count, 0);
    }

    #[test]
    fn test_create_dispatcher_from_config() {
        let configs = vec![SinkConfig {
            name: "screen".to_string(),
            kind: SinkKind::Console,
        }];
        let dispatcher =
            create_dispatcher(&configs, DsvFormatter::with_iana(FormatConfig::default())).unwrap();
        assert_eq!(dispatcher.sink_count(), 1);
        dispatcher.shutdown().unwrap();
    }

    #[test]
    fn test_create_dispatcher_reports_failing_sink() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        let configs = vec![
            SinkConfig {
                name: "screen".to_string(),
                kind: SinkKind::Console,
            },
            SinkConfig {
                name: "archive".to_string(),
                kind: SinkKind::File(FileSinkConfig {
                    path_pattern: format!("{}/%Y/", blocker.display()),
                    prefix: String::new(),
                    window_size: 60,
                    window_align: true,
                    compression: Compression::None,
                    rotation_tick_ms: 1000,
                }),
            },
        ];
        let err = create_dispatcher(&configs, DsvFormatter::with_iana(FormatConfig::default()))
            .err()
            .unwrap();
        assert!(matches!(err, DispatcherError::SinkCreation { ref name, .. } if name == "archive"));
    }
}
