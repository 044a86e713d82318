//! # Dispatcher
//!
//! Fan-out of formatted flow records.
//!
//! Responsible for:
//! - formatting every record once
//! - handing the shared bytes to each registered sink in order
//! - owning the sinks' background threads (rotation, compression, accept)

pub mod clock;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use clock::{Clock, ManualClock, SystemClock};
pub use contracts::{DataSink, Delivery, FormattedRecord};
pub use dispatcher::{create_dispatcher, DispatchReport, Dispatcher};
pub use error::DispatcherError;
pub use handle::{StopSignal, WorkerHandle};
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{ConsoleSink, FileSink, FileSinkStats, NetworkSink, ServerSink, Sink};
