//! DataSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for Sinks.

use crate::{ContractError, FormattedRecord};

/// Non-fatal result of handing one record to a sink.
///
/// A fatal outcome is reported through the `Err` side of [`DataSink::deliver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The record reached the sink's backing store (or at least one peer)
    Delivered,
    /// The record was dropped by the sink's own policy (slow peer, link down)
    Skipped,
}

/// Data output trait
///
/// All sink implementations must implement this trait. Calls come from a single
/// delivery thread; implementations must never block it indefinitely.
pub trait DataSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one formatted record
    ///
    /// # Errors
    /// Returns an error only when the sink cannot continue to accept records
    /// (e.g. no file window could be opened). Transient problems are `Skipped`.
    fn deliver(&mut self, record: &FormattedRecord) -> Result<Delivery, ContractError>;

    /// Flush buffered data (best effort)
    fn flush(&mut self);

    /// Close sink, stopping any background threads it owns
    fn close(&mut self) -> Result<(), ContractError>;
}
