//! ConsoleSink - prints formatted records to standard output

use contracts::{ContractError, DataSink, Delivery, FormattedRecord};
use std::io::{self, Write};
use tracing::{debug, warn};

/// Sink that writes every record synchronously to stdout
pub struct ConsoleSink {
    name: String,
    out: Box<dyn Write + Send>,
}

impl ConsoleSink {
    /// Create a new ConsoleSink writing to stdout
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_writer(name, io::stdout())
    }

    /// Create a ConsoleSink writing to an arbitrary stream
    pub fn with_writer(name: impl Into<String>, out: impl Write + Send + 'static) -> Self {
        Self {
            name: name.into(),
            out: Box::new(out),
        }
    }
}

impl DataSink for ConsoleSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn deliver(&mut self, record: &FormattedRecord) -> Result<Delivery, ContractError> {
        match self.out.write_all(record) {
            Ok(()) => Ok(Delivery::Delivered),
            Err(e) => {
                // The console is always considered available
                debug!(sink = %self.name, error = %e, "Console write failed");
                Ok(Delivery::Skipped)
            }
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.out.flush() {
            warn!(sink = %self.name, error = %e, "Console flush failed");
        }
    }

    fn close(&mut self) -> Result<(), ContractError> {
        self.flush();
        debug!(sink = %self.name, "ConsoleSink closed");
        Ok(())
    }
}
