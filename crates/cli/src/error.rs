//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// A record could not be read or decoded
    #[error("Invalid record on line {line}: {message}")]
    InvalidRecord { line: u64, message: String },

    /// A sink failed and delivery was stopped
    #[error("Delivery stopped after {records} records: {source}")]
    DeliveryAborted {
        records: u64,
        #[source]
        source: dispatcher::DispatcherError,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_record(line: u64, message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            line,
            message: message.into(),
        }
    }

    pub fn delivery_aborted(records: u64, source: dispatcher::DispatcherError) -> Self {
        Self::DeliveryAborted { records, source }
    }
}
