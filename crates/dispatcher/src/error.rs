//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// A sink reported a fatal outcome; delivery of the record was aborted
    #[error("sink '{name}' failed fatally: {source}")]
    SinkFatal {
        name: String,
        #[source]
        source: contracts::ContractError,
    },

    /// Sink error (from contract)
    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a fatal sink outcome
    pub fn sink_fatal(name: impl Into<String>, source: contracts::ContractError) -> Self {
        Self::SinkFatal {
            name: name.into(),
            source,
        }
    }

    /// Whether this error is a fatal outcome of an individual sink
    pub fn is_sink_fatal(&self) -> bool {
        matches!(self, Self::SinkFatal { .. })
    }
}
