//! Sink implementations
//!
//! Contains ConsoleSink, FileSink, ServerSink and NetworkSink, and the closed
//! `Sink` enum the dispatcher holds them in.

mod compress;
mod console;
mod file;
mod network;
mod outbound;
mod server;
mod window;

pub use self::compress::{compressed_path, GZIP_SUFFIX};
pub use self::console::ConsoleSink;
pub use self::file::{FileSink, FileSinkStats};
pub use self::network::NetworkSink;
pub use self::server::ServerSink;
pub use self::window::{window_path, WindowPolicy, MIN_WINDOW_SIZE};

use contracts::{ContractError, DataSink, Delivery, FormattedRecord, SinkConfig, SinkKind};
use tracing::instrument;

/// One configured output
pub enum Sink {
    Console(ConsoleSink),
    File(FileSink),
    Server(ServerSink),
    Network(NetworkSink),
}

impl Sink {
    /// Build a sink from its configuration
    #[instrument(
        name = "sink_build",
        skip(config),
        fields(sink = %config.name, sink_type = ?config.sink_type())
    )]
    pub fn build(config: &SinkConfig) -> Result<Self, ContractError> {
        let name = config.name.as_str();
        let sink = match &config.kind {
            SinkKind::Console => Sink::Console(ConsoleSink::new(name)),
            SinkKind::File(file) => Sink::File(FileSink::new(name, file)?),
            SinkKind::Server(server) => Sink::Server(ServerSink::new(name, server)?),
            SinkKind::Network(network) => Sink::Network(NetworkSink::new(name, network)?),
        };
        Ok(sink)
    }

    fn inner(&self) -> &dyn DataSink {
        match self {
            Sink::Console(s) => s,
            Sink::File(s) => s,
            Sink::Server(s) => s,
            Sink::Network(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn DataSink {
        match self {
            Sink::Console(s) => s,
            Sink::File(s) => s,
            Sink::Server(s) => s,
            Sink::Network(s) => s,
        }
    }
}

impl DataSink for Sink {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn deliver(&mut self, record: &FormattedRecord) -> Result<Delivery, ContractError> {
        self.inner_mut().deliver(record)
    }

    fn flush(&mut self) {
        self.inner_mut().flush()
    }

    fn close(&mut self) -> Result<(), ContractError> {
        self.inner_mut().close()
    }
}

impl From<ConsoleSink> for Sink {
    fn from(sink: ConsoleSink) -> Self {
        Sink::Console(sink)
    }
}

impl From<FileSink> for Sink {
    fn from(sink: FileSink) -> Self {
        Sink::File(sink)
    }
}

impl From<ServerSink> for Sink {
    fn from(sink: ServerSink) -> Self {
        Sink::Server(sink)
    }
}

impl From<NetworkSink> for Sink {
    fn from(sink: NetworkSink) -> Self {
        Sink::Network(sink)
    }
}
