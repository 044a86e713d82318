//! OutputsBlueprint - Config Loader output
//!
//! Complete configuration of the formatter and the egress sinks.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputsBlueprint {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Record formatting options
    #[serde(default)]
    pub format: FormatConfig,

    /// Sink list, in delivery order
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// Config version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    #[serde(rename = "1")]
    V1,
}

/// Timestamp rendering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    /// ISO-8601 UTC with milliseconds
    #[default]
    Iso,
    /// Milliseconds since the Unix epoch
    Unix,
}

/// DSV formatting options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatConfig {
    /// Field delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Timestamp rendering
    #[serde(default)]
    pub timestamp: TimestampFormat,

    /// Render protocol numbers as names
    #[serde(default = "default_true")]
    pub proto: bool,

    /// Render TCP control bits as a flag string
    #[serde(default = "default_true")]
    pub tcp_flags: bool,

    /// Skip elements missing from the field dictionary
    #[serde(default)]
    pub ignore_unknown: bool,

    /// Escape whitespace inside string values
    #[serde(default = "default_true")]
    pub white_spaces: bool,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            timestamp: TimestampFormat::default(),
            proto: true,
            tcp_flags: true,
            ignore_unknown: false,
            white_spaces: true,
        }
    }
}

fn default_delimiter() -> char {
    ','
}

fn default_true() -> bool {
    true
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name
    pub name: String,

    /// Sink type and type specific parameters
    #[serde(flatten)]
    pub kind: SinkKind,
}

impl SinkConfig {
    /// Sink type without parameters
    pub fn sink_type(&self) -> SinkType {
        match self.kind {
            SinkKind::Console => SinkType::Console,
            SinkKind::File(_) => SinkType::File,
            SinkKind::Server(_) => SinkType::Server,
            SinkKind::Network(_) => SinkType::Network,
        }
    }
}

/// Sink type with its parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "sink_type", rename_all = "snake_case")]
pub enum SinkKind {
    /// Standard output
    Console,
    /// Time-windowed rotating file
    File(FileSinkConfig),
    /// TCP server streaming to connected clients
    Server(ServerSinkConfig),
    /// Single outbound TCP/UDP destination
    Network(NetworkSinkConfig),
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    Console,
    File,
    Server,
    Network,
}

/// Compression applied to closed file windows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

/// File sink parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSinkConfig {
    /// Directory template, strftime placeholders (e.g. "/data/%Y/%m/%d/")
    pub path_pattern: String,

    /// File name prefix
    #[serde(default)]
    pub prefix: String,

    /// Window size in seconds (0 = never rotate)
    #[serde(default = "default_window_size")]
    pub window_size: u64,

    /// Align windows to multiples of the window size
    #[serde(default = "default_true")]
    pub window_align: bool,

    /// Compression of closed windows
    #[serde(default)]
    pub compression: Compression,

    /// Rotation thread wake-up period in milliseconds
    #[serde(default = "default_rotation_tick_ms")]
    pub rotation_tick_ms: u64,
}

fn default_window_size() -> u64 {
    300
}

fn default_rotation_tick_ms() -> u64 {
    1000
}

/// Server sink parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSinkConfig {
    /// Listening port (all local IPv4 addresses)
    pub port: u16,

    /// Blocking writes to clients
    #[serde(default)]
    pub blocking: bool,
}

/// Transport protocol of the network sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportProtocol {
    #[default]
    Tcp,
    Udp,
}

/// Network sink parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSinkConfig {
    /// Destination address (literal IPv4/IPv6)
    pub addr: IpAddr,

    /// Destination port
    pub port: u16,

    /// Transport protocol
    #[serde(default)]
    pub protocol: TransportProtocol,

    /// Blocking writes (TCP only)
    #[serde(default)]
    pub blocking: bool,

    /// Minimum time between reconnect attempts, in seconds
    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,

    /// Connect timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_reconnect_interval_secs() -> u64 {
    5
}

fn default_connect_timeout_ms() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_kind_tagging() {
        let json = r#"[
            {"name": "screen", "sink_type": "console"},
            {"name": "live", "sink_type": "server", "port": 4739},
            {"name": "out", "sink_type": "network", "addr": "::1", "port": 9000, "protocol": "udp"}
        ]"#;
        let sinks: Vec<SinkConfig> = serde_json::from_str(json).unwrap();

        assert_eq!(sinks[0].sink_type(), SinkType::Console);
        assert_eq!(sinks[1].sink_type(), SinkType::Server);
        match &sinks[2].kind {
            SinkKind::Network(cfg) => {
                assert_eq!(cfg.protocol, TransportProtocol::Udp);
                assert!(cfg.addr.is_ipv6());
                assert_eq!(cfg.reconnect_interval_secs, 5);
                assert!(!cfg.blocking);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn test_file_defaults() {
        let json = r#"{"name": "f", "sink_type": "file", "path_pattern": "/tmp/%Y/"}"#;
        let sink: SinkConfig = serde_json::from_str(json).unwrap();
        let SinkKind::File(cfg) = sink.kind else {
            panic!("expected file sink");
        };
        assert_eq!(cfg.window_size, 300);
        assert!(cfg.window_align);
        assert_eq!(cfg.compression, Compression::None);
        assert_eq!(cfg.rotation_tick_ms, 1000);
    }

    #[test]
    fn test_format_defaults() {
        let format = FormatConfig::default();
        assert_eq!(format.delimiter, ',');
        assert_eq!(format.timestamp, TimestampFormat::Iso);
        assert!(format.proto);
        assert!(!format.ignore_unknown);
    }
}
