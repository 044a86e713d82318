//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// DSV Fan-out - formats flow records and delivers them to every configured sink
#[derive(Parser, Debug)]
#[command(
    name = "dsv-fanout",
    author,
    version,
    about = "Fan out DSV-formatted flow records to console, files and TCP/UDP peers",
    long_about = "Reads decoded flow records (JSON lines), formats each one as a delimiter-\n\
                  separated line and delivers it to the configured sinks: console, rotating\n\
                  files, a TCP fan-out server and a reconnecting TCP/UDP sender."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "DSV_FANOUT_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "DSV_FANOUT_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deliver records to the configured sinks
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "outputs.toml",
        env = "DSV_FANOUT_CONFIG"
    )]
    pub config: PathBuf,

    /// JSON-lines file of flow records ("-" or absent = stdin)
    #[arg(short, long, env = "DSV_FANOUT_INPUT")]
    pub input: Option<PathBuf>,

    /// Keep delivering after a sink reports a fatal error
    #[arg(long)]
    pub keep_going: bool,

    /// Maximum number of records to deliver (0 = unlimited)
    #[arg(long, default_value = "0", env = "DSV_FANOUT_MAX_RECORDS")]
    pub max_records: u64,

    /// Flush all sinks after this many records (0 = only at the end)
    #[arg(long, default_value = "0")]
    pub flush_every: u64,

    /// Validate configuration and exit without delivering
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "DSV_FANOUT_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "outputs.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "outputs.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the field dictionary used for formatting
    #[arg(long)]
    pub fields: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
