//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{OutputsBlueprint, SinkKind};
use formatter::{DsvFormatter, Semantic};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    format: FormatInfo,
    sinks: Vec<SinkInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldInfo>,
}

#[derive(Serialize)]
struct FormatInfo {
    delimiter: char,
    timestamp: String,
    proto: bool,
    tcp_flags: bool,
    ignore_unknown: bool,
    white_spaces: bool,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    target: String,
}

#[derive(Serialize)]
struct FieldInfo {
    id: u16,
    name: String,
    semantic: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

/// Where a sink sends its records, in one line
fn sink_target(kind: &SinkKind) -> String {
    match kind {
        SinkKind::Console => "stdout".to_string(),
        SinkKind::File(file) => format!(
            "{}{}<time> every {}s ({:?})",
            file.path_pattern, file.prefix, file.window_size, file.compression
        ),
        SinkKind::Server(server) => format!("0.0.0.0:{}", server.port),
        SinkKind::Network(network) => format!(
            "{:?} {}",
            network.protocol,
            std::net::SocketAddr::new(network.addr, network.port)
        ),
    }
}

fn build_config_info(blueprint: &OutputsBlueprint, args: &InfoArgs) -> ConfigInfo {
    let format = &blueprint.format;

    let sinks = blueprint
        .sinks
        .iter()
        .map(|s| SinkInfo {
            name: s.name.clone(),
            sink_type: format!("{:?}", s.sink_type()),
            target: sink_target(&s.kind),
        })
        .collect();

    let fields = if args.fields {
        let formatter = DsvFormatter::with_iana(format.clone());
        let fields: Vec<FieldInfo> = formatter
            .dictionary()
            .iter()
            .map(|(id, def)| FieldInfo {
                id,
                name: def.name.clone(),
                semantic: match def.semantic {
                    Semantic::Plain => "plain",
                    Semantic::Protocol => "protocol",
                    Semantic::TcpFlags => "tcp_flags",
                }
                .to_string(),
            })
            .collect();
        fields
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        format: FormatInfo {
            delimiter: format.delimiter,
            timestamp: format!("{:?}", format.timestamp),
            proto: format.proto,
            tcp_flags: format.tcp_flags,
            ignore_unknown: format.ignore_unknown,
            white_spaces: format.white_spaces,
        },
        sinks,
        fields,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("+--------------------------------------------------------------+");
    println!("|               DSV Fan-out Configuration                      |");
    println!("+--------------------------------------------------------------+\n");

    let format = &info.format;
    println!("Format");
    println!("   |- Version: {}", info.version);
    println!("   |- Delimiter: {:?}", format.delimiter);
    println!("   |- Timestamps: {}", format.timestamp);
    println!("   |- Protocol names: {}", format.proto);
    println!("   |- TCP flag strings: {}", format.tcp_flags);
    println!("   |- Ignore unknown: {}", format.ignore_unknown);
    println!("   `- Escape whitespace: {}", format.white_spaces);

    println!("\nSinks ({})", info.sinks.len());
    for (i, sink) in info.sinks.iter().enumerate() {
        let prefix = if i == info.sinks.len() - 1 { "`-" } else { "|-" };
        println!("   {} {} ({}) -> {}", prefix, sink.name, sink.sink_type, sink.target);
    }

    if !info.fields.is_empty() {
        println!("\nFields ({})", info.fields.len());
        for field in &info.fields {
            println!("   {:>5}  {:<28} {}", field.id, field.name, field.semantic);
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ConfigVersion, FormatConfig, ServerSinkConfig, SinkConfig};

    #[test]
    fn test_build_config_info() {
        let blueprint = OutputsBlueprint {
            version: ConfigVersion::V1,
            format: FormatConfig::default(),
            sinks: vec![SinkConfig {
                name: "live".into(),
                kind: SinkKind::Server(ServerSinkConfig {
                    port: 4739,
                    blocking: false,
                }),
            }],
        };
        let args = InfoArgs {
            config: "outputs.toml".into(),
            json: true,
            fields: true,
        };
        let info = build_config_info(&blueprint, &args);
        assert_eq!(info.sinks[0].target, "0.0.0.0:4739");
        assert!(info.fields.iter().any(|f| f.id == 6 && f.semantic == "tcp_flags"));
    }
}
