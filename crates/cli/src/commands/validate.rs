//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{OutputsBlueprint, SinkKind, TransportProtocol};
use dispatcher::sinks::MIN_WINDOW_SIZE;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    delimiter: char,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    delimiter: blueprint.format.delimiter,
                    sink_count: blueprint.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &OutputsBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    for sink in &blueprint.sinks {
        match &sink.kind {
            SinkKind::File(file) if file.window_size != 0 && file.window_size < MIN_WINDOW_SIZE => {
                warnings.push(format!(
                    "Sink '{}': window_size {}s will be raised to {}s",
                    sink.name, file.window_size, MIN_WINDOW_SIZE
                ));
            }
            SinkKind::File(file) if file.window_size == 0 => {
                warnings.push(format!(
                    "Sink '{}': window_size 0 disables rotation",
                    sink.name
                ));
            }
            SinkKind::Server(server) if server.blocking => {
                warnings.push(format!(
                    "Sink '{}': blocking server sockets can stall delivery on slow clients",
                    sink.name
                ));
            }
            SinkKind::Network(network)
                if network.protocol == TransportProtocol::Tcp
                    && network.reconnect_interval_secs == 0 =>
            {
                warnings.push(format!(
                    "Sink '{}': reconnect_interval_secs 0 retries on every record",
                    sink.name
                ));
            }
            _ => {}
        }
    }

    if blueprint.format.ignore_unknown {
        warnings.push("format.ignore_unknown drops elements missing from the dictionary".into());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("OK Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Delimiter: {:?}", summary.delimiter);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\nWarnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("FAIL Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_config_with_warnings() {
        let file = write_config(
            r#"
[[sinks]]
name = "archive"
sink_type = "file"
path_pattern = "/tmp/flows/"
window_size = 30
"#,
        );
        let result = validate_config(&ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        });
        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert!(warnings[0].contains("raised to 60s"), "got: {warnings:?}");
    }

    #[test]
    fn test_missing_file() {
        let result = validate_config(&ValidateArgs {
            config: "/nonexistent/outputs.toml".into(),
            json: true,
        });
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }
}
