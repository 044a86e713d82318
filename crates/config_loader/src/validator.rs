//! Configuration validation
//!
//! Rules:
//! - at least one sink
//! - sink names non-empty and unique
//! - delimiter is not a line break or quote
//! - file path template non-empty with valid strftime items, prefix without separators
//! - server and network ports non-zero

use std::collections::HashSet;

use chrono::format::{Item, StrftimeItems};
use contracts::{
    ContractError, FileSinkConfig, FormatConfig, NetworkSinkConfig, OutputsBlueprint,
    ServerSinkConfig, SinkKind,
};

/// Validate an OutputsBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &OutputsBlueprint) -> Result<(), ContractError> {
    validate_format(&blueprint.format)?;
    validate_sink_names(blueprint)?;
    for sink in &blueprint.sinks {
        let field = format!("sinks[{}]", sink.name);
        match &sink.kind {
            SinkKind::Console => {}
            SinkKind::File(file) => validate_file_sink(&field, file)?,
            SinkKind::Server(server) => validate_server_sink(&field, server)?,
            SinkKind::Network(network) => validate_network_sink(&field, network)?,
        }
    }
    Ok(())
}

fn validate_format(format: &FormatConfig) -> Result<(), ContractError> {
    if matches!(format.delimiter, '\n' | '\r' | '"') {
        return Err(ContractError::config_validation(
            "format.delimiter",
            format!("{:?} cannot be used as delimiter", format.delimiter),
        ));
    }
    Ok(())
}

/// Sink names identify sinks in logs and metrics
fn validate_sink_names(blueprint: &OutputsBlueprint) -> Result<(), ContractError> {
    if blueprint.sinks.is_empty() {
        return Err(ContractError::config_validation(
            "sinks",
            "at least one sink is required",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                format!("duplicate sink name '{}'", sink.name),
            ));
        }
    }
    Ok(())
}

fn validate_file_sink(field: &str, config: &FileSinkConfig) -> Result<(), ContractError> {
    if config.path_pattern.is_empty() {
        return Err(ContractError::config_validation(
            format!("{field}.path_pattern"),
            "path pattern cannot be empty",
        ));
    }

    if StrftimeItems::new(&config.path_pattern).any(|item| matches!(item, Item::Error)) {
        return Err(ContractError::config_validation(
            format!("{field}.path_pattern"),
            format!("invalid time placeholder in '{}'", config.path_pattern),
        ));
    }

    if config.prefix.contains(['/', '\\']) {
        return Err(ContractError::config_validation(
            format!("{field}.prefix"),
            "prefix cannot contain path separators",
        ));
    }

    if config.rotation_tick_ms == 0 {
        return Err(ContractError::config_validation(
            format!("{field}.rotation_tick_ms"),
            "rotation_tick_ms must be > 0",
        ));
    }
    Ok(())
}

fn validate_server_sink(field: &str, config: &ServerSinkConfig) -> Result<(), ContractError> {
    if config.port == 0 {
        return Err(ContractError::config_validation(
            format!("{field}.port"),
            "port must be non-zero",
        ));
    }
    Ok(())
}

fn validate_network_sink(field: &str, config: &NetworkSinkConfig) -> Result<(), ContractError> {
    if config.port == 0 {
        return Err(ContractError::config_validation(
            format!("{field}.port"),
            "port must be non-zero",
        ));
    }
    if config.connect_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            format!("{field}.connect_timeout_ms"),
            "connect_timeout_ms must be > 0",
        ));
    }
    Ok(())
}
