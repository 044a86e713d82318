//! `run` command implementation.

use anyhow::{Context, Result};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// How long to wait for the delivery loop after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        delimiter = ?blueprint.format.delimiter,
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    let pipeline_config = PipelineConfig {
        blueprint,
        input: args.input.clone(),
        keep_going: args.keep_going,
        max_records: (args.max_records != 0).then_some(args.max_records),
        flush_every: (args.flush_every != 0).then_some(args.flush_every),
    };

    let pipeline = Pipeline::new(pipeline_config);
    let stop = pipeline.stop_handle();

    // Sinks do blocking I/O; keep them off the async workers
    let mut task = tokio::task::spawn_blocking(move || pipeline.run());

    info!("Starting delivery...");

    let result = tokio::select! {
        joined = &mut task => joined.context("Delivery task panicked")?,
        signal = shutdown_signal() => {
            signal?;
            warn!("Received shutdown signal, stopping delivery...");
            stop.store(true, Ordering::Release);
            match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                Ok(joined) => joined.context("Delivery task panicked")?,
                Err(_) => {
                    // Most likely blocked reading stdin
                    warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "Delivery did not stop in time");
                    return Ok(());
                }
            }
        }
    };

    let stats = result.context("Delivery failed")?;
    info!(
        records = stats.delivery.total_records,
        duration_secs = stats.duration.as_secs_f64(),
        rate = format!("{:.2}", stats.records_per_sec()),
        "Delivery completed"
    );
    stats.print_summary();

    info!("DSV fan-out finished");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to install Ctrl+C handler")
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<(), anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        result = ctrl_c => result,
        result = terminate => result,
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::OutputsBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Format:");
    println!("  Delimiter: {:?}", blueprint.format.delimiter);
    println!("  Timestamps: {:?}", blueprint.format.timestamp);

    println!("\nSinks ({}):", blueprint.sinks.len());
    for sink in &blueprint.sinks {
        println!("  - {} ({:?})", sink.name, sink.sink_type());
    }
    println!();
}
