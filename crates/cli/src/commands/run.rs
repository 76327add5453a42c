//! `run` command implementation.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(start) = args.start_block_num {
        info!(start, "Overriding start height from CLI");
        blueprint.pipeline.start_block_num = start;
    }
    if let Some(stop) = args.stop_block_num {
        info!(stop, "Overriding stop height from CLI");
        blueprint.pipeline.stop_block_num = Some(stop);
    }
    for warning in config_loader::warnings(&blueprint) {
        warn!("{warning}");
    }

    info!(
        start = blueprint.pipeline.start_block_num,
        stop = ?blueprint.pipeline.stop_block_num,
        extractors = blueprint.pipeline.extractors.len(),
        sinks = blueprint.pipeline.sinks.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        events: args.events.clone(),
    });

    info!("Starting pipeline...");
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        events = stats.dispatch.received,
        records = stats.dispatch.records,
        duration_secs = stats.duration.as_secs_f64(),
        events_per_sec = format!("{:.2}", stats.events_per_sec()),
        "Pipeline completed"
    );
    stats.print_summary();

    info!("chain-cdc finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::PipelineBlueprint) {
    let pipeline = &blueprint.pipeline;
    println!("\n=== Configuration Summary ===\n");
    println!("Pipeline:");
    println!("  Start height: {}", pipeline.start_block_num);
    match pipeline.stop_block_num {
        Some(stop) => println!("  Stop height: {stop}"),
        None => println!("  Stop height: none"),
    }
    println!("  Table prefix: {}", pipeline.prefix);

    println!("\nStreams:");
    for stream in contracts::EventStream::ALL {
        let state = if pipeline.streams.is_enabled(stream) {
            "on"
        } else {
            "off"
        };
        println!("  - {stream}: {state}");
    }

    println!("\nExtractors ({}):", pipeline.extractors.len());
    for name in &pipeline.extractors {
        println!("  - {} -> {}", name, dispatcher::table_name(&pipeline.prefix, name));
    }

    println!("\nSinks ({}):", pipeline.sinks.len());
    for name in &pipeline.sinks {
        println!("  - {name}");
    }

    println!();
}
