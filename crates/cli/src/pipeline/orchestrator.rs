//! Pipeline orchestrator - coordinates all components.
//!
//! Wiring order: sinks are initialized and started, the dispatcher attaches
//! to the hub, and the event log is replayed on a blocking thread standing
//! in for the node's callback thread. Shutdown detaches, stops every sink,
//! then quits the node.

use std::future::Future;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use contracts::{ChainNode, PipelineBlueprint};
use dispatcher::{DispatcherBuilder, SinkRegistry, StreamHub};
use extractors::ExtractorRegistry;
use tracing::{debug, info, instrument, warn};

use super::{replay, PipelineStats, ReplayNode};
use crate::error::{CliError, Result};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Loaded and validated configuration
    pub blueprint: PipelineBlueprint,

    /// JSONL event log to replay
    pub events: PathBuf,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the log ends, the stop height is reached, or `shutdown` resolves
    #[instrument(name = "pipeline_run", skip_all, fields(events = %self.config.events.display()))]
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let PipelineConfig { blueprint, events } = self.config;

        let log = std::fs::File::open(&events)
            .map_err(|_| CliError::events_not_found(events.display().to_string()))?;

        // Sinks: every registered sink is initialized, selected or not
        let mut registry = SinkRegistry::builtin();
        for (name, options) in registry.configure_all() {
            let keys: Vec<&str> = options.iter().map(|o| o.key).collect();
            debug!(sink = %name, options = ?keys, "Sink options");
        }
        registry.initialize_all(&blueprint.sinks)?;
        let sinks = registry.freeze();
        sinks.startup_all()?;

        let node = Arc::new(ReplayNode::new());
        let dispatcher = DispatcherBuilder::new(
            blueprint.pipeline.clone(),
            ExtractorRegistry::builtin(),
            sinks.clone(),
            node.clone(),
        )
        .build();
        let hub = StreamHub::new();
        dispatcher.attach(&hub);

        info!(
            start = blueprint.pipeline.start_block_num,
            stop = ?blueprint.pipeline.stop_block_num,
            "Replaying event log"
        );

        let replay_hub = hub.clone();
        let replay_node = Arc::clone(&node);
        let mut replay_task = tokio::task::spawn_blocking(move || {
            replay(BufReader::new(log), &replay_hub, &replay_node)
        });

        let joined = tokio::select! {
            joined = &mut replay_task => joined,
            _ = shutdown => {
                warn!("Received shutdown signal, stopping pipeline...");
                node.quit();
                replay_task.await
            }
        };
        let summary = joined.map_err(|e| CliError::shutdown(e.to_string()))??;

        // Shutdown: the stop height path has already stopped the sinks
        info!("Shutting down pipeline...");
        dispatcher.detach();
        if !dispatcher.is_stopped() {
            let stopping = sinks.clone();
            tokio::task::spawn_blocking(move || stopping.stop_all())
                .await
                .map_err(|e| CliError::shutdown(e.to_string()))?;
        }
        node.quit();

        let stats = PipelineStats {
            replay: summary,
            dispatch: dispatcher.stats().snapshot(),
            last_irreversible: dispatcher.current_block_num(),
            reached_stop: dispatcher.is_stopped(),
            duration: start_time.elapsed(),
            extractors: blueprint.pipeline.extractors.len(),
            sinks: blueprint.pipeline.sinks.len(),
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            records = stats.dispatch.records,
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}
