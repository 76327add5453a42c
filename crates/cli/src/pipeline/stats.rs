//! Pipeline statistics and metrics.

use std::time::Duration;

use dispatcher::DispatchSnapshot;

use super::ReplaySummary;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Event log counters
    pub replay: ReplaySummary,

    /// Dispatcher counters
    pub dispatch: DispatchSnapshot,

    /// Last irreversible height seen
    pub last_irreversible: u32,

    /// Whether the configured stop height was reached
    pub reached_stop: bool,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Number of selected extractors
    pub extractors: usize,

    /// Number of selected sinks
    pub sinks: usize,
}

impl PipelineStats {
    /// Events handled per second
    pub fn events_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.dispatch.received as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Share of received events discarded below the start height
    pub fn gated_rate(&self) -> f64 {
        if self.dispatch.received > 0 {
            (self.dispatch.gated as f64 / self.dispatch.received as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Events/s: {:.2}", self.events_per_sec());
        println!("   ├─ Extractors: {}", self.extractors);
        println!("   ├─ Sinks: {}", self.sinks);
        println!("   ├─ Last irreversible: {}", self.last_irreversible);
        println!("   └─ Stop height reached: {}", self.reached_stop);

        println!("\n📜 Event Log");
        println!("   ├─ Lines: {}", self.replay.lines);
        println!("   ├─ Emitted: {}", self.replay.emitted);
        println!("   ├─ Skipped: {}", self.replay.skipped);
        println!("   └─ Read to end: {}", self.replay.exhausted);

        println!("\n📈 Dispatcher");
        println!("   ├─ Received: {}", self.dispatch.received);
        println!(
            "   ├─ Gated: {} ({:.2}%)",
            self.dispatch.gated,
            self.gated_rate()
        );
        println!("   ├─ Records: {}", self.dispatch.records);
        println!("   ├─ Extraction failures: {}", self.dispatch.failures);
        println!("   └─ Latency (us): {}", self.dispatch.latency_us);

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let mut stats = PipelineStats::default();
        assert_eq!(stats.events_per_sec(), 0.0);
        assert_eq!(stats.gated_rate(), 0.0);

        stats.duration = Duration::from_secs(2);
        stats.dispatch.received = 10;
        stats.dispatch.gated = 5;
        assert_eq!(stats.events_per_sec(), 5.0);
        assert_eq!(stats.gated_rate(), 50.0);
    }
}
