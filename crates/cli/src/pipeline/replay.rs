//! Event log replay - the node side of a local run
//!
//! Each line of the log is one `NodeEvent` as JSON. Lines are emitted
//! through the hub in order, on the calling thread, until the log ends or
//! the node is asked to quit.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};

use contracts::{ChainNode, NodeEvent};
use dispatcher::StreamHub;
use tracing::{debug, info, warn};

/// Host node backed by a recorded event log
#[derive(Debug, Default)]
pub struct ReplayNode {
    quit: AtomicBool,
}

impl ReplayNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_quit(&self) -> bool {
        self.quit.load(Ordering::Acquire)
    }
}

impl ChainNode for ReplayNode {
    fn quit(&self) {
        if !self.quit.swap(true, Ordering::AcqRel) {
            info!("Node quit requested");
        }
    }
}

/// Replay counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Lines read, blank lines excluded
    pub lines: u64,
    pub emitted: u64,
    /// Lines that did not decode as an event
    pub skipped: u64,
    /// Whether the log was read to its end
    pub exhausted: bool,
}

/// Feed `reader` through `hub` until EOF or quit
pub fn replay(reader: impl BufRead, hub: &StreamHub, node: &ReplayNode) -> std::io::Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();
    for (index, line) in reader.lines().enumerate() {
        if node.is_quit() {
            debug!(line = index + 1, "Replay interrupted");
            return Ok(summary);
        }
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        summary.lines += 1;

        match serde_json::from_str::<NodeEvent>(&line) {
            Ok(event) => {
                hub.emit(&event);
                summary.emitted += 1;
            }
            Err(e) => {
                summary.skipped += 1;
                warn!(line = index + 1, error = %e, "Skipping undecodable event");
            }
        }
    }
    summary.exhausted = !node.is_quit();
    Ok(summary)
}
