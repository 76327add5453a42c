//! In-process counters for sinks and the dispatcher

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use observability::{record_delivery, DeliveryOutcome, RunningStats, StatsSummary};

/// Delivery counters for a single sink
///
/// Each increment is mirrored to the `metrics` facade under the sink's name.
#[derive(Debug)]
pub struct SinkMetrics {
    sink: String,
    /// Records handed to the sink
    produced: AtomicU64,
    /// Records confirmed by the destination
    delivered: AtomicU64,
    /// Failed attempts that were scheduled again
    retried: AtomicU64,
    /// Records given up on
    abandoned: AtomicU64,
}

impl SinkMetrics {
    pub fn new(sink: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            produced: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            retried: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
        }
    }

    pub fn inc_produced(&self) {
        self.produced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        record_delivery(&self.sink, DeliveryOutcome::Delivered);
    }

    pub fn inc_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
        record_delivery(&self.sink, DeliveryOutcome::Retried);
    }

    pub fn inc_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
        record_delivery(&self.sink, DeliveryOutcome::Abandoned);
    }

    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn retried(&self) -> u64 {
        self.retried.load(Ordering::Relaxed)
    }

    pub fn abandoned(&self) -> u64 {
        self.abandoned.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            produced: self.produced(),
            delivered: self.delivered(),
            retried: self.retried(),
            abandoned: self.abandoned(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub produced: u64,
    pub delivered: u64,
    pub retried: u64,
    pub abandoned: u64,
}

/// Dispatcher-wide counters
#[derive(Debug, Default)]
pub struct DispatchStats {
    received: AtomicU64,
    gated: AtomicU64,
    records: AtomicU64,
    failures: AtomicU64,
    latency_us: Mutex<RunningStats>,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_gated(&self) {
        self.gated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_records(&self, n: usize) {
        self.records.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn inc_failures(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn observe_latency_us(&self, micros: f64) {
        if let Ok(mut stats) = self.latency_us.lock() {
            stats.push(micros);
        }
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            received: self.received.load(Ordering::Relaxed),
            gated: self.gated.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            latency_us: self
                .latency_us
                .lock()
                .map(|stats| StatsSummary::from(&*stats))
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DispatchSnapshot {
    /// Events seen on enabled streams
    pub received: u64,
    /// Events discarded below the start height
    pub gated: u64,
    /// Records forwarded to sinks
    pub records: u64,
    /// Extraction failures
    pub failures: u64,
    /// Per-event processing time
    pub latency_us: StatsSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_snapshot() {
        let metrics = SinkMetrics::new("http");
        metrics.inc_produced();
        metrics.inc_retried();
        metrics.inc_retried();
        metrics.inc_abandoned();
        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                produced: 1,
                delivered: 0,
                retried: 2,
                abandoned: 1,
            }
        );
    }

    #[test]
    fn test_dispatch_latency() {
        let stats = DispatchStats::new();
        stats.observe_latency_us(10.0);
        stats.observe_latency_us(30.0);
        let snap = stats.snapshot();
        assert_eq!(snap.latency_us.count, 2);
        assert!((snap.latency_us.mean - 20.0).abs() < 1e-9);
    }
}
