//! LogSink - logs every record via tracing

use std::sync::Arc;

use contracts::{ContractError, RecordSink, SinkOptions};
use serde_json::Value;
use tracing::{debug, info};

use crate::metrics::SinkMetrics;

/// Sink that logs records for debugging
pub struct LogSink {
    name: String,
    metrics: Arc<SinkMetrics>,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            metrics: Arc::new(SinkMetrics::new(name.clone())),
            name,
        }
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }
}

impl RecordSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, _options: &SinkOptions) -> Result<(), ContractError> {
        Ok(())
    }

    fn produce(&self, table: &str, key: &str, value: &Value) {
        self.metrics.inc_produced();
        debug!(sink = %self.name, table, key, value = %value, "Record");
        self.metrics.inc_delivered();
    }

    fn stop(&self) {
        info!(sink = %self.name, records = self.metrics.delivered(), "LogSink stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_log_sink_counts() {
        let mut sink = LogSink::new("my_logger");
        sink.initialize(&SinkOptions::default()).unwrap();
        sink.produce("t", "k", &json!({"x": 1}));
        sink.produce("t", "k2", &json!({"x": 2}));
        assert_eq!(sink.name(), "my_logger");
        assert_eq!(sink.metrics().delivered(), 2);
    }
}
