//! Name → sink table with whole-registry lifecycle

use std::collections::BTreeMap;
use std::sync::Arc;

use contracts::{RecordSink, SinkOption, SinkOptions};
use tracing::{error, info, instrument};

use crate::error::DispatcherError;
use crate::sinks::{FileSink, HbaseSink, HttpSink, KafkaSink, LogSink};

/// Sinks indexed by name
///
/// Lifecycle hooks run for every registered sink, selected or not.
/// `initialize` needs exclusive access, so sinks are only shared (via
/// [`SinkRegistry::freeze`]) once it has run.
#[derive(Default)]
pub struct SinkRegistry {
    entries: BTreeMap<String, Box<dyn RecordSink>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// file, http, kafka, hbase and log
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(FileSink::new("file"));
        registry.register(HttpSink::new("http"));
        registry.register(KafkaSink::new("kafka"));
        registry.register(HbaseSink::new("hbase"));
        registry.register(LogSink::new("log"));
        registry
    }

    /// Add or replace a sink under its own name
    pub fn register(&mut self, sink: impl RecordSink + 'static) -> &mut Self {
        self.entries.insert(sink.name().to_string(), Box::new(sink));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Option descriptions of every sink
    pub fn configure_all(&self) -> Vec<(String, Vec<SinkOption>)> {
        self.entries
            .iter()
            .map(|(name, sink)| (name.clone(), sink.configure()))
            .collect()
    }

    /// Initialize every sink; the first failure aborts
    #[instrument(name = "sink_registry_initialize", skip_all, fields(sinks = self.entries.len()))]
    pub fn initialize_all(&mut self, options: &SinkOptions) -> Result<(), DispatcherError> {
        for (name, sink) in &mut self.entries {
            sink.initialize(options)
                .map_err(|e| DispatcherError::sink_lifecycle(name, "initialize", e.to_string()))?;
        }
        Ok(())
    }

    /// Freeze into a shared, read-only table
    pub fn freeze(self) -> SharedSinks {
        SharedSinks {
            entries: self
                .entries
                .into_iter()
                .map(|(name, sink)| (name, Arc::from(sink)))
                .collect(),
        }
    }
}

/// Initialized sinks shared between the dispatcher and the host
#[derive(Clone, Default)]
pub struct SharedSinks {
    entries: BTreeMap<String, Arc<dyn RecordSink>>,
}

impl SharedSinks {
    pub fn find(&self, name: &str) -> Option<Arc<dyn RecordSink>> {
        self.entries.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Start every sink; the first failure aborts
    #[instrument(name = "sink_registry_startup", skip_all)]
    pub fn startup_all(&self) -> Result<(), DispatcherError> {
        for (name, sink) in &self.entries {
            sink.startup()
                .map_err(|e| DispatcherError::sink_lifecycle(name, "start", e.to_string()))?;
        }
        info!(sinks = self.entries.len(), "Sinks started");
        Ok(())
    }

    /// Stop every sink, draining in-flight work
    #[instrument(name = "sink_registry_stop", skip_all)]
    pub fn stop_all(&self) {
        for (name, sink) in &self.entries {
            let sink = Arc::clone(sink);
            if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| sink.stop())).is_err() {
                error!(sink = %name, "Sink panicked while stopping");
            }
        }
        info!(sinks = self.entries.len(), "Sinks stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ContractError;
    use serde_json::Value;
    use std::sync::Mutex;

    struct Traced {
        name: &'static str,
        calls: Arc<Mutex<Vec<String>>>,
        fail_init: bool,
    }

    impl RecordSink for Traced {
        fn name(&self) -> &str {
            self.name
        }

        fn configure(&self) -> Vec<SinkOption> {
            self.calls.lock().unwrap().push(format!("{}:configure", self.name));
            Vec::new()
        }

        fn initialize(&mut self, _options: &SinkOptions) -> Result<(), ContractError> {
            self.calls.lock().unwrap().push(format!("{}:initialize", self.name));
            if self.fail_init {
                return Err(ContractError::sink_init(self.name, "boom"));
            }
            Ok(())
        }

        fn startup(&self) -> Result<(), ContractError> {
            self.calls.lock().unwrap().push(format!("{}:startup", self.name));
            Ok(())
        }

        fn produce(&self, _table: &str, _key: &str, _value: &Value) {}

        fn stop(&self) {
            self.calls.lock().unwrap().push(format!("{}:stop", self.name));
        }
    }

    #[test]
    fn test_builtin_names() {
        let registry = SinkRegistry::builtin();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["file", "hbase", "http", "kafka", "log"]
        );
        let options = registry.configure_all();
        let http = options.iter().find(|(name, _)| name == "http").unwrap();
        assert!(http.1.iter().any(|o| o.key == "max_retries"));
    }

    #[test]
    fn test_lifecycle_reaches_every_sink() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = SinkRegistry::new();
        for name in ["a", "b"] {
            registry.register(Traced {
                name,
                calls: Arc::clone(&calls),
                fail_init: false,
            });
        }
        assert_eq!(registry.configure_all().len(), 2);
        registry.initialize_all(&SinkOptions::default()).unwrap();
        let shared = registry.freeze();
        shared.startup_all().unwrap();
        shared.stop_all();

        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "a:configure", "b:configure", "a:initialize", "b:initialize", "a:startup",
                "b:startup", "a:stop", "b:stop"
            ]
        );
    }

    #[test]
    fn test_initialize_failure_names_sink() {
        let mut registry = SinkRegistry::new();
        registry.register(Traced {
            name: "bad",
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_init: true,
        });
        let err = registry.initialize_all(&SinkOptions::default()).unwrap_err();
        assert!(err.to_string().contains("'bad'"));
    }
}
