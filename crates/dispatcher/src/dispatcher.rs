//! Dispatcher - block-height gate and extractor × sink fan-out
//!
//! Runs synchronously on the node's callback thread. For every event on an
//! enabled stream it applies the start-height gate, resolves the structured
//! view once, runs each selected extractor and hands each record to each
//! selected sink. Failures are contained per extractor and per sink.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use contracts::{
    ChainNode, ChainObserver, ContractError, EventRef, EventStream, Extractor, PipelineConfig,
    RecordSink,
};
use extractors::ExtractorRegistry;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::hub::{StreamHub, Subscription};
use crate::metrics::DispatchStats;
use crate::registry::SharedSinks;
use crate::table::table_name;

struct SelectedExtractor {
    name: String,
    table: String,
    extractor: Arc<dyn Extractor>,
}

struct SelectedSink {
    name: String,
    sink: Arc<dyn RecordSink>,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: PipelineConfig,
    extractors: ExtractorRegistry,
    sinks: SharedSinks,
    node: Arc<dyn ChainNode>,
}

impl DispatcherBuilder {
    pub fn new(
        config: PipelineConfig,
        extractors: ExtractorRegistry,
        sinks: SharedSinks,
        node: Arc<dyn ChainNode>,
    ) -> Self {
        Self {
            config,
            extractors,
            sinks,
            node,
        }
    }

    /// Resolve selections and derive table names
    ///
    /// Unknown extractor or sink names are warned about here, once, and
    /// left out of the fan-out.
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(extractors = self.config.extractors.len(), sinks = self.config.sinks.len())
    )]
    pub fn build(self) -> Arc<Dispatcher> {
        let tables: BTreeMap<String, String> = self
            .extractors
            .names()
            .map(|name| (name.to_string(), table_name(&self.config.prefix, name)))
            .collect();

        let mut extractors = Vec::with_capacity(self.config.extractors.len());
        for name in &self.config.extractors {
            match (self.extractors.find(name), tables.get(name)) {
                (Some(extractor), Some(table)) => extractors.push(SelectedExtractor {
                    name: name.clone(),
                    table: table.clone(),
                    extractor,
                }),
                _ => warn!(extractor = %name, "Extractor not found, skipped"),
            }
        }

        let mut sinks = Vec::with_capacity(self.config.sinks.len());
        for name in &self.config.sinks {
            match self.sinks.find(name) {
                Some(sink) => sinks.push(SelectedSink {
                    name: name.clone(),
                    sink,
                }),
                None => warn!(sink = %name, "Sink not found, skipped"),
            }
        }

        info!(
            start = self.config.start_block_num,
            stop = ?self.config.stop_block_num,
            extractors = extractors.len(),
            sinks = sinks.len(),
            "Dispatcher ready"
        );

        Arc::new(Dispatcher {
            config: self.config,
            extractors,
            sinks,
            all_sinks: self.sinks,
            tables,
            node: self.node,
            current_block_num: AtomicU32::new(0),
            stopped: AtomicBool::new(false),
            subscriptions: Mutex::new(Vec::new()),
            stats: Arc::new(DispatchStats::new()),
        })
    }
}

/// Orchestration core; one per pipeline
pub struct Dispatcher {
    config: PipelineConfig,
    extractors: Vec<SelectedExtractor>,
    sinks: Vec<SelectedSink>,
    /// Every registered sink, stopped on shutdown
    all_sinks: SharedSinks,
    tables: BTreeMap<String, String>,
    node: Arc<dyn ChainNode>,
    /// Written only on the irreversible-block path
    current_block_num: AtomicU32,
    stopped: AtomicBool,
    subscriptions: Mutex<Vec<Subscription>>,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    /// Connect to every enabled stream of the hub
    pub fn attach(self: &Arc<Self>, hub: &StreamHub) {
        let observer: Arc<dyn ChainObserver> = Arc::clone(self) as Arc<dyn ChainObserver>;
        let mut subscriptions = match self.subscriptions.lock() {
            Ok(subs) => subs,
            Err(poisoned) => poisoned.into_inner(),
        };
        for stream in EventStream::ALL {
            if self.config.streams.is_enabled(stream) {
                subscriptions.push(hub.connect(stream, Arc::clone(&observer)));
            } else {
                debug!(stream = %stream, "Stream disabled");
            }
        }
    }

    /// Disconnect from every stream
    pub fn detach(&self) {
        let subscriptions = match self.subscriptions.lock() {
            Ok(mut subs) => std::mem::take(&mut *subs),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for subscription in subscriptions {
            subscription.disconnect();
        }
    }

    pub fn current_block_num(&self) -> u32 {
        self.current_block_num.load(Ordering::Acquire)
    }

    /// Whether the stop height has been reached
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.stats
    }

    /// Table name of a registered extractor
    pub fn table_name(&self, extractor: &str) -> Option<&str> {
        self.tables.get(extractor).map(String::as_str)
    }

    /// Process one event from `stream`
    pub fn handle(&self, stream: EventStream, event: EventRef<'_>) {
        if self.is_stopped() {
            return;
        }
        self.stats.inc_received();
        observability::record_event_received(stream.as_str());

        if stream == EventStream::IrreversibleBlock {
            if let Some(block_num) = event.block_num() {
                self.current_block_num.store(block_num, Ordering::Release);
                observability::record_irreversible_height(block_num);
            }
        }
        if self.current_block_num() < self.config.start_block_num {
            self.stats.inc_gated();
            observability::record_event_gated(stream.as_str());
            return;
        }

        let started = Instant::now();
        let irreversible = match stream {
            EventStream::AcceptedBlock => Some(false),
            EventStream::IrreversibleBlock => Some(true),
            _ => None,
        };
        match catch_unwind(AssertUnwindSafe(|| self.process(event, irreversible))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(stream = %stream, event_kind = event.kind(), error = %e, "Event dropped"),
            Err(_) => error!(stream = %stream, event_kind = event.kind(), "Panic while processing event"),
        }
        let micros = started.elapsed().as_secs_f64() * 1e6;
        self.stats.observe_latency_us(micros);
        observability::record_dispatch_latency_us(event.kind(), micros);

        if stream == EventStream::IrreversibleBlock {
            debug!(current_block_num = self.current_block_num(), "Irreversible block processed");
            self.check_stop();
        }
    }

    fn process(&self, event: EventRef<'_>, irreversible: Option<bool>) -> Result<(), ContractError> {
        let mut view = self.node.resolve(event)?;
        if let Some(flag) = irreversible {
            view.insert("irreversible".into(), Value::Bool(flag));
        }

        for selected in &self.extractors {
            let built = catch_unwind(AssertUnwindSafe(|| selected.extractor.build(event, &view)));
            let records = match built {
                Ok(Ok(records)) => records,
                Ok(Err(e)) => {
                    self.extraction_failed(selected, event, &e.to_string());
                    continue;
                }
                Err(_) => {
                    self.extraction_failed(selected, event, "panic");
                    continue;
                }
            };
            if records.is_empty() {
                continue;
            }
            self.stats.add_records(records.len());
            observability::record_records_built(&selected.table, records.len());

            for record in &records {
                for target in &self.sinks {
                    let produced = catch_unwind(AssertUnwindSafe(|| {
                        target.sink.produce(&selected.table, &record.key, &record.value)
                    }));
                    if produced.is_err() {
                        error!(
                            sink = %target.name,
                            table = %selected.table,
                            key = %record.key,
                            event_kind = event.kind(),
                            "Panic in sink produce"
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn extraction_failed(&self, selected: &SelectedExtractor, event: EventRef<'_>, error: &str) {
        self.stats.inc_failures();
        observability::record_extract_failure(&selected.name, event.kind());
        warn!(
            extractor = %selected.name,
            event_kind = event.kind(),
            block_num = ?event.block_num(),
            error,
            "Extraction failed"
        );
    }

    fn check_stop(&self) {
        let Some(stop) = self.config.stop_block_num else {
            return;
        };
        let start = self.config.start_block_num;
        if stop <= start || self.current_block_num() < stop {
            return;
        }
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(from = start, to = stop, "Stop height reached, pipeline stopping");
        self.detach();
        self.all_sinks.stop_all();
        self.node.quit();
    }
}

impl ChainObserver for Dispatcher {
    fn on_event(&self, stream: EventStream, event: EventRef<'_>) {
        self.handle(stream, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SinkRegistry;
    use contracts::{
        Block, NodeEvent, Record, SinkOptions, StructuredView, TransactionTrace,
    };
    use extractors::fixtures;
    use std::sync::atomic::AtomicUsize;

    type Produced = Arc<Mutex<Vec<(String, String, Value)>>>;

    struct Capture {
        name: &'static str,
        produced: Produced,
        stops: Arc<AtomicUsize>,
    }

    impl RecordSink for Capture {
        fn name(&self) -> &str {
            self.name
        }

        fn initialize(&mut self, _options: &SinkOptions) -> Result<(), ContractError> {
            Ok(())
        }

        fn produce(&self, table: &str, key: &str, value: &Value) {
            self.produced
                .lock()
                .unwrap()
                .push((table.to_string(), key.to_string(), value.clone()));
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Exploding;

    impl RecordSink for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }

        fn initialize(&mut self, _options: &SinkOptions) -> Result<(), ContractError> {
            Ok(())
        }

        fn produce(&self, _table: &str, _key: &str, _value: &Value) {
            panic!("sink bug");
        }

        fn stop(&self) {}
    }

    /// Emits one record per block, keyed by height
    struct Heights;

    impl Extractor for Heights {
        fn build_block(&self, block: &Block, view: &StructuredView) -> Result<Vec<Record>, ContractError> {
            let mut fields = serde_json::Map::new();
            fields.insert("irreversible".into(), view["irreversible"].clone());
            Ok(vec![Record::new(block.block_num.to_string(), fields)])
        }
    }

    struct Failing;

    impl Extractor for Failing {
        fn build_trace(
            &self,
            _trace: &TransactionTrace,
            _view: &StructuredView,
        ) -> Result<Vec<Record>, ContractError> {
            Err(ContractError::malformed("action_traces", "broken"))
        }
    }

    struct Panicking;

    impl Extractor for Panicking {
        fn build_block(&self, _block: &Block, _view: &StructuredView) -> Result<Vec<Record>, ContractError> {
            panic!("extractor bug");
        }
    }

    #[derive(Default)]
    struct TestNode {
        quits: AtomicUsize,
    }

    impl ChainNode for TestNode {
        fn quit(&self) {
            self.quits.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        hub: StreamHub,
        dispatcher: Arc<Dispatcher>,
        produced: Produced,
        stops: Arc<AtomicUsize>,
        node: Arc<TestNode>,
    }

    fn harness(config: PipelineConfig) -> Harness {
        let produced: Produced = Arc::default();
        let stops = Arc::new(AtomicUsize::new(0));

        let mut extractors = ExtractorRegistry::builtin();
        extractors
            .register("test::Heights", Heights)
            .register("test::Failing", Failing)
            .register("test::Panicking", Panicking);

        let mut sinks = SinkRegistry::new();
        sinks.register(Capture {
            name: "capture",
            produced: Arc::clone(&produced),
            stops: Arc::clone(&stops),
        });
        sinks.register(Exploding);
        sinks.initialize_all(&SinkOptions::default()).unwrap();

        let node = Arc::new(TestNode::default());
        let dispatcher =
            DispatcherBuilder::new(config, extractors, sinks.freeze(), node.clone()).build();
        let hub = StreamHub::new();
        dispatcher.attach(&hub);
        Harness {
            hub,
            dispatcher,
            produced,
            stops,
            node,
        }
    }

    fn config(extractors: &[&str], sinks: &[&str]) -> PipelineConfig {
        PipelineConfig {
            extractors: extractors.iter().map(|s| s.to_string()).collect(),
            sinks: sinks.iter().map(|s| s.to_string()).collect(),
            ..PipelineConfig::default()
        }
    }

    fn keys(produced: &Produced) -> Vec<String> {
        produced.lock().unwrap().iter().map(|(_, k, _)| k.clone()).collect()
    }

    #[test]
    fn test_table_names_and_fan_out() {
        let h = harness(config(&["es::BlockInfo", "test::Heights"], &["capture"]));
        assert_eq!(h.dispatcher.table_name("es::BlockInfo"), Some("eosio.es.blockinfo"));

        h.hub.emit(&NodeEvent::AcceptedBlock(fixtures::block(5)));
        let produced = h.produced.lock().unwrap();
        assert_eq!(produced.len(), 2);
        assert_eq!(produced[0].0, "eosio.es.blockinfo");
        assert!(produced[0].1.ends_with('F'));
        assert_eq!(produced[1].0, "eosio.test.heights");
        assert_eq!(produced[1].2["irreversible"], false);
    }

    #[test]
    fn test_unknown_names_skipped() {
        let h = harness(config(&["es::Nope", "test::Heights"], &["nope", "capture"]));
        h.hub.emit(&NodeEvent::IrreversibleBlock(fixtures::block(1)));
        assert_eq!(keys(&h.produced), vec!["1"]);
    }

    #[test]
    fn test_start_gate() {
        let mut cfg = config(&["test::Heights"], &["capture"]);
        cfg.start_block_num = 10;
        let h = harness(cfg);

        // height unknown yet: accepted blocks are gated
        h.hub.emit(&NodeEvent::AcceptedBlock(fixtures::block(12)));
        h.hub.emit(&NodeEvent::IrreversibleBlock(fixtures::block(9)));
        assert!(keys(&h.produced).is_empty());

        h.hub.emit(&NodeEvent::IrreversibleBlock(fixtures::block(10)));
        h.hub.emit(&NodeEvent::AcceptedBlock(fixtures::block(13)));
        assert_eq!(keys(&h.produced), vec!["10", "13"]);
        assert_eq!(h.dispatcher.stats().snapshot().gated, 2);
    }

    #[test]
    fn test_stop_height_is_inclusive_and_one_shot() {
        let mut cfg = config(&["test::Heights"], &["capture"]);
        cfg.start_block_num = 1;
        cfg.stop_block_num = Some(3);
        let h = harness(cfg);

        for n in 1..=5 {
            h.hub.emit(&NodeEvent::IrreversibleBlock(fixtures::block(n)));
        }
        assert_eq!(keys(&h.produced), vec!["1", "2", "3"]);
        assert!(h.dispatcher.is_stopped());
        assert_eq!(h.node.quits.load(Ordering::SeqCst), 1);
        assert_eq!(h.stops.load(Ordering::SeqCst), 1);
        for stream in EventStream::ALL {
            assert_eq!(h.hub.observer_count(stream), 0);
        }
    }

    #[test]
    fn test_stop_not_above_start_never_stops() {
        let mut cfg = config(&["test::Heights"], &["capture"]);
        cfg.start_block_num = 5;
        cfg.stop_block_num = Some(5);
        let h = harness(cfg);

        for n in 5..=7 {
            h.hub.emit(&NodeEvent::IrreversibleBlock(fixtures::block(n)));
        }
        assert_eq!(keys(&h.produced).len(), 3);
        assert_eq!(h.node.quits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failures_are_isolated() {
        let h = harness(config(
            &["test::Panicking", "test::Failing", "test::Heights", "es::Transaction"],
            &["exploding", "capture"],
        ));

        h.hub.emit(&NodeEvent::IrreversibleBlock(fixtures::block(4)));
        let trace = fixtures::trace_with(vec![fixtures::token_action(
            "eosio.token",
            "transfer",
            "eosio.token",
            1,
        )]);
        h.hub.emit(&NodeEvent::AppliedTransaction(trace.clone()));

        assert_eq!(keys(&h.produced), vec!["4".to_string(), format!("{}FB", trace.id)]);
        let snap = h.dispatcher.stats().snapshot();
        assert_eq!(snap.failures, 2);
        assert_eq!(snap.records, 2);
    }

    #[test]
    fn test_disabled_streams_not_attached() {
        let mut cfg = config(&["test::Heights"], &["capture"]);
        cfg.streams.accepted_block = false;
        let h = harness(cfg);

        assert_eq!(h.hub.observer_count(EventStream::AcceptedBlock), 0);
        h.hub.emit(&NodeEvent::AcceptedBlock(fixtures::block(1)));
        assert!(keys(&h.produced).is_empty());
        assert_eq!(h.hub.observer_count(EventStream::IrreversibleBlock), 1);
    }
}
