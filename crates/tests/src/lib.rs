//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 端到端测试：StreamHub → Dispatcher → Sinks
//! - 起止高度与流开关的整体行为

#[cfg(test)]
mod e2e_tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{ChainNode, EventStream, NodeEvent, PipelineBlueprint};
    use dispatcher::{Dispatcher, DispatcherBuilder, SharedSinks, SinkRegistry, StreamHub};
    use extractors::{fixtures, ExtractorRegistry};
    use serde_json::Value;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct Node {
        quits: AtomicUsize,
    }

    impl ChainNode for Node {
        fn quit(&self) {
            self.quits.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Pipeline {
        hub: StreamHub,
        dispatcher: Arc<Dispatcher>,
        sinks: SharedSinks,
        node: Arc<Node>,
    }

    fn start(blueprint: &PipelineBlueprint) -> Pipeline {
        let mut registry = SinkRegistry::builtin();
        registry.initialize_all(&blueprint.sinks).unwrap();
        let sinks = registry.freeze();
        sinks.startup_all().unwrap();

        let node = Arc::new(Node::default());
        let dispatcher = DispatcherBuilder::new(
            blueprint.pipeline.clone(),
            ExtractorRegistry::builtin(),
            sinks.clone(),
            node.clone(),
        )
        .build();
        let hub = StreamHub::new();
        dispatcher.attach(&hub);
        Pipeline {
            hub,
            dispatcher,
            sinks,
            node,
        }
    }

    fn load(toml: &str, data_dir: &Path) -> PipelineBlueprint {
        let mut blueprint = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
        blueprint.sinks.file.data_dir = data_dir.to_path_buf();
        blueprint
    }

    /// `(table, key, value)` for every line of every rolled file
    fn file_records(dir: &Path) -> Vec<(String, String, Value)> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.file_name().unwrap().to_string_lossy().starts_with("production."))
            .collect();
        paths.sort();

        let mut records = Vec::new();
        for path in paths {
            for line in std::fs::read_to_string(path).unwrap().lines() {
                let mut parts = line.splitn(3, '\t');
                let table = parts.next().unwrap().to_string();
                let key = parts.next().unwrap().to_string();
                let value = serde_json::from_str(parts.next().unwrap()).unwrap();
                records.push((table, key, value));
            }
        }
        records
    }

    fn transfer_trace(block_num: u32) -> contracts::TransactionTrace {
        let mut root = fixtures::token_action("eosio.token", "transfer", "eosio.token", 10);
        root.inline_traces
            .push(fixtures::token_action("eosio.token", "transfer", "bob", 11));
        fixtures::trace_at(block_num, vec![root])
    }

    /// Node events → hub → dispatcher → file sink, gated below 3 and stopped at 5
    #[test]
    fn test_e2e_file_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let blueprint = load(
            r#"
[pipeline]
start_block_num = 3
stop_block_num = 5
extractors = ["es::BlockInfo", "es::Action", "hbase::TransactionTrace"]
sinks = ["file", "log"]
"#,
            dir.path(),
        );
        let p = start(&blueprint);

        for n in 1..=7 {
            p.hub.emit(&NodeEvent::AcceptedBlock(fixtures::block(n)));
            p.hub.emit(&NodeEvent::AppliedTransaction(transfer_trace(n)));
            p.hub.emit(&NodeEvent::IrreversibleBlock(fixtures::block(n)));
        }

        assert!(p.dispatcher.is_stopped());
        assert_eq!(p.node.quits.load(Ordering::SeqCst), 1);
        for stream in EventStream::ALL {
            assert_eq!(p.hub.observer_count(stream), 0);
        }

        let records = file_records(dir.path());
        let blocks: Vec<&str> = records
            .iter()
            .filter(|(table, _, _)| table == "eosio.es.blockinfo")
            .map(|(_, key, _)| key.as_str())
            .collect();
        // 3 finalized, plus accepted 4 and 5 which arrive after height 3 is known
        assert_eq!(blocks.len(), 5);
        assert!(blocks.iter().filter(|k| k.ends_with('T')).count() == 3);
        assert!(blocks.first().unwrap().starts_with("00000003"));

        let actions: Vec<&(String, String, Value)> = records
            .iter()
            .filter(|(table, _, _)| table == "eosio.es.action")
            .collect();
        assert_eq!(actions.len(), 4);
        assert!(actions.iter().any(|(_, key, _)| key.ends_with("01000000")));

        let traces = records
            .iter()
            .filter(|(table, _, _)| table == "eosio.hbase.transactiontrace")
            .count();
        assert_eq!(traces, 2);

        let snapshot = p.dispatcher.stats().snapshot();
        assert_eq!(snapshot.records as usize, records.len());
        assert_eq!(snapshot.failures, 0);
    }

    /// Disabled streams never reach extractors
    #[test]
    fn test_e2e_stream_toggles() {
        let dir = tempfile::tempdir().unwrap();
        let blueprint = load(
            r#"
[pipeline]
extractors = ["es::BlockInfo", "hbase::TransactionMetadata"]
sinks = ["file"]

[pipeline.streams]
accepted_block = false
accepted_transaction = false
"#,
            dir.path(),
        );
        let p = start(&blueprint);

        p.hub.emit(&NodeEvent::AcceptedBlock(fixtures::block(1)));
        p.hub.emit(&NodeEvent::AcceptedTransaction(fixtures::metadata("feed")));
        p.hub.emit(&NodeEvent::IrreversibleBlock(fixtures::block(1)));
        p.sinks.stop_all();

        let records = file_records(dir.path());
        assert_eq!(records.len(), 1);
        assert!(records[0].1.ends_with('T'));
        assert_eq!(records[0].2["irreversible"], true);
        assert!(!p.dispatcher.is_stopped());
    }

    /// Accepts every request and answers `{"status": 0}`
    async fn callback_server() -> (String, Arc<Mutex<Vec<Value>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/records", listener.local_addr().unwrap());
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&bodies);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let seen = Arc::clone(&seen);
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 4096];
                    loop {
                        let n = socket.read(&mut chunk).await.unwrap_or(0);
                        if n == 0 {
                            return;
                        }
                        buf.extend_from_slice(&chunk[..n]);
                        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                            continue;
                        };
                        let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                        let length: usize = head
                            .lines()
                            .find_map(|l| l.strip_prefix("content-length:"))
                            .and_then(|v| v.trim().parse().ok())
                            .unwrap_or(0);
                        if buf.len() >= end + 4 + length {
                            let body = &buf[end + 4..end + 4 + length];
                            if let Ok(value) = serde_json::from_slice(body) {
                                seen.lock().unwrap().push(value);
                            }
                            break;
                        }
                    }
                    let reply = "{\"status\":0}";
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{reply}",
                        reply.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        (url, bodies)
    }

    /// Records reach every HTTP endpoint before stop returns
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_http_delivery() {
        let (first, first_bodies) = callback_server().await;
        let (second, second_bodies) = callback_server().await;
        let dir = tempfile::tempdir().unwrap();
        let mut blueprint = load(
            r#"
[pipeline]
extractors = ["druid::Transfer"]
sinks = ["http"]
"#,
            dir.path(),
        );
        blueprint.sinks.http.endpoints = vec![first, second];

        let p = start(&blueprint);
        let emitted = tokio::task::spawn_blocking(move || {
            // only the top-level transfer has receiver == account
            for n in [9, 10] {
                p.hub.emit(&NodeEvent::AppliedTransaction(transfer_trace(n)));
            }
            p.sinks.stop_all();
            p
        })
        .await
        .unwrap();
        assert_eq!(emitted.dispatcher.stats().snapshot().records, 2);

        for bodies in [first_bodies, second_bodies] {
            let bodies = bodies.lock().unwrap();
            assert_eq!(bodies.len(), 2);
            assert!(bodies.iter().all(|b| b["table"] == "eosio.druid.transfer"));
            assert!(bodies.iter().any(|b| b["data"]["to"] == "bob"));
        }
    }
}
