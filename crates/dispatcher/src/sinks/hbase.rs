//! HbaseSink - wide-column writes through the HBase REST gateway
//!
//! Each field of a record becomes one cell of row `key`, written with
//! `PUT {rest_url}/{table}/{row}/{family:qualifier}`. Fields that already
//! carry a `family:` prefix keep it; the rest go to the default family. A
//! `table_suffix` field shards the table as `{table}_{suffix}` and is not
//! written as a cell.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use contracts::{ContractError, RecordSink, SinkOption, SinkOptions};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::metrics::SinkMetrics;
use crate::worker::EventLoop;

/// One cell write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub column: String,
    pub value: Vec<u8>,
}

/// Target table and cells for one record
pub fn plan(table: &str, value: &Value, default_family: &str) -> (String, Vec<Cell>) {
    let Some(fields) = value.as_object() else {
        return (table.to_string(), Vec::new());
    };
    let table = match fields.get("table_suffix").and_then(Value::as_str) {
        Some(suffix) => format!("{table}_{suffix}"),
        None => table.to_string(),
    };
    let cells = fields
        .iter()
        .filter(|(name, _)| name.as_str() != "table_suffix")
        .map(|(name, field)| Cell {
            column: if name.contains(':') {
                name.clone()
            } else {
                format!("{default_family}:{name}")
            },
            value: match field {
                Value::String(s) => s.clone().into_bytes(),
                other => other.to_string().into_bytes(),
            },
        })
        .collect();
    (table, cells)
}

struct Gateway {
    base: Url,
    client: reqwest::Client,
    timeout: Duration,
}

impl Gateway {
    fn cell_url(&self, table: &str, row: &str, column: &str) -> Option<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .push(table)
            .push(row)
            .push(column);
        Some(url)
    }

    async fn put(&self, table: &str, row: &str, cell: Cell) -> Result<(), String> {
        let url = self
            .cell_url(table, row, &cell.column)
            .ok_or_else(|| format!("{} cannot take path segments", self.base))?;
        let response = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .timeout(self.timeout)
            .body(cell.value)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(format!("http status {status}"))
        }
    }
}

/// Sink that writes records as HBase cells
pub struct HbaseSink {
    name: String,
    gateway: Option<Arc<Gateway>>,
    default_family: String,
    event_loop: OnceLock<EventLoop>,
    metrics: Arc<SinkMetrics>,
}

impl HbaseSink {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            metrics: Arc::new(SinkMetrics::new(name.clone())),
            name,
            gateway: None,
            default_family: "info".to_string(),
            event_loop: OnceLock::new(),
        }
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }
}

impl RecordSink for HbaseSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&self) -> Vec<SinkOption> {
        vec![
            SinkOption::new("rest_url", "base URL of the HBase REST gateway"),
            SinkOption::new("default_family", "column family for unqualified fields")
                .with_default("info"),
            SinkOption::new("timeout_ms", "per-cell request timeout").with_default(5000),
        ]
    }

    #[instrument(name = "hbase_sink_initialize", skip(self, options), fields(sink = %self.name))]
    fn initialize(&mut self, options: &SinkOptions) -> Result<(), ContractError> {
        let hbase = &options.hbase;
        self.default_family = hbase.default_family.clone();
        let Some(raw) = &hbase.rest_url else {
            debug!(sink = %self.name, "No rest_url configured, HbaseSink idle");
            return Ok(());
        };
        let base = Url::parse(raw)
            .map_err(|e| ContractError::sink_init(&self.name, format!("{raw}: {e}")))?;
        info!(sink = %self.name, rest_url = %base, "HbaseSink initialized");
        self.gateway = Some(Arc::new(Gateway {
            base,
            client: reqwest::Client::new(),
            timeout: Duration::from_millis(hbase.timeout_ms),
        }));
        Ok(())
    }

    fn startup(&self) -> Result<(), ContractError> {
        if self.gateway.is_none() || self.event_loop.get().is_some() {
            return Ok(());
        }
        let event_loop = EventLoop::start(format!("{}-sink", self.name))
            .map_err(|e| ContractError::sink_init(&self.name, e.to_string()))?;
        let _ = self.event_loop.set(event_loop);
        Ok(())
    }

    fn produce(&self, table: &str, key: &str, value: &Value) {
        let (Some(gateway), Some(event_loop)) = (&self.gateway, self.event_loop.get()) else {
            return;
        };
        self.metrics.inc_produced();

        let (table, cells) = plan(table, value, &self.default_family);
        if cells.is_empty() {
            warn!(sink = %self.name, table = %table, key, "Record has no fields, skipped");
            return;
        }
        let gateway = Arc::clone(gateway);
        let metrics = Arc::clone(&self.metrics);
        let row = key.to_string();
        event_loop.spawn(async move {
            let mut failed = false;
            for cell in cells {
                let column = cell.column.clone();
                if let Err(e) = gateway.put(&table, &row, cell).await {
                    failed = true;
                    error!(table = %table, row = %row, column = %column, error = %e, "Cell write failed");
                }
            }
            if failed {
                metrics.inc_abandoned();
            } else {
                metrics.inc_delivered();
            }
        });
    }

    #[instrument(name = "hbase_sink_stop", skip(self), fields(sink = %self.name))]
    fn stop(&self) {
        if let Some(event_loop) = self.event_loop.get() {
            event_loop.shutdown();
        }
        debug!(sink = %self.name, metrics = ?self.metrics.snapshot(), "HbaseSink stopped");
    }
}
