//! HttpSink - retrying JSON callback delivery
//!
//! Every record becomes one POST of `{"table": ..., "data": ...}` per
//! configured endpoint. Deliveries run on the sink's own [`EventLoop`];
//! `produce` only queues them. Endpoints are independent: each has its own
//! in-flight limit and a slow endpoint never delays another.

mod delivery;
mod transport;

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use bytes::Bytes;
use contracts::{ContractError, RecordSink, SinkOption, SinkOptions};
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::metrics::SinkMetrics;
use crate::worker::EventLoop;

pub use self::delivery::{
    deliver, validate, Attempt, Delivery, DeliveryState, Outcome, Rejection, RetryPolicy,
};
pub use self::transport::{LocalTransport, ReqwestTransport, Response, Transport};

struct Lane {
    endpoint: Url,
    in_flight: Arc<Semaphore>,
}

/// Sink that POSTs records to HTTP endpoints
pub struct HttpSink<T = ReqwestTransport> {
    name: String,
    transport: Arc<T>,
    lanes: Vec<Lane>,
    policy: RetryPolicy,
    event_loop: OnceLock<EventLoop>,
    metrics: Arc<SinkMetrics>,
}

impl HttpSink<ReqwestTransport> {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_transport(name, ReqwestTransport::default())
    }
}

impl<T: Transport + Sync + 'static> HttpSink<T> {
    /// Use a custom transport instead of reqwest
    pub fn with_transport(name: impl Into<String>, transport: T) -> Self {
        let name = name.into();
        Self {
            metrics: Arc::new(SinkMetrics::new(name.clone())),
            name,
            transport: Arc::new(transport),
            lanes: Vec::new(),
            policy: RetryPolicy {
                max_retries: 5,
                retry_interval: Duration::from_millis(1000),
                max_wait: Duration::from_millis(1000),
            },
            event_loop: OnceLock::new(),
        }
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Url> {
        self.lanes.iter().map(|lane| &lane.endpoint)
    }

    /// Serialized request body for one record
    pub fn request_body(table: &str, value: &Value) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(&json!({ "table": table, "data": value })).map(Bytes::from)
    }
}

impl<T: Transport + Sync + 'static> RecordSink for HttpSink<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&self) -> Vec<SinkOption> {
        vec![
            SinkOption::new("endpoints", "callback URLs, each receives every record"),
            SinkOption::new("max_retries", "retries before a record is abandoned").with_default(5),
            SinkOption::new("retry_interval_ms", "pause between attempts").with_default(1000),
            SinkOption::new("max_wait_ms", "deadline for connect, write and read").with_default(1000),
            SinkOption::new("max_in_flight", "concurrent attempts per endpoint").with_default(256),
        ]
    }

    #[instrument(name = "http_sink_initialize", skip(self, options), fields(sink = %self.name))]
    fn initialize(&mut self, options: &SinkOptions) -> Result<(), ContractError> {
        let http = &options.http;
        self.policy = RetryPolicy {
            max_retries: http.max_retries,
            retry_interval: Duration::from_millis(http.retry_interval_ms),
            max_wait: Duration::from_millis(http.max_wait_ms),
        };

        let mut lanes = Vec::with_capacity(http.endpoints.len());
        for raw in &http.endpoints {
            let endpoint = Url::parse(raw)
                .map_err(|e| ContractError::sink_init(&self.name, format!("{raw}: {e}")))?;
            lanes.push(Lane {
                endpoint,
                in_flight: Arc::new(Semaphore::new(
                    http.max_in_flight.clamp(1, Semaphore::MAX_PERMITS),
                )),
            });
        }
        self.lanes = lanes;

        info!(
            sink = %self.name,
            endpoints = self.lanes.len(),
            max_retries = self.policy.max_retries,
            "HttpSink initialized"
        );
        Ok(())
    }

    #[instrument(name = "http_sink_startup", skip(self), fields(sink = %self.name))]
    fn startup(&self) -> Result<(), ContractError> {
        if self.event_loop.get().is_some() {
            return Ok(());
        }
        let event_loop = EventLoop::start(format!("{}-sink", self.name))
            .map_err(|e| ContractError::sink_init(&self.name, e.to_string()))?;
        // A concurrent startup may have won; the loser is dropped and joined.
        let _ = self.event_loop.set(event_loop);
        Ok(())
    }

    fn produce(&self, table: &str, key: &str, value: &Value) {
        self.metrics.inc_produced();
        let Some(event_loop) = self.event_loop.get() else {
            warn!(sink = %self.name, table, key, "HttpSink not started, record dropped");
            return;
        };
        let body = match Self::request_body(table, value) {
            Ok(body) => body,
            Err(e) => {
                warn!(sink = %self.name, table, key, error = %e, "Serialize failed");
                return;
            }
        };

        for lane in &self.lanes {
            let delivery = Delivery {
                endpoint: lane.endpoint.clone(),
                key: key.to_string(),
                body: body.clone(),
            };
            let transport = Arc::clone(&self.transport);
            let in_flight = Arc::clone(&lane.in_flight);
            let metrics = Arc::clone(&self.metrics);
            let policy = self.policy;
            event_loop.spawn(async move {
                let Ok(_permit) = in_flight.acquire_owned().await else {
                    return;
                };
                deliver(transport.as_ref(), &delivery, policy, &metrics).await;
            });
        }
    }

    #[instrument(name = "http_sink_stop", skip(self), fields(sink = %self.name))]
    fn stop(&self) {
        if let Some(event_loop) = self.event_loop.get() {
            event_loop.shutdown();
        }
        debug!(sink = %self.name, metrics = ?self.metrics.snapshot(), "HttpSink stopped");
    }
}
