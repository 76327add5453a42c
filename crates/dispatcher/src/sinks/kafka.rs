//! KafkaSink - topic-per-table publishing with key-stable partitions
//!
//! The topic is the table name, the message key is the record key and the
//! payload is the record value as JSON. Records with a `primary_key` go to
//! `sum(bytes(primary_key)) % partition_count`; the rest are left to the
//! broker client.

use std::sync::Arc;
use std::time::Duration;

use contracts::{ContractError, RecordSink, SinkOption, SinkOptions};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::metrics::SinkMetrics;

const FLUSH_ATTEMPTS: u32 = 5;
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Partition for a record, `None` when it has no primary key
pub fn partition_for(primary_key: Option<&str>, partition_count: u32) -> Option<i32> {
    let key = primary_key?;
    let count = u64::from(partition_count.max(1));
    let sum: u64 = key.bytes().map(u64::from).sum();
    i32::try_from(sum % count).ok()
}

/// Primary key as partitioning text; non-string keys are stringified
fn partition_key(value: &Value) -> Option<String> {
    match value.get("primary_key")? {
        Value::Null => None,
        Value::String(key) => Some(key.clone()),
        other => Some(other.to_string()),
    }
}

/// Broker client seam
pub trait BrokerPublisher: Send + Sync {
    fn publish(
        &self,
        topic: &str,
        partition: Option<i32>,
        key: &str,
        payload: &[u8],
    ) -> Result<(), ContractError>;

    fn flush(&self, timeout: Duration) -> Result<(), ContractError>;
}

/// Sink that publishes records to a message broker
pub struct KafkaSink {
    name: String,
    publisher: Option<Arc<dyn BrokerPublisher>>,
    partition_count: u32,
    print_payload: bool,
    metrics: Arc<SinkMetrics>,
}

impl KafkaSink {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            metrics: Arc::new(SinkMetrics::new(name.clone())),
            name,
            publisher: None,
            partition_count: 1,
            print_payload: false,
        }
    }

    /// Use an existing publisher; `initialize` keeps it
    pub fn with_publisher(name: impl Into<String>, publisher: Arc<dyn BrokerPublisher>) -> Self {
        let mut sink = Self::new(name);
        sink.publisher = Some(publisher);
        sink
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    pub fn is_active(&self) -> bool {
        self.publisher.is_some()
    }
}

impl RecordSink for KafkaSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&self) -> Vec<SinkOption> {
        vec![
            SinkOption::new("brokers", "bootstrap broker addresses"),
            SinkOption::new("message_max_bytes", "largest message the producer sends")
                .with_default(2_000_000),
            SinkOption::new("partition_count", "partitions per topic").with_default(1),
            SinkOption::new("print_payload", "log every payload at debug").with_default(false),
        ]
    }

    #[instrument(name = "kafka_sink_initialize", skip(self, options), fields(sink = %self.name))]
    fn initialize(&mut self, options: &SinkOptions) -> Result<(), ContractError> {
        let kafka = &options.kafka;
        self.partition_count = kafka.partition_count.max(1);
        self.print_payload = kafka.print_payload;

        if self.publisher.is_some() {
            return Ok(());
        }
        if kafka.brokers.is_empty() {
            debug!(sink = %self.name, "No brokers configured, KafkaSink idle");
            return Ok(());
        }

        #[cfg(feature = "kafka")]
        {
            let producer = rdkafka_publisher::RdKafkaPublisher::connect(kafka)
                .map_err(|e| ContractError::sink_init(&self.name, e.to_string()))?;
            self.publisher = Some(Arc::new(producer));
            info!(sink = %self.name, brokers = %kafka.brokers.join(","), "KafkaSink initialized");
        }
        #[cfg(not(feature = "kafka"))]
        {
            warn!(
                sink = %self.name,
                "Brokers configured but built without the `kafka` feature, KafkaSink idle"
            );
        }
        Ok(())
    }

    fn produce(&self, table: &str, key: &str, value: &Value) {
        let Some(publisher) = &self.publisher else {
            return;
        };
        self.metrics.inc_produced();

        let payload = value.to_string();
        let primary_key = partition_key(value);
        let partition = partition_for(primary_key.as_deref(), self.partition_count);

        match publisher.publish(table, partition, key, payload.as_bytes()) {
            Ok(()) => {
                self.metrics.inc_delivered();
                if self.print_payload {
                    debug!(topic = table, size = payload.len(), payload = %payload, "Published");
                }
            }
            Err(e) => {
                self.metrics.inc_abandoned();
                error!(
                    sink = %self.name,
                    topic = table,
                    key,
                    payload = %payload,
                    error = %e,
                    "Publish failed"
                );
            }
        }
    }

    #[instrument(name = "kafka_sink_stop", skip(self), fields(sink = %self.name))]
    fn stop(&self) {
        let Some(publisher) = &self.publisher else {
            return;
        };
        for attempt in 1..=FLUSH_ATTEMPTS {
            match publisher.flush(FLUSH_TIMEOUT) {
                Ok(()) => {
                    info!(sink = %self.name, "Producer flushed");
                    return;
                }
                Err(e) => warn!(
                    sink = %self.name,
                    attempt,
                    max = FLUSH_ATTEMPTS,
                    error = %e,
                    "Flush failed, trying again"
                ),
            }
        }
        error!(sink = %self.name, "Giving up on flush, buffered messages lost");
    }
}

#[cfg(feature = "kafka")]
mod rdkafka_publisher {
    use std::time::Duration;

    use contracts::{ContractError, KafkaSinkOptions};
    use rdkafka::config::ClientConfig;
    use rdkafka::error::KafkaError;
    use rdkafka::producer::{BaseRecord, DefaultProducerContext, Producer, ThreadedProducer};

    use super::BrokerPublisher;

    /// Threaded librdkafka producer: gzip, acks=1, keepalive
    pub struct RdKafkaPublisher {
        producer: ThreadedProducer<DefaultProducerContext>,
    }

    impl RdKafkaPublisher {
        pub fn connect(options: &KafkaSinkOptions) -> Result<Self, KafkaError> {
            let producer = ClientConfig::new()
                .set("bootstrap.servers", options.brokers.join(","))
                .set("socket.keepalive.enable", "true")
                .set("acks", "1")
                .set("compression.codec", "gzip")
                .set("message.max.bytes", options.message_max_bytes.to_string())
                .create()?;
            Ok(Self { producer })
        }
    }

    impl BrokerPublisher for RdKafkaPublisher {
        fn publish(
            &self,
            topic: &str,
            partition: Option<i32>,
            key: &str,
            payload: &[u8],
        ) -> Result<(), ContractError> {
            let mut record = BaseRecord::to(topic).key(key).payload(payload);
            if let Some(partition) = partition {
                record = record.partition(partition);
            }
            self.producer
                .send(record)
                .map_err(|(e, _)| ContractError::sink_write("kafka", e.to_string()))
        }

        fn flush(&self, timeout: Duration) -> Result<(), ContractError> {
            self.producer
                .flush(timeout)
                .map_err(|e| ContractError::sink_write("kafka", e.to_string()))
        }
    }
}
