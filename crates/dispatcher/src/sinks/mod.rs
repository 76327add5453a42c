//! Sink implementations
//!
//! Contains FileSink, HttpSink, KafkaSink, HbaseSink and LogSink.

mod file;
mod hbase;
pub mod http;
mod kafka;
mod log;

pub use self::file::{Clock, FileSink};
pub use self::hbase::{plan as hbase_plan, Cell, HbaseSink};
pub use self::http::HttpSink;
pub use self::kafka::{partition_for, BrokerPublisher, KafkaSink};
pub use self::log::LogSink;
