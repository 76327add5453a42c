//! # Dispatcher
//!
//! 数据分发模块。
//!
//! 负责：
//! - 订阅节点事件流 (`StreamHub`)
//! - 起始高度门控与停止高度收尾
//! - Extractor × Sink fan-out，单个失败不影响其他

pub mod dispatcher;
pub mod error;
pub mod hub;
pub mod metrics;
pub mod registry;
pub mod sinks;
pub mod table;
pub mod worker;

#[cfg(test)]
mod testing;

pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::DispatcherError;
pub use hub::{StreamHub, Subscription};
pub use metrics::{DispatchSnapshot, DispatchStats, MetricsSnapshot, SinkMetrics};
pub use registry::{SharedSinks, SinkRegistry};
pub use sinks::{FileSink, HbaseSink, HttpSink, KafkaSink, LogSink};
pub use table::table_name;
pub use worker::EventLoop;
