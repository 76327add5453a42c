//! Pipeline 指标收集模块
//!
//! 通过 `metrics` facade 记录事件、抽取与投递指标；安装 Prometheus
//! recorder 后即可导出。

use metrics::{counter, gauge, histogram};

/// 记录收到的节点事件
pub fn record_event_received(stream: &str) {
    counter!("chain_cdc_events_received_total", "stream" => stream.to_string()).increment(1);
}

/// 记录因起始高度被丢弃的事件
pub fn record_event_gated(stream: &str) {
    counter!("chain_cdc_events_gated_total", "stream" => stream.to_string()).increment(1);
}

/// 记录抽取出的记录数
pub fn record_records_built(table: &str, count: usize) {
    counter!("chain_cdc_records_built_total", "table" => table.to_string())
        .increment(count as u64);
}

/// 记录抽取失败
pub fn record_extract_failure(extractor: &str, event_kind: &str) {
    counter!(
        "chain_cdc_extract_failures_total",
        "extractor" => extractor.to_string(),
        "event_kind" => event_kind.to_string()
    )
    .increment(1);
}

/// 投递结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Retried,
    Abandoned,
}

impl DeliveryOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Retried => "retried",
            Self::Abandoned => "abandoned",
        }
    }
}

/// 记录一次投递结果
pub fn record_delivery(sink: &str, outcome: DeliveryOutcome) {
    counter!(
        "chain_cdc_deliveries_total",
        "sink" => sink.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// 记录最新不可逆高度
pub fn record_irreversible_height(block_num: u32) {
    gauge!("chain_cdc_irreversible_block_num").set(f64::from(block_num));
}

/// 记录单个事件的处理耗时
pub fn record_dispatch_latency_us(event_kind: &str, micros: f64) {
    histogram!("chain_cdc_dispatch_latency_us", "event_kind" => event_kind.to_string())
        .record(micros);
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}
