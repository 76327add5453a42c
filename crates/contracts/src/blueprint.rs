//! PipelineBlueprint - Config Loader 输出
//!
//! 描述完整的管道配置：区块高度窗口、extractor/sink 选择、流开关，以及每个 sink 的选项。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的管道配置蓝图
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct PipelineBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 管道设置
    #[serde(default)]
    #[validate(nested)]
    pub pipeline: PipelineConfig,

    /// 各 sink 的选项 (无论是否被选中都会初始化)
    #[serde(default)]
    #[validate(nested)]
    pub sinks: SinkOptions,
}

/// 管道设置：高度窗口、选择、命名前缀、流开关
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PipelineConfig {
    /// 起始高度，低于该高度的事件直接丢弃
    #[serde(default)]
    pub start_block_num: u32,

    /// 停止高度 (包含)，到达后关闭管道
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_block_num: Option<u32>,

    /// 选中的 extractor 名称 (有序)
    #[serde(default)]
    pub extractors: Vec<String>,

    /// 选中的 sink 名称 (有序)
    #[serde(default)]
    pub sinks: Vec<String>,

    /// 表名前缀
    #[serde(default = "default_prefix")]
    #[validate(length(min = 1))]
    pub prefix: String,

    /// 四个事件流开关
    #[serde(default)]
    pub streams: StreamToggles,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            start_block_num: 0,
            stop_block_num: None,
            extractors: Vec::new(),
            sinks: Vec::new(),
            prefix: default_prefix(),
            streams: StreamToggles::default(),
        }
    }
}

fn default_prefix() -> String {
    "eosio".to_string()
}

fn default_true() -> bool {
    true
}

/// 事件流开关，默认全部开启
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamToggles {
    #[serde(default = "default_true")]
    pub accepted_block: bool,
    #[serde(default = "default_true")]
    pub irreversible_block: bool,
    #[serde(default = "default_true")]
    pub applied_transaction: bool,
    #[serde(default = "default_true")]
    pub accepted_transaction: bool,
}

impl Default for StreamToggles {
    fn default() -> Self {
        Self {
            accepted_block: true,
            irreversible_block: true,
            applied_transaction: true,
            accepted_transaction: true,
        }
    }
}

impl StreamToggles {
    /// 某个流是否开启
    pub fn is_enabled(&self, stream: crate::EventStream) -> bool {
        use crate::EventStream;
        match stream {
            EventStream::AcceptedBlock => self.accepted_block,
            EventStream::IrreversibleBlock => self.irreversible_block,
            EventStream::AppliedTransaction => self.applied_transaction,
            EventStream::AcceptedTransaction => self.accepted_transaction,
        }
    }
}

/// 所有 sink 的选项集合
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct SinkOptions {
    #[serde(default)]
    #[validate(nested)]
    pub file: FileSinkOptions,

    #[serde(default)]
    #[validate(nested)]
    pub http: HttpSinkOptions,

    #[serde(default)]
    #[validate(nested)]
    pub kafka: KafkaSinkOptions,

    #[serde(default)]
    #[validate(nested)]
    pub hbase: HbaseSinkOptions,
}

/// 按小时滚动的文件输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct FileSinkOptions {
    /// 文件名前缀，相对路径基于 `data_dir`
    #[serde(default = "default_file_name")]
    #[validate(length(min = 1))]
    pub file_name: String,

    /// 数据目录
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for FileSinkOptions {
    fn default() -> Self {
        Self {
            file_name: default_file_name(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_file_name() -> String {
    "production".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

/// HTTP 回调输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct HttpSinkOptions {
    /// 回调地址，每条记录都会投递到每个地址
    #[serde(default)]
    pub endpoints: Vec<String>,

    /// 失败后的最大重试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// 重试间隔 (毫秒)
    #[serde(default = "default_retry_interval_ms")]
    #[validate(range(min = 1))]
    pub retry_interval_ms: u64,

    /// 单次请求的最长等待时间 (毫秒)
    #[serde(default = "default_max_wait_ms")]
    #[validate(range(min = 1))]
    pub max_wait_ms: u64,

    /// 每个地址同时在途的请求上限
    #[serde(default = "default_max_in_flight")]
    #[validate(range(min = 1, max = 65_536))]
    pub max_in_flight: usize,
}

impl Default for HttpSinkOptions {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            max_retries: default_max_retries(),
            retry_interval_ms: default_retry_interval_ms(),
            max_wait_ms: default_max_wait_ms(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_interval_ms() -> u64 {
    1000
}

fn default_max_wait_ms() -> u64 {
    1000
}

fn default_max_in_flight() -> usize {
    256
}

/// Kafka 输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct KafkaSinkOptions {
    /// broker 地址列表
    #[serde(default)]
    pub brokers: Vec<String>,

    /// 单条消息最大字节数
    #[serde(default = "default_message_max_bytes")]
    #[validate(range(min = 1))]
    pub message_max_bytes: u32,

    /// 分区总数
    #[serde(default = "default_partition_count")]
    #[validate(range(min = 1))]
    pub partition_count: u32,

    /// 是否以 debug 级别打印 payload
    #[serde(default)]
    pub print_payload: bool,
}

impl Default for KafkaSinkOptions {
    fn default() -> Self {
        Self {
            brokers: Vec::new(),
            message_max_bytes: default_message_max_bytes(),
            partition_count: default_partition_count(),
            print_payload: false,
        }
    }
}

fn default_message_max_bytes() -> u32 {
    2_000_000
}

fn default_partition_count() -> u32 {
    1
}

/// HBase REST 网关输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct HbaseSinkOptions {
    /// REST 网关地址，未设置时 sink 保持空闲
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_url: Option<String>,

    /// 未带列族前缀的字段写入的列族
    #[serde(default = "default_family")]
    #[validate(length(min = 1))]
    pub default_family: String,

    /// 单次写入超时 (毫秒)
    #[serde(default = "default_hbase_timeout_ms")]
    #[validate(range(min = 1))]
    pub timeout_ms: u64,
}

impl Default for HbaseSinkOptions {
    fn default() -> Self {
        Self {
            rest_url: None,
            default_family: default_family(),
            timeout_ms: default_hbase_timeout_ms(),
        }
    }
}

fn default_family() -> String {
    "info".to_string()
}

fn default_hbase_timeout_ms() -> u64 {
    5000
}
