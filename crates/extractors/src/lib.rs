//! # Extractors
//!
//! 记录抽取模块。
//!
//! 负责：
//! - 将一个链上事件转换为若干 `Record`
//! - 按广度优先展开 action 树
//! - 提供按名称查找的注册表
//!
//! Extractors are grouped by the store they were shaped for: `es` (search
//! index), `druid` (time series), `hbase` and `newhbase` (wide-column).

mod asset;
pub mod druid;
pub mod es;
pub mod filter;
pub mod fixtures;
pub mod flatten;
pub mod hbase;
pub mod newhbase;
mod registry;
pub mod view;

pub use asset::Asset;
pub use filter::ActionFilter;
pub use flatten::{action_key, flatten, FlatAction, NO_PARENT};
pub use registry::ExtractorRegistry;
pub use view::{epoch_seconds, table_suffix};
