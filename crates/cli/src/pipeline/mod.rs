//! Pipeline orchestration module.

mod orchestrator;
mod replay;
mod stats;

pub use orchestrator::{Pipeline, PipelineConfig};
pub use replay::{replay, ReplayNode, ReplaySummary};
pub use stats::PipelineStats;
