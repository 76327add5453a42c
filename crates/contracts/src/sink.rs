//! RecordSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for sinks. Every registered sink goes
//! through `configure -> initialize -> startup -> stop` exactly once, whether
//! or not the active configuration selects it.

use serde::Serialize;
use serde_json::Value;

use crate::{ContractError, SinkOptions};

/// Description of one option a sink understands
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkOption {
    /// Key under the sink's `[sinks.<name>]` config table
    pub key: &'static str,
    /// Rendered default, `None` when the option is required or unset
    pub default: Option<String>,
    pub description: &'static str,
}

impl SinkOption {
    pub fn new(key: &'static str, description: &'static str) -> Self {
        Self {
            key,
            default: None,
            description,
        }
    }

    pub fn with_default(mut self, default: impl ToString) -> Self {
        self.default = Some(default.to_string());
        self
    }
}

/// Record output trait
///
/// `produce` is fire-and-forget: it must return quickly and must not surface
/// delivery failures to the caller. Sinks absorb, log or retry internally.
pub trait RecordSink: Send + Sync {
    /// Sink name (used for selection, logging and metrics)
    fn name(&self) -> &str;

    /// Options this sink reads from configuration
    fn configure(&self) -> Vec<SinkOption> {
        Vec::new()
    }

    /// Read options and prepare resources
    ///
    /// # Errors
    /// Returns init error when options are unusable (should include context)
    fn initialize(&mut self, options: &SinkOptions) -> Result<(), ContractError>;

    /// Start background workers, open outputs
    fn startup(&self) -> Result<(), ContractError> {
        Ok(())
    }

    /// Forward one record under `table`
    fn produce(&self, table: &str, key: &str, value: &Value);

    /// Drain in-flight work and release resources
    fn stop(&self);
}
