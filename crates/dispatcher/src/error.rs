//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink lifecycle error
    #[error("sink '{name}' failed to {stage}: {message}")]
    SinkLifecycle {
        name: String,
        stage: &'static str,
        message: String,
    },

    /// Background event loop could not be started
    #[error("failed to start event loop '{name}': {source}")]
    EventLoop {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Error from a contract implementation
    #[error("contract error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    pub fn sink_lifecycle(
        name: impl Into<String>,
        stage: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::SinkLifecycle {
            name: name.into(),
            stage,
            message: message.into(),
        }
    }
}
