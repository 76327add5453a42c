//! Node-facing interfaces
//!
//! The node owns the four event streams and can project an event into its
//! structured view. Observers attach per stream.

use crate::{ContractError, EventRef, EventStream, StructuredView};

/// The blockchain node as seen by the pipeline
pub trait ChainNode: Send + Sync {
    /// Project an event into its self-describing structured view
    ///
    /// This may be expensive; it is called once per processed event.
    fn resolve(&self, event: EventRef<'_>) -> Result<StructuredView, ContractError> {
        project(event)
    }

    /// Ask the host process to terminate
    fn quit(&self);
}

/// Serde projection of an event into a structured view
pub fn project(event: EventRef<'_>) -> Result<StructuredView, ContractError> {
    let value = match event {
        EventRef::Block(block) => serde_json::to_value(block),
        EventRef::Trace(trace) => serde_json::to_value(trace),
        EventRef::Metadata(meta) => serde_json::to_value(meta),
    }
    .map_err(|e| ContractError::resolve(event.kind(), e.to_string()))?;

    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(ContractError::resolve(
            event.kind(),
            format!("expected object, got {other}"),
        )),
    }
}

/// Callback attached to one node stream
pub trait ChainObserver: Send + Sync {
    fn on_event(&self, stream: EventStream, event: EventRef<'_>);
}
