//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Data Model
//! - Events are borrowed from the node for one callback ([`EventRef`])
//! - Extractors turn one event into [`Record`]s
//! - Sinks consume `(table, key, value)` triples

mod blueprint;
mod error;
mod event;
mod extractor;
mod node;
mod record;
mod sink;

pub use blueprint::*;
pub use error::*;
pub use event::*;
pub use extractor::Extractor;
pub use node::{project, ChainNode, ChainObserver};
pub use record::{Record, StructuredView};
pub use sink::{RecordSink, SinkOption};
