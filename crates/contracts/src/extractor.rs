//! Extractor trait - event to records
//!
//! An extractor handles any subset of the three event kinds. Kinds it does
//! not override yield no records.

use crate::{Block, ContractError, EventRef, Record, StructuredView, TransactionMetadata, TransactionTrace};

/// Pure transformation from one event to an ordered sequence of records
///
/// Implementations must be deterministic: the same event and view always
/// yield the same records, and keys within one call are pairwise distinct.
/// Absent optional fields are omitted from the output rather than reported
/// as errors.
pub trait Extractor: Send + Sync {
    fn build_block(
        &self,
        _block: &Block,
        _view: &StructuredView,
    ) -> Result<Vec<Record>, ContractError> {
        Ok(Vec::new())
    }

    fn build_trace(
        &self,
        _trace: &TransactionTrace,
        _view: &StructuredView,
    ) -> Result<Vec<Record>, ContractError> {
        Ok(Vec::new())
    }

    fn build_metadata(
        &self,
        _meta: &TransactionMetadata,
        _view: &StructuredView,
    ) -> Result<Vec<Record>, ContractError> {
        Ok(Vec::new())
    }

    /// Dispatch on event kind
    fn build(&self, event: EventRef<'_>, view: &StructuredView) -> Result<Vec<Record>, ContractError> {
        match event {
            EventRef::Block(block) => self.build_block(block, view),
            EventRef::Trace(trace) => self.build_trace(trace, view),
            EventRef::Metadata(meta) => self.build_metadata(meta, view),
        }
    }
}
