//! Raw-state extractors for the wide-column store
//!
//! Each record carries the whole structured view as embedded JSON under
//! `json`, keyed by the event id.

use contracts::{
    Block, ContractError, Extractor, Record, StructuredView, TransactionMetadata, TransactionTrace,
};
use serde_json::Map;

use crate::flatten::flatten;
use crate::view::{epoch_seconds, is_irreversible, put, to_json_string};

fn block_state(block: &Block, view: &StructuredView) -> Result<Vec<Record>, ContractError> {
    let mut fields = Map::new();
    put(&mut fields, "primary_key", block.id.as_str());
    put(&mut fields, "json", to_json_string(view)?);
    if let Some(seconds) = epoch_seconds(&block.header.timestamp) {
        put(&mut fields, "timestamp", seconds);
    }
    Ok(vec![Record::new(block.id.clone(), fields)])
}

fn raw_state(id: &str, view: &StructuredView) -> Result<Vec<Record>, ContractError> {
    let mut fields = Map::new();
    put(&mut fields, "primary_key", id);
    put(&mut fields, "json", to_json_string(view)?);
    Ok(vec![Record::new(id, fields)])
}

/// Finalized blocks
#[derive(Debug, Default, Clone, Copy)]
pub struct IrreversibleBlockState;

impl Extractor for IrreversibleBlockState {
    fn build_block(&self, block: &Block, view: &StructuredView) -> Result<Vec<Record>, ContractError> {
        if !is_irreversible(view) {
            return Ok(Vec::new());
        }
        block_state(block, view)
    }
}

/// Blocks as first accepted
#[derive(Debug, Default, Clone, Copy)]
pub struct ReversibleBlockState;

impl Extractor for ReversibleBlockState {
    fn build_block(&self, block: &Block, view: &StructuredView) -> Result<Vec<Record>, ContractError> {
        if is_irreversible(view) {
            return Ok(Vec::new());
        }
        block_state(block, view)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TransactionTraceState;

impl Extractor for TransactionTraceState {
    fn build_trace(
        &self,
        trace: &TransactionTrace,
        view: &StructuredView,
    ) -> Result<Vec<Record>, ContractError> {
        raw_state(&trace.id, view)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TransactionMetadataState;

impl Extractor for TransactionMetadataState {
    fn build_metadata(
        &self,
        meta: &TransactionMetadata,
        view: &StructuredView,
    ) -> Result<Vec<Record>, ContractError> {
        raw_state(&meta.id, view)
    }
}

/// One row per flattened action, with its position fields
#[derive(Debug, Default, Clone, Copy)]
pub struct ActionTraceState;

impl Extractor for ActionTraceState {
    fn build_trace(
        &self,
        trace: &TransactionTrace,
        view: &StructuredView,
    ) -> Result<Vec<Record>, ContractError> {
        flatten(view)?
            .iter()
            .map(|action| -> Result<Record, ContractError> {
                let key = action.key(&trace.id);
                let mut fields = Map::new();
                put(&mut fields, "primary_key", key.as_str());
                put(&mut fields, "json", to_json_string(&action.to_object())?);
                Ok(Record::new(key, fields))
            })
            .collect()
    }
}
