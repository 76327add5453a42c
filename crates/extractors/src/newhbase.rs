//! Wide-column extractors with family-qualified columns
//!
//! Column names are `family:qualifier`; the raw view goes to `origin:json`
//! and derived attributes to the `info` family.

use contracts::{Block, ContractError, Extractor, Record, StructuredView};
use serde_json::Map;

use crate::view::{is_irreversible, put, set_table_suffix, to_json_string};

/// Reversible blocks with their transaction ids
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockState;

impl Extractor for BlockState {
    fn build_block(&self, block: &Block, view: &StructuredView) -> Result<Vec<Record>, ContractError> {
        if is_irreversible(view) {
            return Ok(Vec::new());
        }
        let trxs: Vec<&str> = block
            .block
            .transactions
            .iter()
            .map(|receipt| receipt.trx.id())
            .collect();

        let mut fields = Map::new();
        set_table_suffix(&mut fields, &block.header.timestamp);
        put(&mut fields, "primary_key", block.id.as_str());
        put(&mut fields, "origin:json", to_json_string(view)?);
        put(&mut fields, "info:block_id", block.id.as_str());
        put(&mut fields, "info:block_num", block.block_num);
        put(&mut fields, "info:block_time", block.header.timestamp.as_str());
        put(&mut fields, "info:trxs", to_json_string(&trxs)?);
        Ok(vec![Record::new(block.id.clone(), fields)])
    }
}

/// Transactions keyed by height then id so rows sort by block
#[derive(Debug, Default, Clone, Copy)]
pub struct TransactionTrace;

impl Extractor for TransactionTrace {
    fn build_trace(
        &self,
        trace: &contracts::TransactionTrace,
        view: &StructuredView,
    ) -> Result<Vec<Record>, ContractError> {
        let mut fields = Map::new();
        put(
            &mut fields,
            "primary_key",
            format!("{:08x} {}", trace.block_num, trace.id),
        );
        set_table_suffix(&mut fields, &trace.block_time);
        put(&mut fields, "origin:json", to_json_string(view)?);
        put(&mut fields, "info:block_num", trace.block_num);
        put(&mut fields, "info:block_time", trace.block_time.as_str());
        put(&mut fields, "info:action_num", trace.action_traces.len());
        Ok(vec![Record::new(trace.id.clone(), fields)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{block, block_view, token_action, trace_at, transaction_view};
    use serde_json::Value;

    #[test]
    fn test_block_state_columns() {
        let b = block(7);
        assert!(BlockState.build_block(&b, &block_view(&b, true)).unwrap().is_empty());

        let records = BlockState.build_block(&b, &block_view(&b, false)).unwrap();
        let doc = &records[0].value;
        assert_eq!(doc["table_suffix"], "201905");
        assert_eq!(doc["info:block_num"], 7);

        let trxs: Vec<String> = serde_json::from_str(doc["info:trxs"].as_str().unwrap()).unwrap();
        assert_eq!(trxs, vec!["11".repeat(32), "22".repeat(32)]);
    }

    #[test]
    fn test_transaction_primary_key_sorts_by_height() {
        let mut root = token_action("eosio.token", "transfer", "eosio.token", 1);
        root.inline_traces
            .push(token_action("eosio.token", "transfer", "alice", 2));
        let trace = trace_at(255, vec![root]);

        let records = TransactionTrace
            .build_trace(&trace, &transaction_view(&trace))
            .unwrap();
        let doc = &records[0].value;
        assert_eq!(doc["primary_key"], format!("000000ff {}", trace.id));
        assert_eq!(doc["info:action_num"], 1);
        assert!(matches!(doc["origin:json"], Value::String(_)));
        assert_eq!(records[0].key, trace.id);
    }

    #[test]
    fn test_action_num_ignores_malformed_inline_tree() {
        let mut root = token_action("eosio.token", "transfer", "eosio.token", 1);
        root.inline_traces
            .push(token_action("eosio.token", "transfer", "alice", 2));
        let trace = trace_at(9, vec![root]);

        let mut view = transaction_view(&trace);
        view["action_traces"][0]["receipt"]
            .as_object_mut()
            .unwrap()
            .remove("global_sequence");

        let records = TransactionTrace.build_trace(&trace, &view).unwrap();
        assert_eq!(records[0].value["info:action_num"], 1);
    }
}
