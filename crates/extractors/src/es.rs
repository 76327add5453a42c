//! Search-index extractors
//!
//! Flat documents keyed for idempotent upserts: blocks by id plus a
//! reversibility marker, transactions by id, actions by transaction id plus
//! flattened index.

use contracts::{
    Block, ContractError, Extractor, Record, StructuredView, TransactionTrace,
};
use serde_json::{Map, Value};

use crate::asset::Asset;
use crate::filter::ActionFilter;
use crate::flatten::{flatten, FlatAction, NO_PARENT};
use crate::view::{is_irreversible, put, set_table_suffix, str_field, to_json_string};

/// Block summary; finalized blocks only carry the irreversibility flag
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockInfo;

impl Extractor for BlockInfo {
    fn build_block(&self, block: &Block, view: &StructuredView) -> Result<Vec<Record>, ContractError> {
        let irreversible = is_irreversible(view);
        let mut fields = Map::new();
        put(&mut fields, "primary_key", block.id.as_str());

        if irreversible {
            put(&mut fields, "irreversible", true);
        } else {
            put(&mut fields, "block_id_askey", block.id.as_str());
            put(&mut fields, "previous", block.header.previous.as_str());
            put(&mut fields, "block_num_askey", block.block_num);
            put(&mut fields, "block_time", block.header.timestamp.as_str());
            put(&mut fields, "producer", block.header.producer.as_str());
            put(&mut fields, "trxs_num", block.block.transactions.len());
        }
        set_table_suffix(&mut fields, &block.header.timestamp);

        let marker = if irreversible { 'T' } else { 'F' };
        Ok(vec![Record::new(format!("{}{marker}", block.id), fields)])
    }
}

/// Transaction summary with resource usage
#[derive(Debug, Default, Clone, Copy)]
pub struct Transaction;

impl Extractor for Transaction {
    fn build_trace(
        &self,
        trace: &TransactionTrace,
        _view: &StructuredView,
    ) -> Result<Vec<Record>, ContractError> {
        let mut fields = Map::new();
        put(&mut fields, "block_num_askey", trace.block_num);
        put(&mut fields, "block_time", trace.block_time.as_str());
        put(&mut fields, "primary_key", trace.id.as_str());

        if let Some(receipt) = &trace.receipt {
            put(&mut fields, "cpu_usage_us", receipt.cpu_usage_us);
            put(&mut fields, "net_usage_words", receipt.net_usage_words);
        }
        if let Some(first) = trace.action_traces.first() {
            put(&mut fields, "first_action", first.act.account.as_str());
            if let Some(auth) = first.act.authorization.first() {
                put(&mut fields, "first_actor", auth.actor.as_str());
            }
        }
        set_table_suffix(&mut fields, &trace.block_time);

        Ok(vec![Record::new(format!("{}FB", trace.id), fields)])
    }
}

/// Every action of the transaction, flattened
#[derive(Debug, Default, Clone, Copy)]
pub struct Action;

impl Extractor for Action {
    fn build_trace(
        &self,
        trace: &TransactionTrace,
        view: &StructuredView,
    ) -> Result<Vec<Record>, ContractError> {
        let actions = flatten(view)?;
        let mut records = Vec::with_capacity(actions.len());

        for action in &actions {
            let key = action.key(&trace.id);
            let mut fields = Map::new();
            put(&mut fields, "transaction_id", trace.id.as_str());
            put(&mut fields, "block_time", trace.block_time.as_str());
            put(&mut fields, "block_num", trace.block_num);
            set_table_suffix(&mut fields, &trace.block_time);
            if let Some(account) = action.account() {
                put(&mut fields, "account_askey", account);
            }
            if let Some(name) = action.name() {
                put(&mut fields, "name_askey", name);
            }
            if let Some(receiver) = action.receiver() {
                put(&mut fields, "receiver_askey", receiver);
            }
            put(
                &mut fields,
                "authorization",
                to_json_string(action.authorization().unwrap_or(&Value::Null))?,
            );
            put(&mut fields, "data", to_json_string(&raw_data(action))?);
            if let Some(actor) = action.first_actor() {
                put(&mut fields, "first_actor", actor);
            }
            put(&mut fields, "index_in_transaction", action.index_in_transaction);
            match action.parent_global_sequence {
                Some(parent) => put(&mut fields, "parent_global_sequence", parent),
                None => put(&mut fields, "parent_global_sequence", NO_PARENT),
            }
            put(&mut fields, "primary_key", key.as_str());
            records.push(Record::new(key, fields));
        }
        Ok(records)
    }
}

const TOKEN_TRANSFER: ActionFilter = ActionFilter::new(&["eosio.token"], &["transfer"]);

/// Core token transfers with complete from/to/quantity
#[derive(Debug, Default, Clone, Copy)]
pub struct Transfer;

impl Extractor for Transfer {
    fn build_trace(
        &self,
        trace: &TransactionTrace,
        view: &StructuredView,
    ) -> Result<Vec<Record>, ContractError> {
        let mut records = Vec::new();
        for action in flatten(view)? {
            if !TOKEN_TRANSFER.matches(&action) {
                continue;
            }
            let data = action.data();
            let from = data.and_then(|d| str_field(d, "from"));
            let to = data.and_then(|d| str_field(d, "to"));
            let quantity = data
                .and_then(|d| str_field(d, "quantity"))
                .and_then(Asset::parse);
            let (Some(from), Some(to), Some(quantity)) = (from, to, quantity) else {
                continue;
            };

            let mut fields = movement_fields(trace, &action)?;
            put(&mut fields, "from", from);
            put(&mut fields, "to", to);
            quantity.write_into(&mut fields);
            if let Some(memo) = data.and_then(|d| str_field(d, "memo")) {
                put(&mut fields, "memo", memo);
            }
            records.push(finish(trace, &action, fields));
        }
        Ok(records)
    }
}

const BOS_BANK: ActionFilter = ActionFilter::new(
    &["btc.bos", "eth.bos", "usdt.bos"],
    &["deposit", "withdraw", "transfer"],
);

/// Cross-chain bank movements
///
/// `inoutrecords` names the off-chain side: the `to` of a deposit or the
/// `from` of a withdrawal.
#[derive(Debug, Default, Clone, Copy)]
pub struct BosBank;

impl Extractor for BosBank {
    fn build_trace(
        &self,
        trace: &TransactionTrace,
        view: &StructuredView,
    ) -> Result<Vec<Record>, ContractError> {
        let mut records = Vec::new();
        for action in flatten(view)? {
            if !BOS_BANK.matches(&action) {
                continue;
            }
            let name = action.name().unwrap_or_default();
            let data = action.data();
            let mut fields = movement_fields(trace, &action)?;

            if let Some(from) = data.and_then(|d| str_field(d, "from")) {
                put(&mut fields, "from", from);
                if name == "withdraw" {
                    put(&mut fields, "inoutrecords", from);
                }
            }
            if let Some(to) = data.and_then(|d| str_field(d, "to")) {
                put(&mut fields, "to", to);
                if name == "deposit" {
                    put(&mut fields, "inoutrecords", to);
                }
            }
            write_quantity_and_memo(data, &mut fields);
            records.push(finish(trace, &action, fields));
        }
        Ok(records)
    }
}

const UID_CHARGE: ActionFilter = ActionFilter::new(&["uid"], &["charge"]);

/// Account-service charges, mapped onto the from/to shape
#[derive(Debug, Default, Clone, Copy)]
pub struct Uid;

impl Extractor for Uid {
    fn build_trace(
        &self,
        trace: &TransactionTrace,
        view: &StructuredView,
    ) -> Result<Vec<Record>, ContractError> {
        let mut records = Vec::new();
        for action in flatten(view)? {
            if !UID_CHARGE.matches(&action) {
                continue;
            }
            let data = action.data();
            let mut fields = movement_fields(trace, &action)?;
            if let Some(username) = data.and_then(|d| str_field(d, "username")) {
                put(&mut fields, "from", username);
            }
            if let Some(contract) = data.and_then(|d| str_field(d, "contract")) {
                put(&mut fields, "to", contract);
            }
            write_quantity_and_memo(data, &mut fields);
            records.push(finish(trace, &action, fields));
        }
        Ok(records)
    }
}

/// Account holding assets in transit across the inter-chain bridge
pub const IBC_ACCOUNT: &str = "bosibc.io";

const IBC_TRANSFER: ActionFilter = ActionFilter::new(&[IBC_ACCOUNT, "eosio.token"], &["transfer"]);

/// Transfers into or out of the inter-chain bridge account
#[derive(Debug, Default, Clone, Copy)]
pub struct Ibc;

impl Extractor for Ibc {
    fn build_trace(
        &self,
        trace: &TransactionTrace,
        view: &StructuredView,
    ) -> Result<Vec<Record>, ContractError> {
        let mut records = Vec::new();
        for action in flatten(view)? {
            if !IBC_TRANSFER.matches(&action) {
                continue;
            }
            let data = action.data();
            let from = data.and_then(|d| str_field(d, "from"));
            let to = data.and_then(|d| str_field(d, "to"));
            if from != Some(IBC_ACCOUNT) && to != Some(IBC_ACCOUNT) {
                continue;
            }

            let mut fields = movement_fields(trace, &action)?;
            if let Some(from) = from {
                put(&mut fields, "from", from);
            }
            if let Some(to) = to {
                put(&mut fields, "to", to);
            }
            write_quantity_and_memo(data, &mut fields);
            records.push(finish(trace, &action, fields));
        }
        Ok(records)
    }
}

/// Fields shared by every token-movement document
fn movement_fields(
    trace: &TransactionTrace,
    action: &FlatAction<'_>,
) -> Result<Map<String, Value>, ContractError> {
    let mut fields = Map::new();
    put(&mut fields, "transaction_id", trace.id.as_str());
    put(&mut fields, "block_time", trace.block_time.as_str());
    put(&mut fields, "block_num", trace.block_num);
    set_table_suffix(&mut fields, &trace.block_time);
    put(&mut fields, "account", action.account().unwrap_or_default());
    put(&mut fields, "name", action.name().unwrap_or_default());
    put(&mut fields, "data", to_json_string(&raw_data(action))?);
    Ok(fields)
}

fn write_quantity_and_memo(data: Option<&Map<String, Value>>, fields: &mut Map<String, Value>) {
    if let Some(quantity) = data
        .and_then(|d| str_field(d, "quantity"))
        .and_then(Asset::parse)
    {
        quantity.write_into(fields);
    }
    if let Some(memo) = data.and_then(|d| str_field(d, "memo")) {
        put(fields, "memo", memo);
    }
}

fn finish(trace: &TransactionTrace, action: &FlatAction<'_>, mut fields: Map<String, Value>) -> Record {
    let key = action.key(&trace.id);
    put(&mut fields, "primary_key", key.as_str());
    Record::new(key, fields)
}

fn raw_data(action: &FlatAction<'_>) -> Value {
    action
        .trace
        .get("act")
        .and_then(|act| act.get("data"))
        .cloned()
        .unwrap_or(Value::Null)
}
