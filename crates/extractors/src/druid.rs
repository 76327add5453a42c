//! Time-series extractors for analytics rollups

use contracts::{ContractError, Extractor, Record, StructuredView, TransactionTrace};
use serde_json::Map;

use crate::asset::Asset;
use crate::filter::ActionFilter;
use crate::flatten::flatten;
use crate::view::{put, str_field};

const TOKEN_TRANSFER: ActionFilter = ActionFilter::new(&["eosio.token"], &["transfer"]);

/// Slim token-transfer events
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
            let mut fields = Map::new();
            put(&mut fields, "transaction_id", trace.id.as_str());
            put(&mut fields, "block_num", trace.block_num);
            put(&mut fields, "block_time", trace.block_time.as_str());

            if let Some(data) = action.data() {
                for field in ["from", "to", "memo"] {
                    if let Some(value) = str_field(data, field) {
                        put(&mut fields, field, value);
                    }
                }
                if let Some(quantity) = str_field(data, "quantity").and_then(Asset::parse) {
                    quantity.write_into(&mut fields);
                }
            }
            records.push(Record::new(action.key(&trace.id), fields));
        }
        Ok(records)
    }
}

/// Resource usage per distinct authorizing actor
///
/// `receiver` is the receiver of the first top-level action. Transactions
/// without a receipt produce nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Resource;

impl Extractor for Resource {
    fn build_trace(
        &self,
        trace: &TransactionTrace,
        _view: &StructuredView,
    ) -> Result<Vec<Record>, ContractError> {
        let Some(receipt) = &trace.receipt else {
            return Ok(Vec::new());
        };

        let mut actors: Vec<&str> = Vec::new();
        for action in &trace.action_traces {
            for level in &action.act.authorization {
                if !actors.contains(&level.actor.as_str()) {
                    actors.push(&level.actor);
                }
            }
        }
        let receiver = trace
            .action_traces
            .first()
            .map(|a| a.receipt.receiver.as_str())
            .unwrap_or_default();

        Ok(actors
            .into_iter()
            .map(|actor| {
                let mut fields = Map::new();
                put(&mut fields, "block_time", trace.block_time.as_str());
                put(&mut fields, "trx", trace.id.as_str());
                put(&mut fields, "cpu_usage_us", receipt.cpu_usage_us);
                put(&mut fields, "net_usage_words", receipt.net_usage_words);
                put(&mut fields, "actor", actor);
                put(&mut fields, "receiver", receiver);
                Record::new(format!("{}|{actor}", trace.id), fields)
            })
            .collect())
    }
}

/// Distinct `actor:receiver:account_name` activity tuples
#[derive(Debug, Default, Clone, Copy)]
pub struct Active;

struct Activity<'a> {
    actor: &'a str,
    receiver: &'a str,
    method: String,
}

impl Activity<'_> {
    fn tag(&self) -> String {
        format!("{}:{}:{}", self.actor, self.receiver, self.method)
    }
}

impl Extractor for Active {
    fn build_trace(
        &self,
        trace: &TransactionTrace,
        _view: &StructuredView,
    ) -> Result<Vec<Record>, ContractError> {
        if trace.receipt.is_none() {
            return Ok(Vec::new());
        }

        let mut seen: Vec<Activity<'_>> = Vec::new();
        for action in &trace.action_traces {
            let method = format!("{}_{}", action.act.account, action.act.name);
            for level in &action.act.authorization {
                let activity = Activity {
                    actor: &level.actor,
                    receiver: &action.receipt.receiver,
                    method: method.clone(),
                };
                if !seen.iter().any(|s| s.tag() == activity.tag()) {
                    seen.push(activity);
                }
            }
        }

        Ok(seen
            .into_iter()
            .map(|activity| {
                let mut fields = Map::new();
                put(&mut fields, "block_time", trace.block_time.as_str());
                put(&mut fields, "trx", trace.id.as_str());
                put(&mut fields, "actor", activity.actor);
                put(&mut fields, "receiver", activity.receiver);
                put(&mut fields, "method", activity.method.as_str());
                Record::new(format!("{}|{}", trace.id, activity.tag()), fields)
            })
            .collect())
    }
}
