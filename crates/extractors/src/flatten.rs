//! Breadth-first flattening of a transaction's action tree
//!
//! Top-level traces come first, indexed from 0 with no parent. Then the queue
//! is drained: each dequeued trace hands out the next indices to its inline
//! traces, links them to its own `receipt.global_sequence`, and enqueues
//! those that have inline traces of their own. Work is linear in the number
//! of actions and independent of tree depth.

use std::collections::VecDeque;
use std::fmt::Write;

use contracts::{ContractError, StructuredView};
use serde_json::{Map, Value};

use crate::view::{object, str_field};

/// Marker written in place of a parent sequence for top-level actions
pub const NO_PARENT: i64 = -1;

/// One action in flattened order
#[derive(Debug, Clone, Copy)]
pub struct FlatAction<'a> {
    pub index_in_transaction: u32,
    /// Global sequence of the parent action; `None` for top-level actions
    pub parent_global_sequence: Option<u64>,
    pub trace: &'a Map<String, Value>,
}

impl<'a> FlatAction<'a> {
    pub fn account(&self) -> Option<&'a str> {
        object(self.trace, "act").and_then(|act| str_field(act, "account"))
    }

    pub fn name(&self) -> Option<&'a str> {
        object(self.trace, "act").and_then(|act| str_field(act, "name"))
    }

    pub fn receiver(&self) -> Option<&'a str> {
        object(self.trace, "receipt").and_then(|receipt| str_field(receipt, "receiver"))
    }

    pub fn data(&self) -> Option<&'a Map<String, Value>> {
        object(self.trace, "act").and_then(|act| object(act, "data"))
    }

    pub fn authorization(&self) -> Option<&'a Value> {
        object(self.trace, "act").and_then(|act| act.get("authorization"))
    }

    /// Actor of the first authorization entry
    pub fn first_actor(&self) -> Option<&'a str> {
        self.authorization()
            .and_then(Value::as_array)
            .and_then(|auth| auth.first())
            .and_then(Value::as_object)
            .and_then(|level| str_field(level, "actor"))
    }

    /// Record key: transaction id followed by the little-endian index bytes
    pub fn key(&self, transaction_id: &str) -> String {
        action_key(transaction_id, self.index_in_transaction)
    }

    /// The trace with its position fields attached
    pub fn to_object(&self) -> Map<String, Value> {
        let mut obj = self.trace.clone();
        obj.insert(
            "index_in_transaction".into(),
            Value::from(self.index_in_transaction),
        );
        obj.insert(
            "parent_global_sequence".into(),
            match self.parent_global_sequence {
                Some(seq) => Value::from(seq),
                None => Value::from(NO_PARENT),
            },
        );
        obj
    }
}

/// `transaction_id` followed by two lowercase hex digits per little-endian
/// byte of `index`
pub fn action_key(transaction_id: &str, index: u32) -> String {
    let mut key = String::with_capacity(transaction_id.len() + 8);
    key.push_str(transaction_id);
    for byte in index.to_le_bytes() {
        let _ = write!(key, "{byte:02x}");
    }
    key
}

/// Flatten `view.action_traces` breadth-first
///
/// A view without `action_traces` has no actions. Non-object traces and
/// parents lacking a global sequence are structural errors.
pub fn flatten(view: &StructuredView) -> Result<Vec<FlatAction<'_>>, ContractError> {
    let top = match view.get("action_traces") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(traces)) => traces,
        Some(_) => {
            return Err(ContractError::malformed(
                "action_traces",
                "expected an array",
            ))
        }
    };

    let mut flat: Vec<FlatAction<'_>> = Vec::with_capacity(top.len());
    let mut todo: VecDeque<&Map<String, Value>> = VecDeque::new();

    for trace in top {
        let trace = as_trace(trace)?;
        flat.push(FlatAction {
            index_in_transaction: next_index(flat.len())?,
            parent_global_sequence: None,
            trace,
        });
        if !inline_traces(trace).is_empty() {
            todo.push_back(trace);
        }
    }

    while let Some(parent) = todo.pop_front() {
        let parent_sequence = global_sequence(parent)?;
        for child in inline_traces(parent) {
            let child = as_trace(child)?;
            flat.push(FlatAction {
                index_in_transaction: next_index(flat.len())?,
                parent_global_sequence: Some(parent_sequence),
                trace: child,
            });
            if !inline_traces(child).is_empty() {
                todo.push_back(child);
            }
        }
    }

    Ok(flat)
}

fn as_trace(value: &Value) -> Result<&Map<String, Value>, ContractError> {
    value
        .as_object()
        .ok_or_else(|| ContractError::malformed("action_traces[]", "expected an object"))
}

fn inline_traces(trace: &Map<String, Value>) -> &[Value] {
    trace
        .get("inline_traces")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn global_sequence(trace: &Map<String, Value>) -> Result<u64, ContractError> {
    let raw = object(trace, "receipt").and_then(|receipt| receipt.get("global_sequence"));
    match raw {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        ContractError::malformed(
            "receipt.global_sequence",
            "parent action has no usable global sequence",
        )
    })
}

fn next_index(len: usize) -> Result<u32, ContractError> {
    u32::try_from(len)
        .map_err(|_| ContractError::malformed("action_traces", "more than u32::MAX actions"))
}
