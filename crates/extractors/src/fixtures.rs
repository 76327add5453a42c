//! Event fixtures for tests and local experiments
//!
//! Shapes follow what a node emits; values are fixed so records built from
//! them are stable across runs.

use contracts::{
    project, Action, ActionReceipt, ActionTrace, Block, BlockHeader, EventRef, PermissionLevel,
    SignedBlock, StructuredView, TraceReceipt, TransactionMetadata, TransactionReceipt,
    TransactionRef, TransactionTrace, PackedTransaction,
};
use serde_json::{json, Value};

pub const BLOCK_TIME: &str = "2019-05-21T10:00:00.000";

/// Block at `block_num` with two transactions (one by id, one packed)
pub fn block(block_num: u32) -> Block {
    Block {
        id: format!("{block_num:08x}{}", "ab".repeat(28)),
        block_num,
        header: BlockHeader {
            timestamp: BLOCK_TIME.to_string(),
            producer: "bp.one".to_string(),
            previous: format!("{:08x}{}", block_num.saturating_sub(1), "ab".repeat(28)),
        },
        block: SignedBlock {
            transactions: vec![
                TransactionReceipt {
                    status: "executed".to_string(),
                    cpu_usage_us: 120,
                    net_usage_words: 16,
                    trx: TransactionRef::Id("11".repeat(32)),
                },
                TransactionReceipt {
                    status: "executed".to_string(),
                    cpu_usage_us: 300,
                    net_usage_words: 20,
                    trx: TransactionRef::Packed(PackedTransaction {
                        id: "22".repeat(32),
                        signatures: vec![],
                        compression: "none".to_string(),
                        packed_trx: String::new(),
                    }),
                },
            ],
        },
    }
}

/// Structured view of a block, marked the way the dispatcher marks it
pub fn block_view(block: &Block, irreversible: bool) -> StructuredView {
    let mut view = project(EventRef::Block(block)).unwrap_or_default();
    view.insert("irreversible".into(), Value::Bool(irreversible));
    view
}

/// Token-style action authorized by `alice`
///
/// Data carries `alice -> bob, 1.5000 EOS`.
pub fn token_action(account: &str, name: &str, receiver: &str, global_sequence: u64) -> ActionTrace {
    ActionTrace {
        receipt: ActionReceipt {
            receiver: receiver.to_string(),
            act_digest: String::new(),
            global_sequence,
            recv_sequence: global_sequence,
        },
        act: Action {
            account: account.to_string(),
            name: name.to_string(),
            authorization: vec![PermissionLevel {
                actor: "alice".to_string(),
                permission: "active".to_string(),
            }],
            data: json!({
                "from": "alice",
                "to": "bob",
                "quantity": "1.5000 EOS",
                "memo": "hi",
            }),
        },
        inline_traces: Vec::new(),
        trx_id: String::new(),
        block_num: 100,
        block_time: BLOCK_TIME.to_string(),
        elapsed: 0,
        console: String::new(),
    }
}

/// Executed transaction at height 100 with the given top-level actions
pub fn trace_with(actions: Vec<ActionTrace>) -> TransactionTrace {
    trace_at(100, actions)
}

/// Executed transaction at `block_num`
pub fn trace_at(block_num: u32, mut actions: Vec<ActionTrace>) -> TransactionTrace {
    let id = format!("{block_num:08x}{}", "cd".repeat(28));
    fn stamp(trace: &mut ActionTrace, id: &str, block_num: u32) {
        trace.trx_id = id.to_string();
        trace.block_num = block_num;
        for inline in &mut trace.inline_traces {
            stamp(inline, id, block_num);
        }
    }
    for action in &mut actions {
        stamp(action, &id, block_num);
    }
    TransactionTrace {
        id,
        block_num,
        block_time: BLOCK_TIME.to_string(),
        receipt: Some(TraceReceipt {
            status: "executed".to_string(),
            cpu_usage_us: 120,
            net_usage_words: 16,
        }),
        elapsed: 0,
        scheduled: false,
        action_traces: actions,
        except: None,
    }
}

pub fn transaction_view(trace: &TransactionTrace) -> StructuredView {
    project(EventRef::Trace(trace)).unwrap_or_default()
}

pub fn metadata(id: &str) -> TransactionMetadata {
    TransactionMetadata {
        id: id.to_string(),
        signed_id: format!("{id}-signed"),
        packed_trx: Value::Null,
        signing_keys: vec!["EOS6MRyAjQq8ud7hVNYcfnVPJqcVpscN5So8BhtHuGYqET5GDW5CV".to_string()],
        accepted: true,
    }
}
