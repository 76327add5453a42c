//! Node events - the three event kinds and the four streams that carry them
//!
//! Events are owned by the node and borrowed into the pipeline for the
//! duration of one callback (see [`EventRef`]). [`NodeEvent`] is the owned,
//! stream-tagged form used for replay logs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Block header fields the pipeline reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// ISO-8601 timestamp, e.g. `2019-05-21T10:00:00.000`
    pub timestamp: String,
    pub producer: String,
    #[serde(default)]
    pub previous: String,
}

/// Signed block body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignedBlock {
    #[serde(default)]
    pub transactions: Vec<TransactionReceipt>,
}

/// Receipt of one transaction included in a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub cpu_usage_us: u32,
    #[serde(default)]
    pub net_usage_words: u32,
    pub trx: TransactionRef,
}

/// A block references a transaction either by id or by its packed body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransactionRef {
    Id(String),
    Packed(PackedTransaction),
}

impl TransactionRef {
    /// Transaction id regardless of representation
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Packed(packed) => &packed.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackedTransaction {
    pub id: String,
    #[serde(default)]
    pub signatures: Vec<String>,
    #[serde(default)]
    pub compression: String,
    #[serde(default)]
    pub packed_trx: String,
}

/// Block state as seen on the accepted / irreversible streams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Hex block id
    pub id: String,
    pub block_num: u32,
    pub header: BlockHeader,
    #[serde(default)]
    pub block: SignedBlock,
}

/// Resource usage recorded for an executed transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceReceipt {
    #[serde(default)]
    pub status: String,
    pub cpu_usage_us: u32,
    pub net_usage_words: u32,
}

/// Executed transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionTrace {
    /// Hex transaction id
    pub id: String,
    pub block_num: u32,
    pub block_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<TraceReceipt>,
    #[serde(default)]
    pub elapsed: i64,
    #[serde(default)]
    pub scheduled: bool,
    /// Top-level actions; inline actions hang off each trace
    #[serde(default)]
    pub action_traces: Vec<ActionTrace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub except: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionReceipt {
    pub receiver: String,
    #[serde(default)]
    pub act_digest: String,
    pub global_sequence: u64,
    #[serde(default)]
    pub recv_sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionLevel {
    pub actor: String,
    pub permission: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub account: String,
    pub name: String,
    #[serde(default)]
    pub authorization: Vec<PermissionLevel>,
    /// ABI-decoded payload, opaque to the pipeline
    #[serde(default)]
    pub data: Value,
}

/// One executed action and the inline actions it triggered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionTrace {
    pub receipt: ActionReceipt,
    pub act: Action,
    #[serde(default)]
    pub inline_traces: Vec<ActionTrace>,
    #[serde(default)]
    pub trx_id: String,
    #[serde(default)]
    pub block_num: u32,
    #[serde(default)]
    pub block_time: String,
    #[serde(default)]
    pub elapsed: i64,
    #[serde(default)]
    pub console: String,
}

/// Transaction accepted into the pending state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    pub id: String,
    #[serde(default)]
    pub signed_id: String,
    #[serde(default)]
    pub packed_trx: Value,
    #[serde(default)]
    pub signing_keys: Vec<String>,
    #[serde(default)]
    pub accepted: bool,
}

/// The four node streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStream {
    AcceptedBlock,
    IrreversibleBlock,
    AppliedTransaction,
    AcceptedTransaction,
}

impl EventStream {
    pub const ALL: [EventStream; 4] = [
        EventStream::AcceptedBlock,
        EventStream::IrreversibleBlock,
        EventStream::AppliedTransaction,
        EventStream::AcceptedTransaction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AcceptedBlock => "accepted_block",
            Self::IrreversibleBlock => "irreversible_block",
            Self::AppliedTransaction => "applied_transaction",
            Self::AcceptedTransaction => "accepted_transaction",
        }
    }
}

impl fmt::Display for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Borrowed event handed to extractors
#[derive(Debug, Clone, Copy)]
pub enum EventRef<'a> {
    Block(&'a Block),
    Trace(&'a TransactionTrace),
    Metadata(&'a TransactionMetadata),
}

impl<'a> EventRef<'a> {
    /// Event kind label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Block(_) => "block",
            Self::Trace(_) => "transaction_trace",
            Self::Metadata(_) => "transaction_metadata",
        }
    }

    /// Block height, when the event carries one
    pub fn block_num(&self) -> Option<u32> {
        match self {
            Self::Block(block) => Some(block.block_num),
            Self::Trace(trace) => Some(trace.block_num),
            Self::Metadata(_) => None,
        }
    }
}

/// Owned, stream-tagged event
///
/// Serialized as `{"stream": "...", "event": {...}}`, one per line in replay logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stream", content = "event", rename_all = "snake_case")]
pub enum NodeEvent {
    AcceptedBlock(Block),
    IrreversibleBlock(Block),
    AppliedTransaction(TransactionTrace),
    AcceptedTransaction(TransactionMetadata),
}

impl NodeEvent {
    pub fn stream(&self) -> EventStream {
        match self {
            Self::AcceptedBlock(_) => EventStream::AcceptedBlock,
            Self::IrreversibleBlock(_) => EventStream::IrreversibleBlock,
            Self::AppliedTransaction(_) => EventStream::AppliedTransaction,
            Self::AcceptedTransaction(_) => EventStream::AcceptedTransaction,
        }
    }

    pub fn as_event(&self) -> EventRef<'_> {
        match self {
            Self::AcceptedBlock(block) | Self::IrreversibleBlock(block) => EventRef::Block(block),
            Self::AppliedTransaction(trace) => EventRef::Trace(trace),
            Self::AcceptedTransaction(meta) => EventRef::Metadata(meta),
        }
    }
}
