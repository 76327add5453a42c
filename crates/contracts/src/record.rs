//! Record - the atomic output unit of extraction

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Self-describing projection of an event, as returned by the node
pub type StructuredView = Map<String, Value>;

/// `{key, value}` produced by an extractor
///
/// `value` is always a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    pub value: Value,
}

impl Record {
    pub fn new(key: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            key: key.into(),
            value: Value::Object(fields),
        }
    }

    /// The record's `primary_key` field, if it has one
    pub fn primary_key(&self) -> Option<&str> {
        self.value.get("primary_key").and_then(Value::as_str)
    }
}
