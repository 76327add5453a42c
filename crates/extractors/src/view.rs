//! Accessors over structured views
//!
//! Views are untyped JSON; these helpers return `None` for absent or
//! mistyped fields so extractors can omit the derived output.

use chrono::NaiveDateTime;
use contracts::{ContractError, StructuredView};
use serde_json::{Map, Value};

/// Insert one field into a record under construction
pub(crate) fn put(fields: &mut Map<String, Value>, key: &str, value: impl Into<Value>) {
    fields.insert(key.to_string(), value.into());
}

pub(crate) fn object<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    map.get(key).and_then(Value::as_object)
}

pub(crate) fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

/// Whether the dispatcher marked this block view as finalized
pub(crate) fn is_irreversible(view: &StructuredView) -> bool {
    view.get("irreversible")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Serialize a value the way downstream stores expect embedded JSON
pub(crate) fn to_json_string<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, ContractError> {
    Ok(serde_json::to_string(value)?)
}

/// Year+month bucket of a timestamp
///
/// Separators `-` are removed and the result is cut two characters before
/// the `T` date/time separator: `2019-05-21T10:00:00.000` -> `201905`.
/// Returns `None` when there is no `T` past the third character.
pub fn table_suffix(timestamp: &str) -> Option<String> {
    let compact: String = timestamp.chars().filter(|c| *c != '-').collect();
    let pos = compact.find('T')?;
    if pos > 2 {
        compact.get(..pos - 2).map(str::to_string)
    } else {
        None
    }
}

/// Seconds since the Unix epoch of a chain timestamp (UTC, no zone suffix)
pub fn epoch_seconds(timestamp: &str) -> Option<i64> {
    let trimmed = timestamp.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

/// Insert `table_suffix` when the timestamp yields one
pub(crate) fn set_table_suffix(fields: &mut Map<String, Value>, timestamp: &str) {
    if let Some(suffix) = table_suffix(timestamp) {
        fields.insert("table_suffix".into(), Value::String(suffix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_suffix() {
        assert_eq!(
            table_suffix("2019-05-21T10:00:00.000").as_deref(),
            Some("201905")
        );
        assert_eq!(table_suffix("2020-12-01T00:00:00").as_deref(), Some("202012"));
    }

    #[test]
    fn test_table_suffix_malformed() {
        assert_eq!(table_suffix(""), None);
        assert_eq!(table_suffix("2019-05-21 10:00:00"), None);
        assert_eq!(table_suffix("1T"), None);
    }

    #[test]
    fn test_epoch_seconds() {
        assert_eq!(epoch_seconds("1970-01-01T00:01:00.000"), Some(60));
        assert_eq!(epoch_seconds("2019-05-21T10:00:00.500"), Some(1_558_432_800));
        assert_eq!(epoch_seconds("yesterday"), None);
    }
}
