//! External table names

/// Derive the external table/topic name for an extractor
///
/// `::` becomes `.`, the first `eosio.` and then the first `data.` are
/// removed, the result is lower-cased and `<prefix>.` is prepended.
pub fn table_name(prefix: &str, extractor: &str) -> String {
    let mut name = extractor.replace("::", ".");
    for token in ["eosio.", "data."] {
        if let Some(pos) = name.find(token) {
            name.replace_range(pos..pos + token.len(), "");
        }
    }
    format!("{prefix}.{}", name.to_lowercase())
}
