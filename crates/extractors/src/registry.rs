//! Name → extractor table

use std::collections::BTreeMap;
use std::sync::Arc;

use contracts::Extractor;

use crate::{druid, es, hbase, newhbase};

/// Extractors indexed by registered name (`namespace::Name`)
///
/// Built once at startup and shared read-only afterwards.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    entries: BTreeMap<String, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every extractor shipped with this crate
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry
            .register("es::BlockInfo", es::BlockInfo)
            .register("es::Transaction", es::Transaction)
            .register("es::Action", es::Action)
            .register("es::Transfer", es::Transfer)
            .register("es::BosBank", es::BosBank)
            .register("es::Uid", es::Uid)
            .register("es::Ibc", es::Ibc)
            .register("druid::Transfer", druid::Transfer)
            .register("druid::Resource", druid::Resource)
            .register("druid::Active", druid::Active)
            .register("hbase::IrreversibleBlockState", hbase::IrreversibleBlockState)
            .register("hbase::ReversibleBlockState", hbase::ReversibleBlockState)
            .register("hbase::TransactionTrace", hbase::TransactionTraceState)
            .register("hbase::TransactionMetadata", hbase::TransactionMetadataState)
            .register("hbase::ActionTrace", hbase::ActionTraceState)
            .register("newhbase::BlockState", newhbase::BlockState)
            .register("newhbase::TransactionTrace", newhbase::TransactionTrace);
        registry
    }

    /// Add or replace an entry
    pub fn register(
        &mut self,
        name: impl Into<String>,
        extractor: impl Extractor + 'static,
    ) -> &mut Self {
        self.entries.insert(name.into(), Arc::new(extractor));
        self
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn Extractor>> {
        self.entries.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Extractor>)> {
        self.entries.iter().map(|(name, ex)| (name.as_str(), ex))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let registry = ExtractorRegistry::builtin();
        assert_eq!(registry.len(), 17);
        assert!(registry.find("es::Transfer").is_some());
        assert!(registry.find("newhbase::TransactionTrace").is_some());
        assert!(registry.find("es::transfer").is_none());
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ExtractorRegistry::new();
        registry.register("x", es::Transfer).register("x", druid::Transfer);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["x"]);
    }
}
