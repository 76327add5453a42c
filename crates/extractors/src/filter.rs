//! Action predicates used by domain extractors

use crate::flatten::FlatAction;

/// Allow-lists over (account, action name), plus `receiver == account`
#[derive(Debug, Clone, Copy)]
pub struct ActionFilter {
    pub accounts: &'static [&'static str],
    pub names: &'static [&'static str],
}

impl ActionFilter {
    pub const fn new(accounts: &'static [&'static str], names: &'static [&'static str]) -> Self {
        Self { accounts, names }
    }

    pub fn matches(&self, action: &FlatAction<'_>) -> bool {
        let (Some(account), Some(name), Some(receiver)) =
            (action.account(), action.name(), action.receiver())
        else {
            return false;
        };
        receiver == account && self.accounts.contains(&account) && self.names.contains(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::{flatten, tests::trace};
    use contracts::StructuredView;
    use serde_json::Value;

    const TOKEN: ActionFilter = ActionFilter::new(&["eosio.token"], &["transfer"]);

    #[test]
    fn test_receiver_must_equal_account() {
        let own = trace("eosio.token", "transfer", 1, vec![]);
        let mut notified = trace("eosio.token", "transfer", 2, vec![]);
        notified["receipt"]["receiver"] = Value::from("alice");
        let other_name = trace("eosio.token", "issue", 3, vec![]);

        let mut view = StructuredView::new();
        view.insert("action_traces".into(), Value::Array(vec![own, notified, other_name]));
        let flat = flatten(&view).unwrap();

        let matched: Vec<bool> = flat.iter().map(|a| TOKEN.matches(a)).collect();
        assert_eq!(matched, vec![true, false, false]);
    }
}
