//! Membership reconciliation for set-valued relationship attributes.

use std::collections::BTreeSet;

/// Tokens to add and remove to turn a current membership into a desired one.
///
/// Both inputs are treated as sets: duplicates collapse and order is
/// irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetDiff {
    /// `desired \ current`
    pub to_add: BTreeSet<String>,
    /// `current \ desired`
    pub to_remove: BTreeSet<String>,
}

impl SetDiff {
    /// Compute the difference between a desired and a current membership.
    pub fn between<D, C, S>(desired: D, current: C) -> Self
    where
        D: IntoIterator<Item = S>,
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let desired: BTreeSet<String> = desired.into_iter().map(Into::into).collect();
        let current: BTreeSet<String> = current.into_iter().map(Into::into).collect();
        Self {
            to_add: desired.difference(&current).cloned().collect(),
            to_remove: current.difference(&desired).cloned().collect(),
        }
    }

    /// Whether the memberships already match.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Tokens to add, in sorted order.
    pub fn additions(&self) -> Vec<String> {
        self.to_add.iter().cloned().collect()
    }

    /// Tokens to remove, in sorted order.
    pub fn removals(&self) -> Vec<String> {
        self.to_remove.iter().cloned().collect()
    }

    /// The membership that results from applying this diff to `current`.
    pub fn apply<'a, C>(&self, current: C) -> BTreeSet<String>
    where
        C: IntoIterator<Item = &'a String>,
    {
        current
            .into_iter()
            .filter(|token| !self.to_remove.contains(*token))
            .cloned()
            .chain(self.to_add.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn set(tokens: &[&str]) -> BTreeSet<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_partial_overlap() {
        let diff = SetDiff::between(["u2", "u3", "u4"], ["u1", "u2", "u3"]);
        assert_eq!(diff.to_add, set(&["u4"]));
        assert_eq!(diff.to_remove, set(&["u1"]));
    }

    #[test]
    fn test_empty_to_populated() {
        let diff = SetDiff::between(vec!["a", "b"], Vec::<&str>::new());
        assert_eq!(diff.to_add, set(&["a", "b"]));
        assert!(diff.to_remove.is_empty());
    }

    #[test]
    fn test_full_teardown() {
        let diff = SetDiff::between(Vec::<&str>::new(), vec!["a", "b"]);
        assert!(diff.to_add.is_empty());
        assert_eq!(diff.to_remove, set(&["a", "b"]));
    }

    #[test]
    fn test_equal_sets_ignore_order_and_duplicates() {
        let diff = SetDiff::between(["b", "a", "a"], ["a", "b"]);
        assert!(diff.is_empty());
    }

    #[test]
    fn test_apply() {
        let current = set(&["u1", "u2", "u3"]);
        let diff = SetDiff::between(["u2", "u3", "u4"], current.iter().map(String::as_str));
        assert_eq!(diff.apply(&current), set(&["u2", "u3", "u4"]));
    }

    fn tokens() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-e]{1,2}", 0..12)
    }

    proptest! {
        #[test]
        fn prop_diff_partitions_membership(desired in tokens(), current in tokens()) {
            let diff = SetDiff::between(desired.clone(), current.clone());
            let desired: BTreeSet<String> = desired.into_iter().collect();
            let current: BTreeSet<String> = current.into_iter().collect();

            prop_assert!(diff.to_add.is_disjoint(&current));
            prop_assert!(diff.to_remove.is_disjoint(&desired));
            prop_assert!(diff.to_add.is_subset(&desired));
            prop_assert!(diff.to_remove.is_subset(&current));
            prop_assert_eq!(diff.apply(&current), desired);
        }

        #[test]
        fn prop_diff_of_equal_sets_is_empty(mut tokens in tokens()) {
            let current = tokens.clone();
            tokens.reverse();
            prop_assert!(SetDiff::between(tokens, current).is_empty());
        }
    }
}
