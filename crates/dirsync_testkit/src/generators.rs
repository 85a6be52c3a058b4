//! Property-based test generators using proptest.

use proptest::prelude::*;
use std::collections::BTreeSet;

/// Strategy for generating valid usernames.
pub fn username_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9._-]{0,11}").expect("Invalid regex")
}

/// Strategy for generating sets of distinct usernames.
pub fn username_set_strategy(max: usize) -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(username_strategy(), 0..=max)
}

/// Strategy for generating group names made of word characters.
pub fn group_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][A-Za-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating raw directory group names of the form
/// `cn=<name>,ou=<unit>`.
pub fn raw_group_name_strategy() -> impl Strategy<Value = String> {
    (
        group_name_strategy(),
        prop::string::string_regex("[a-z]{1,8}").expect("Invalid regex"),
    )
        .prop_map(|(name, unit)| format!("cn={name},ou={unit}"))
}

/// Strategy for a catalog/directory user split: directory-sourced catalog
/// users, local catalog users, and the directory's users.
///
/// Local and directory-sourced catalog names never collide.
pub fn user_split_strategy(
    max: usize,
) -> impl Strategy<Value = (BTreeSet<String>, BTreeSet<String>, BTreeSet<String>)> {
    (
        username_set_strategy(max),
        username_set_strategy(max / 2),
        username_set_strategy(max),
    )
        .prop_map(|(catalog, local, directory)| {
            let local = local.difference(&catalog).cloned().collect();
            (catalog, local, directory)
        })
}
