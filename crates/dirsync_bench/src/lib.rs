//! Shared setup for dirsync benchmarks.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use dirsync_catalog::{AuthKind, CatalogStore, Profile};
use dirsync_engine::DirectoryRecord;
use std::sync::Arc;

/// Search base the benchmark directory answers for.
pub const PEOPLE_BASE: &str = "ou=people,dc=example,dc=org";

/// Username of the `i`-th benchmark user.
pub fn username(i: usize) -> String {
    format!("user{i:06}")
}

/// An in-memory catalog with `users` directory-sourced users, each in
/// `groups_per_user` of `groups` groups.
pub fn seeded_store(users: usize, groups: usize, groups_per_user: usize) -> Arc<CatalogStore> {
    let store = CatalogStore::open_in_memory().expect("Failed to open catalog");
    store
        .transaction(|t| {
            let group_ids = (0..groups)
                .map(|g| t.create_group(&format!("group{g:04}")).map(|g| g.id))
                .collect::<Result<Vec<_>, _>>()?;
            for i in 0..users {
                let user = t.create_user(&username(i), AuthKind::Ldap, None)?;
                for k in 0..groups_per_user.min(groups) {
                    let group = group_ids[(i + k) % groups];
                    t.add_membership(user.id, group, Profile::RegisteredUser)?;
                }
            }
            Ok(())
        })
        .expect("Failed to seed catalog");
    Arc::new(store)
}

/// Directory records for users `0..count`, skipping every `stride`-th one.
pub fn directory_users(count: usize, stride: usize) -> Vec<DirectoryRecord> {
    (0..count)
        .filter(|i| stride == 0 || i % stride != 0)
        .map(|i| {
            let name = username(i);
            DirectoryRecord::new(format!("uid={name},{PEOPLE_BASE}")).with_attribute("uid", [name])
        })
        .collect()
}
