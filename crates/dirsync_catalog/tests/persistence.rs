//! File-backed catalog tests.

use dirsync_catalog::{AuthKind, CatalogError, CatalogStore, Profile};
use proptest::prelude::*;
use std::collections::HashSet;
use tempfile::TempDir;

#[test]
fn committed_state_survives_reopen() {
    let temp = TempDir::new().unwrap();

    {
        let store = CatalogStore::open(temp.path()).unwrap();
        store
            .transaction(|t| {
                let alice = t.create_user("alice", AuthKind::Ldap, Some("alice@example.org".into()))?;
                let editors = t.create_group("Editors")?;
                t.set_group_description(editors.id, Some("Metadata editors".into()))?;
                t.add_membership(alice.id, editors.id, Profile::Editor)?;
                Ok(())
            })
            .unwrap();
    }

    let store = CatalogStore::open(temp.path()).unwrap();
    store.read_committed(|t| {
        let alice = t.find_user_by_name("alice").unwrap();
        assert_eq!(alice.email.as_deref(), Some("alice@example.org"));
        let editors = t.find_group_by_name("Editors").unwrap();
        assert_eq!(editors.description.as_deref(), Some("Metadata editors"));
        assert_eq!(t.memberships_of(alice.id).len(), 1);
    });
}

#[test]
fn rolled_back_work_is_not_persisted() {
    let temp = TempDir::new().unwrap();

    {
        let store = CatalogStore::open(temp.path()).unwrap();
        store.begin().unwrap();
        store
            .in_transaction(|t| t.create_group("Scratch"))
            .unwrap();
        store.rollback().unwrap();
    }

    let store = CatalogStore::open(temp.path()).unwrap();
    assert_eq!(store.stats().groups, 0);
}

#[test]
fn uncommitted_work_is_lost_on_drop() {
    let temp = TempDir::new().unwrap();

    {
        let store = CatalogStore::open(temp.path()).unwrap();
        store.begin().unwrap();
        store
            .in_transaction(|t| t.create_user("ghost", AuthKind::Ldap, None))
            .unwrap();
    }

    let store = CatalogStore::open(temp.path()).unwrap();
    assert_eq!(store.stats().users(), 0);
}

#[test]
fn concurrent_open_is_rejected() {
    let temp = TempDir::new().unwrap();
    let _store = CatalogStore::open(temp.path()).unwrap();
    assert!(matches!(
        CatalogStore::open(temp.path()),
        Err(CatalogError::Locked)
    ));
}

#[test]
fn corrupted_image_is_rejected() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("catalog.cbor"), b"not cbor at all").unwrap();
    assert!(matches!(
        CatalogStore::open(temp.path()),
        Err(CatalogError::InvalidFormat { .. })
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn exclusion_query_matches_set_difference(
        ldap in prop::collection::hash_set("[a-z]{1,6}", 0..20),
        keep in prop::collection::hash_set("[a-z]{1,6}", 0..20),
    ) {
        let store = CatalogStore::open_in_memory().unwrap();
        store.transaction(|t| {
            for name in &ldap {
                t.create_user(name, AuthKind::Ldap, None)?;
            }
            Ok(())
        }).unwrap();

        let found: HashSet<String> = store.read_committed(|t| {
            t.find_users_by_auth_kind_excluding(AuthKind::Ldap, &keep)
                .into_iter()
                .map(|u| u.username)
                .collect()
        });
        let expected: HashSet<String> = ldap.difference(&keep).cloned().collect();
        prop_assert_eq!(found, expected);
    }
}
