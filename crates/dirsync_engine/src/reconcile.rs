//! User and group reconciliation.
//!
//! Both phases compare a complete directory snapshot against the catalog.
//! The directory decides which directory-sourced users may exist and which
//! groups must exist; nothing else in the catalog is touched.

use crate::config::{GroupPhaseContext, RunContext};
use crate::directory::DirectorySession;
use crate::error::SyncResult;
use crate::gateway::PersistenceGateway;
use crate::pattern::{resolve_group_name, GroupNamePattern};
use crate::snapshot::IdentitySnapshot;
use dirsync_catalog::{AuthKind, UserId};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// What the user phase changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserPhaseReport {
    /// Distinct users the directory returned.
    pub directory_users: usize,
    /// Usernames removed from the catalog, sorted.
    pub removed: Vec<String>,
    /// Membership links removed with them.
    pub memberships_removed: usize,
}

/// What the group phase changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupPhaseReport {
    /// Distinct raw group names the directory returned.
    pub directory_groups: usize,
    /// Groups created.
    pub created: Vec<String>,
    /// Groups that already existed.
    pub existing: Vec<String>,
    /// Raw names the pattern did not match.
    pub skipped: Vec<String>,
}

/// Removes directory-sourced users that are not in `snapshot`.
///
/// The removal set is computed up front, then memberships are deleted for
/// the whole set, then the users themselves. An empty snapshot removes every
/// directory-sourced user.
pub fn reconcile_users<G>(
    snapshot: &IdentitySnapshot,
    gateway: &G,
) -> SyncResult<UserPhaseReport>
where
    G: PersistenceGateway + ?Sized,
{
    let mut report = UserPhaseReport {
        directory_users: snapshot.len(),
        ..UserPhaseReport::default()
    };

    let stale = gateway.find_users_by_auth_kind_excluding(AuthKind::Ldap, snapshot.as_set())?;
    if stale.is_empty() {
        return Ok(report);
    }

    let ids: Vec<UserId> = stale.iter().map(|user| user.id).collect();
    report.memberships_removed = gateway.delete_memberships_for_users(&ids)?;
    gateway.delete_users(&ids)?;

    report.removed = stale.into_iter().map(|user| user.username).collect();
    report.removed.sort_unstable();
    for username in &report.removed {
        debug!(username = %username, "removed directory user");
    }
    Ok(report)
}

/// Creates catalog groups for directory groups the catalog lacks.
///
/// Raw names are processed in sorted order. Names the pattern does not
/// match, and names that resolve to blank, are skipped. Existing groups are
/// left untouched and groups are never deleted.
pub fn reconcile_groups<G>(
    raw_names: &IdentitySnapshot,
    pattern: Option<&GroupNamePattern>,
    gateway: &G,
) -> SyncResult<GroupPhaseReport>
where
    G: PersistenceGateway + ?Sized,
{
    let mut report = GroupPhaseReport {
        directory_groups: raw_names.len(),
        ..GroupPhaseReport::default()
    };
    let mut seen = HashSet::new();

    for raw in raw_names.sorted() {
        let Some(name) = resolve_group_name(pattern, raw) else {
            warn!(raw_name = raw, "group record has no usable name, skipping");
            report.skipped.push(raw.to_string());
            continue;
        };
        if !seen.insert(name.clone()) {
            continue;
        }

        if gateway.find_group_by_name(&name)?.is_some() {
            report.existing.push(name);
        } else {
            let group = gateway.create_group(&name)?;
            debug!(group = %group.name, id = %group.id, "created group");
            report.created.push(group.name);
        }
    }
    Ok(report)
}

/// Runs the user phase: search, snapshot, reconcile.
pub fn user_phase<S, G>(
    ctx: &RunContext,
    session: &mut S,
    gateway: &G,
) -> SyncResult<UserPhaseReport>
where
    S: DirectorySession + ?Sized,
    G: PersistenceGateway + ?Sized,
{
    let search = ctx.users();
    let snapshot = IdentitySnapshot::build(session.search(search)?, &search.attribute)?;
    let report = reconcile_users(&snapshot, gateway)?;

    info!(
        directory_users = report.directory_users,
        removed = report.removed.len(),
        memberships_removed = report.memberships_removed,
        "user phase finished"
    );
    Ok(report)
}

/// Runs the group phase: search, snapshot, reconcile.
pub fn group_phase<S, G>(
    ctx: &GroupPhaseContext,
    session: &mut S,
    gateway: &G,
) -> SyncResult<GroupPhaseReport>
where
    S: DirectorySession + ?Sized,
    G: PersistenceGateway + ?Sized,
{
    let raw_names = IdentitySnapshot::build(session.search(&ctx.search)?, &ctx.search.attribute)?;
    let report = reconcile_groups(&raw_names, ctx.pattern.as_ref(), gateway)?;

    info!(
        directory_groups = report.directory_groups,
        created = report.created.len(),
        existing = report.existing.len(),
        skipped = report.skipped.len(),
        "group phase finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_gateway::CatalogGateway;
    use crate::gateway::{GatewayOp, RecordingGateway, TransactionBoundary};
    use dirsync_catalog::{CatalogStore, Profile};
    use std::sync::Arc;

    fn gateway_with(
        ldap: &[&str],
        local: &[&str],
        groups: &[&str],
    ) -> RecordingGateway<CatalogGateway> {
        let store = Arc::new(CatalogStore::open_in_memory().unwrap());
        store
            .transaction(|t| {
                let everyone = t.create_group("Everyone")?;
                for name in ldap {
                    let user = t.create_user(name, AuthKind::Ldap, None)?;
                    t.add_membership(user.id, everyone.id, Profile::RegisteredUser)?;
                }
                for name in local {
                    t.create_user(name, AuthKind::Local, None)?;
                }
                for name in groups {
                    t.create_group(name)?;
                }
                Ok(())
            })
            .unwrap();
        let gw = RecordingGateway::new(CatalogGateway::new(store));
        gw.begin().unwrap();
        gw
    }

    fn usernames(gw: &RecordingGateway<CatalogGateway>, kind: AuthKind) -> Vec<String> {
        gw.inner().store().read(|t| {
            t.users()
                .filter(|u| u.auth_kind == kind)
                .map(|u| u.username.clone())
                .collect()
        })
    }

    #[test]
    fn removes_users_missing_from_directory() {
        let gw = gateway_with(&["alice", "bob", "carol"], &["admin"], &[]);
        let snapshot = IdentitySnapshot::from_names(["alice", "carol"]);

        let report = reconcile_users(&snapshot, &gw).unwrap();
        assert_eq!(report.removed, vec!["bob"]);
        assert_eq!(report.memberships_removed, 1);
        assert_eq!(usernames(&gw, AuthKind::Ldap), vec!["alice", "carol"]);
        assert_eq!(usernames(&gw, AuthKind::Local), vec!["admin"]);
    }

    #[test]
    fn memberships_deleted_before_users() {
        let gw = gateway_with(&["alice", "bob"], &[], &[]);
        reconcile_users(&IdentitySnapshot::from_names(["alice"]), &gw).unwrap();

        let ops = gw.ops();
        let memberships = ops.iter().position(|op| *op == GatewayOp::DeleteMemberships);
        let users = ops.iter().position(|op| *op == GatewayOp::DeleteUsers);
        assert!(memberships.unwrap() < users.unwrap());
    }

    #[test]
    fn empty_snapshot_removes_all_directory_users() {
        let gw = gateway_with(&["alice", "bob"], &["admin"], &[]);
        let report = reconcile_users(&IdentitySnapshot::default(), &gw).unwrap();
        assert_eq!(report.removed, vec!["alice", "bob"]);
        assert!(usernames(&gw, AuthKind::Ldap).is_empty());
        assert_eq!(usernames(&gw, AuthKind::Local), vec!["admin"]);
    }

    #[test]
    fn second_pass_removes_nothing() {
        let gw = gateway_with(&["alice", "bob"], &[], &[]);
        let snapshot = IdentitySnapshot::from_names(["alice"]);
        reconcile_users(&snapshot, &gw).unwrap();

        let report = reconcile_users(&snapshot, &gw).unwrap();
        assert!(report.removed.is_empty());
        assert_eq!(gw.count(GatewayOp::DeleteUsers), 1);
    }

    #[test]
    fn groups_created_from_pattern() {
        let gw = gateway_with(&[], &[], &["Admins"]);
        let raw = IdentitySnapshot::from_names(["cn=Editors,ou=groups", "cn=Viewers,ou=groups"]);
        let pattern = GroupNamePattern::new(r"cn=(\w+),.*").unwrap();

        let report = reconcile_groups(&raw, Some(&pattern), &gw).unwrap();
        assert_eq!(report.created, vec!["Editors", "Viewers"]);
        assert!(report.skipped.is_empty());

        let names: Vec<String> = gw
            .inner()
            .store()
            .read(|t| t.groups().map(|g| g.name.clone()).collect());
        assert_eq!(names, vec!["Everyone", "Admins", "Editors", "Viewers"]);
    }

    #[test]
    fn unmatched_names_skipped() {
        let gw = gateway_with(&[], &[], &[]);
        let raw = IdentitySnapshot::from_names(["cn=Editors,ou=groups", "Printers"]);
        let pattern = GroupNamePattern::new(r"cn=(\w+),.*").unwrap();

        let report = reconcile_groups(&raw, Some(&pattern), &gw).unwrap();
        assert_eq!(report.created, vec!["Editors"]);
        assert_eq!(report.skipped, vec!["Printers"]);
        assert!(gw.find_group_by_name("Printers").unwrap().is_none());
    }

    #[test]
    fn blank_names_skipped_and_work_still_commits() {
        let gw = gateway_with(&["alice", "bob"], &[], &[]);
        reconcile_users(&IdentitySnapshot::from_names(["alice"]), &gw).unwrap();

        let raw = IdentitySnapshot::from_names(["cn=Editors,ou=g", "cn= ,ou=g"]);
        let pattern = GroupNamePattern::new(r"cn=([^,]*),.*").unwrap();
        let report = reconcile_groups(&raw, Some(&pattern), &gw).unwrap();
        assert_eq!(report.created, vec!["Editors"]);
        assert_eq!(report.skipped, vec!["cn= ,ou=g"]);

        let verbatim = reconcile_groups(&IdentitySnapshot::from_names(["  "]), None, &gw).unwrap();
        assert_eq!(verbatim.skipped, vec!["  "]);
        assert_eq!(gw.count(GatewayOp::CreateGroup), 1);

        gw.commit().unwrap();
        let store = gw.inner().store();
        assert!(store.read_committed(|t| t.find_group_by_name("Editors").is_some()));
        assert!(store.read_committed(|t| t.find_user_by_name("bob").is_none()));
    }

    #[test]
    fn verbatim_names_without_pattern() {
        let gw = gateway_with(&[], &[], &[]);
        let raw = IdentitySnapshot::from_names(["cn=Editors,ou=groups"]);
        let report = reconcile_groups(&raw, None, &gw).unwrap();
        assert_eq!(report.created, vec!["cn=Editors,ou=groups"]);
    }

    #[test]
    fn existing_groups_untouched_and_creation_idempotent() {
        let gw = gateway_with(&[], &[], &["Editors"]);
        let raw = IdentitySnapshot::from_names(["Editors", "Viewers"]);

        let first = reconcile_groups(&raw, None, &gw).unwrap();
        assert_eq!(first.created, vec!["Viewers"]);
        assert_eq!(first.existing, vec!["Editors"]);

        let second = reconcile_groups(&raw, None, &gw).unwrap();
        assert!(second.created.is_empty());
        assert_eq!(second.existing, vec!["Editors", "Viewers"]);
        assert_eq!(gw.count(GatewayOp::CreateGroup), 1);
    }

    #[test]
    fn raw_names_resolving_to_same_group_counted_once() {
        let gw = gateway_with(&[], &[], &[]);
        let raw = IdentitySnapshot::from_names(["cn=Editors,ou=a", "cn=Editors,ou=b"]);
        let pattern = GroupNamePattern::new(r"cn=(\w+),.*").unwrap();

        let report = reconcile_groups(&raw, Some(&pattern), &gw).unwrap();
        assert_eq!(report.directory_groups, 2);
        assert_eq!(report.created, vec!["Editors"]);
        assert!(report.existing.is_empty());
    }

    #[test]
    fn group_names_are_case_sensitive() {
        let gw = gateway_with(&[], &[], &["editors"]);
        let report =
            reconcile_groups(&IdentitySnapshot::from_names(["Editors"]), None, &gw).unwrap();
        assert_eq!(report.created, vec!["Editors"]);
    }
}
