//! Catalog-backed persistence gateway.
//!
//! Lookups see the active transaction's working set, so a phase observes its
//! own earlier writes. Mutations require an active transaction.

use crate::error::SyncResult;
use crate::gateway::{PersistenceGateway, TransactionBoundary};
use dirsync_catalog::{AuthKind, CatalogStore, LocalGroup, LocalUser, UserId};
use std::collections::HashSet;
use std::sync::Arc;

/// A persistence gateway over a [`CatalogStore`].
///
/// # Example
///
/// ```rust
/// use dirsync_catalog::CatalogStore;
/// use dirsync_engine::{CatalogGateway, PersistenceGateway, TransactionBoundary};
/// use std::sync::Arc;
///
/// let store = Arc::new(CatalogStore::open_in_memory().unwrap());
/// let gateway = CatalogGateway::new(Arc::clone(&store));
///
/// gateway.begin().unwrap();
/// gateway.create_group("Editors").unwrap();
/// gateway.commit().unwrap();
/// assert_eq!(store.stats().groups, 1);
/// ```
#[derive(Debug, Clone)]
pub struct CatalogGateway {
    store: Arc<CatalogStore>,
}

impl CatalogGateway {
    /// Creates a gateway over a shared store.
    pub fn new(store: Arc<CatalogStore>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }
}

impl PersistenceGateway for CatalogGateway {
    fn find_users_by_auth_kind_excluding(
        &self,
        kind: AuthKind,
        excluded: &HashSet<String>,
    ) -> SyncResult<Vec<LocalUser>> {
        Ok(self
            .store
            .read(|t| t.find_users_by_auth_kind_excluding(kind, excluded)))
    }

    fn delete_memberships_for_users(&self, ids: &[UserId]) -> SyncResult<usize> {
        Ok(self
            .store
            .in_transaction(|t| Ok(t.delete_memberships_for_users(ids)))?)
    }

    fn delete_users(&self, ids: &[UserId]) -> SyncResult<usize> {
        Ok(self.store.in_transaction(|t| t.delete_users(ids))?)
    }

    fn find_group_by_name(&self, name: &str) -> SyncResult<Option<LocalGroup>> {
        Ok(self.store.read(|t| t.find_group_by_name(name).cloned()))
    }

    fn create_group(&self, name: &str) -> SyncResult<LocalGroup> {
        Ok(self.store.in_transaction(|t| t.create_group(name))?)
    }
}

impl TransactionBoundary for CatalogGateway {
    fn begin(&self) -> SyncResult<()> {
        self.store.begin()?;
        Ok(())
    }

    fn commit(&self) -> SyncResult<()> {
        self.store.commit()?;
        Ok(())
    }

    fn rollback(&self) -> SyncResult<()> {
        self.store.rollback()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use dirsync_catalog::{CatalogError, Profile};

    fn seeded() -> CatalogGateway {
        let store = Arc::new(CatalogStore::open_in_memory().unwrap());
        store
            .transaction(|t| {
                let alice = t.create_user("alice", AuthKind::Ldap, None)?;
                t.create_user("admin", AuthKind::Local, None)?;
                let editors = t.create_group("Editors")?;
                t.add_membership(alice.id, editors.id, Profile::Editor)?;
                Ok(())
            })
            .unwrap();
        CatalogGateway::new(store)
    }

    #[test]
    fn mutations_need_a_transaction() {
        let gw = seeded();
        let err = gw.create_group("Viewers").unwrap_err();
        assert!(matches!(
            err,
            SyncError::UnexpectedPersistence(CatalogError::NoActiveTransaction)
        ));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn lookups_see_working_set() {
        let gw = seeded();
        gw.begin().unwrap();
        gw.create_group("Viewers").unwrap();
        assert!(gw.find_group_by_name("Viewers").unwrap().is_some());
        gw.rollback().unwrap();
        assert!(gw.find_group_by_name("Viewers").unwrap().is_none());
    }

    #[test]
    fn find_excludes_local_users() {
        let gw = seeded();
        let users = gw
            .find_users_by_auth_kind_excluding(AuthKind::Ldap, &HashSet::new())
            .unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "alice");
    }

    #[test]
    fn user_delete_requires_memberships_gone() {
        let gw = seeded();
        let alice = gw.store().read(|t| t.find_user_by_name("alice").cloned()).unwrap();

        gw.begin().unwrap();
        let err = gw.delete_users(&[alice.id]).unwrap_err();
        assert!(err.is_recoverable());

        assert_eq!(gw.delete_memberships_for_users(&[alice.id]).unwrap(), 1);
        assert_eq!(gw.delete_users(&[alice.id]).unwrap(), 1);
        gw.commit().unwrap();
        assert_eq!(gw.store().stats().ldap_users, 0);
    }

    #[test]
    fn commit_without_begin_fails() {
        let gw = seeded();
        assert!(gw.commit().is_err());
        assert!(gw.rollback().is_err());
    }
}
