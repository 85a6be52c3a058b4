//! Catalog fixtures and directory record builders.

use dirsync_catalog::{AuthKind, CatalogStore, LocalUser, Profile};
use dirsync_engine::DirectoryRecord;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Search base used for people in fixtures.
pub const PEOPLE_BASE: &str = "ou=people,dc=example,dc=org";

/// Search base used for groups in fixtures.
pub const GROUPS_BASE: &str = "ou=groups,dc=example,dc=org";

/// Group every seeded directory user belongs to.
pub const DEFAULT_GROUP: &str = "Everyone";

/// A test catalog with automatic cleanup.
pub struct TestCatalog {
    /// The catalog instance.
    pub store: Arc<CatalogStore>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestCatalog {
    /// Creates a new in-memory catalog.
    pub fn memory() -> Self {
        Self {
            store: Arc::new(
                CatalogStore::open_in_memory().expect("Failed to open in-memory catalog"),
            ),
            _temp_dir: None,
        }
    }

    /// Creates a new file-backed catalog in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = CatalogStore::open(temp_dir.path()).expect("Failed to open file catalog");
        Self {
            store: Arc::new(store),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the catalog directory if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self._temp_dir.as_ref().map(TempDir::path)
    }

    /// Adds directory-sourced users, each a member of [`DEFAULT_GROUP`].
    pub fn seed_directory_users(&self, names: &[&str]) -> Vec<LocalUser> {
        self.seed_users(names, AuthKind::Ldap)
    }

    /// Adds users with local credentials, each a member of
    /// [`DEFAULT_GROUP`].
    pub fn seed_local_users(&self, names: &[&str]) -> Vec<LocalUser> {
        self.seed_users(names, AuthKind::Local)
    }

    fn seed_users(&self, names: &[&str], kind: AuthKind) -> Vec<LocalUser> {
        self.store
            .transaction(|t| {
                let group = match t.find_group_by_name(DEFAULT_GROUP) {
                    Some(group) => group.id,
                    None => t.create_group(DEFAULT_GROUP)?.id,
                };
                let mut users = Vec::with_capacity(names.len());
                for name in names {
                    let user = t.create_user(name, kind, None)?;
                    t.add_membership(user.id, group, Profile::RegisteredUser)?;
                    users.push(user);
                }
                Ok(users)
            })
            .expect("Failed to seed users")
    }

    /// Adds groups.
    pub fn seed_groups(&self, names: &[&str]) {
        self.store
            .transaction(|t| {
                for name in names {
                    t.create_group(name)?;
                }
                Ok(())
            })
            .expect("Failed to seed groups");
    }

    /// Sorted usernames of committed users of `kind`.
    pub fn usernames(&self, kind: AuthKind) -> Vec<String> {
        let mut names: Vec<String> = self.store.read_committed(|t| {
            t.users()
                .filter(|u| u.auth_kind == kind)
                .map(|u| u.username.clone())
                .collect()
        });
        names.sort();
        names
    }

    /// Sorted names of committed groups.
    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.store.read_committed(|t| t.groups().map(|g| g.name.clone()).collect());
        names.sort();
        names
    }

    /// Number of committed memberships of a user.
    pub fn membership_count(&self, username: &str) -> usize {
        self.store.read_committed(|t| {
            t.find_user_by_name(username)
                .map_or(0, |u| t.memberships_of(u.id).len())
        })
    }
}

impl std::ops::Deref for TestCatalog {
    type Target = CatalogStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// A person entry under [`PEOPLE_BASE`] with a `uid`.
pub fn person_record(uid: &str) -> DirectoryRecord {
    DirectoryRecord::new(format!("uid={uid},{PEOPLE_BASE}"))
        .with_attribute("uid", [uid])
        .with_attribute("objectClass", ["top", "person"])
}

/// A group entry under [`GROUPS_BASE`] with a `cn`.
pub fn group_record(cn: &str) -> DirectoryRecord {
    DirectoryRecord::new(format!("cn={cn},{GROUPS_BASE}"))
        .with_attribute("cn", [cn])
        .with_attribute("objectClass", ["top", "groupOfNames"])
}

/// A group entry whose identifying value is a raw name such as
/// `cn=Editors,ou=groups`, stored in `description`.
pub fn raw_group_record(raw_name: &str) -> DirectoryRecord {
    DirectoryRecord::new(format!("{raw_name},dc=example,dc=org"))
        .with_attribute("description", [raw_name])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_catalog_seeding() {
        let catalog = TestCatalog::memory();
        catalog.seed_directory_users(&["bob", "alice"]);
        catalog.seed_local_users(&["admin"]);

        assert_eq!(catalog.usernames(AuthKind::Ldap), vec!["alice", "bob"]);
        assert_eq!(catalog.usernames(AuthKind::Local), vec!["admin"]);
        assert_eq!(catalog.group_names(), vec![DEFAULT_GROUP]);
        assert_eq!(catalog.membership_count("alice"), 1);
        assert!(catalog.path().is_none());
    }

    #[test]
    fn file_catalog_has_path() {
        let catalog = TestCatalog::file();
        assert!(catalog.path().unwrap().exists());
        catalog.seed_groups(&["Editors"]);
        assert_eq!(catalog.stats().groups, 1);
    }

    #[test]
    fn record_builders() {
        assert_eq!(person_record("alice").first_value("uid"), Some("alice"));
        assert_eq!(group_record("Editors").first_value("CN"), Some("Editors"));
        assert_eq!(
            raw_group_record("cn=Editors,ou=groups").first_value("description"),
            Some("cn=Editors,ou=groups")
        );
    }
}
