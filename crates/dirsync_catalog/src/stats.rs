//! Catalog statistics.

use serde::Serialize;

/// Row counts of a catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    /// Users with local credentials.
    pub local_users: usize,
    /// Users materialized from the directory.
    pub ldap_users: usize,
    /// Number of groups.
    pub groups: usize,
    /// Number of membership links.
    pub memberships: usize,
}

impl CatalogStats {
    /// Total number of users.
    #[must_use]
    pub fn users(&self) -> usize {
        self.local_users + self.ldap_users
    }
}
