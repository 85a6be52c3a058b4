//! Catalog entities.

use crate::types::{AuthKind, GroupId, Profile, UserId};
use serde::{Deserialize, Serialize};

/// A user known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    /// User ID.
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Authentication origin.
    pub auth_kind: AuthKind,
    /// Contact address, if known.
    pub email: Option<String>,
}

impl LocalUser {
    /// Returns true if the user was materialized from the directory.
    #[must_use]
    pub fn is_directory_sourced(&self) -> bool {
        self.auth_kind == AuthKind::Ldap
    }
}

/// A catalog group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalGroup {
    /// Group ID.
    pub id: GroupId,
    /// Unique, case-sensitive name.
    pub name: String,
    /// Catalog-owned description.
    pub description: Option<String>,
}

/// Link between a user and a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Membership {
    /// Member.
    pub user_id: UserId,
    /// Group.
    pub group_id: GroupId,
    /// Role held in the group.
    pub profile: Profile,
}
