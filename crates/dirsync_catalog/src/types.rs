//! Core type definitions for the catalog.

use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a catalog user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u32);

impl UserId {
    /// Creates a new user ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

/// Unique identifier for a catalog group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u32);

impl GroupId {
    /// Creates a new group ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group:{}", self.0)
    }
}

/// Unique identifier for a write transaction.
///
/// Transaction IDs are monotonically increasing per store and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Where a user authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthKind {
    /// Credentials are held by the catalog itself.
    Local,
    /// The user was materialized from the external directory.
    Ldap,
}

impl AuthKind {
    /// Returns the tag stored for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthKind::Local => "local",
            AuthKind::Ldap => "ldap",
        }
    }
}

impl fmt::Display for AuthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role a user holds inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Profile {
    /// Can read group content.
    RegisteredUser,
    /// Can edit group content.
    Editor,
    /// Can review and publish group content.
    Reviewer,
    /// Can manage the group's users.
    UserAdmin,
}

impl Profile {
    /// Returns the canonical profile name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::RegisteredUser => "RegisteredUser",
            Profile::Editor => "Editor",
            Profile::Reviewer => "Reviewer",
            Profile::UserAdmin => "UserAdmin",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "registereduser" => Ok(Profile::RegisteredUser),
            "editor" => Ok(Profile::Editor),
            "reviewer" => Ok(Profile::Reviewer),
            "useradmin" => Ok(Profile::UserAdmin),
            _ => Err(CatalogError::UnknownProfile(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_display() {
        assert_eq!(UserId::new(4).to_string(), "user:4");
        assert_eq!(GroupId::new(9).to_string(), "group:9");
        assert_eq!(TransactionId::new(2).to_string(), "txn:2");
    }

    #[test]
    fn profile_parse_is_case_insensitive() {
        assert_eq!("editor".parse::<Profile>().unwrap(), Profile::Editor);
        assert_eq!("UserAdmin".parse::<Profile>().unwrap(), Profile::UserAdmin);
        assert!(matches!(
            "Administrator".parse::<Profile>(),
            Err(CatalogError::UnknownProfile(_))
        ));
    }
}
