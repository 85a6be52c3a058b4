//! Error types for the catalog store.

use std::io;
use thiserror::Error;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur in catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The catalog image could not be encoded.
    #[error("encode error: {message}")]
    Encode {
        /// Description of the failure.
        message: String,
    },

    /// The catalog image is corrupted or has an unsupported format.
    #[error("invalid catalog format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Another process holds the catalog directory lock.
    #[error("catalog locked: another process has exclusive access")]
    Locked,

    /// A write transaction is already active.
    #[error("a write transaction is already active ({txid})")]
    TransactionInProgress {
        /// The active transaction.
        txid: String,
    },

    /// The operation needs an active write transaction.
    #[error("no active transaction")]
    NoActiveTransaction,

    /// The user name is already in use.
    #[error("user name already taken: {username}")]
    UserNameTaken {
        /// The conflicting name.
        username: String,
    },

    /// The group name is already in use.
    #[error("group name already taken: {name}")]
    GroupNameTaken {
        /// The conflicting name.
        name: String,
    },

    /// A user or group name is not acceptable.
    #[error("invalid name: {message}")]
    InvalidName {
        /// Why the name was rejected.
        message: String,
    },

    /// User not found.
    #[error("user not found: {id}")]
    UserNotFound {
        /// The missing user ID.
        id: u32,
    },

    /// Group not found.
    #[error("group not found: {id}")]
    GroupNotFound {
        /// The missing group ID.
        id: u32,
    },

    /// A user cannot be deleted while memberships still reference it.
    #[error("user {user_id} still has {count} membership(s)")]
    MembershipsRemain {
        /// The user that is still referenced.
        user_id: u32,
        /// Number of remaining membership links.
        count: usize,
    },

    /// Unknown membership profile name.
    #[error("unknown profile: {0}")]
    UnknownProfile(String),
}

impl CatalogError {
    /// Creates an encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid name error.
    pub fn invalid_name(message: impl Into<String>) -> Self {
        Self::InvalidName {
            message: message.into(),
        }
    }

    /// Returns true if the error is caused by the caller's data rather than
    /// the storage layer.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            CatalogError::UserNameTaken { .. }
                | CatalogError::GroupNameTaken { .. }
                | CatalogError::InvalidName { .. }
                | CatalogError::UserNotFound { .. }
                | CatalogError::GroupNotFound { .. }
                | CatalogError::MembershipsRemain { .. }
        )
    }
}
