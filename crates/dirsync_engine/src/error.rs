//! Error types for the sync engine.

use dirsync_catalog::CatalogError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a synchronization run.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Required configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Connecting to, binding to, or searching the directory failed.
    #[error("directory protocol error: {message}")]
    DirectoryProtocol {
        /// Error message.
        message: String,
    },

    /// A directory record lacks the identifying attribute.
    #[error("directory record {dn:?} has no {attribute:?} attribute")]
    MissingAttribute {
        /// Distinguished name of the record.
        dn: String,
        /// The attribute that was expected.
        attribute: String,
    },

    /// The local store or its transaction boundary failed.
    #[error("unexpected persistence error: {0}")]
    UnexpectedPersistence(#[from] CatalogError),
}

impl SyncError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a directory protocol error.
    pub fn directory(message: impl Into<String>) -> Self {
        Self::DirectoryProtocol {
            message: message.into(),
        }
    }

    /// Returns true if the error only spoils the phase it happened in.
    ///
    /// Directory failures, missing attributes and catalog constraint
    /// violations are phase-local: the run rolls back and carries on with
    /// its remaining phases. Configuration errors and storage or transaction
    /// failures end the run.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SyncError::DirectoryProtocol { .. } | SyncError::MissingAttribute { .. } => true,
            SyncError::UnexpectedPersistence(e) => e.is_constraint_violation(),
            SyncError::Configuration(_) => false,
        }
    }

    /// Short stable name of the error kind, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Configuration(_) => "configuration",
            SyncError::DirectoryProtocol { .. } => "directory_protocol",
            SyncError::MissingAttribute { .. } => "missing_attribute",
            SyncError::UnexpectedPersistence(_) => "unexpected_persistence",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_errors() {
        assert!(SyncError::directory("search failed").is_recoverable());
        assert!(SyncError::MissingAttribute {
            dn: "cn=x".into(),
            attribute: "uid".into()
        }
        .is_recoverable());
        assert!(SyncError::from(CatalogError::GroupNameTaken {
            name: "Editors".into()
        })
        .is_recoverable());

        assert!(!SyncError::configuration("missing filter").is_recoverable());
        assert!(!SyncError::from(CatalogError::NoActiveTransaction).is_recoverable());
        assert!(!SyncError::from(CatalogError::Locked).is_recoverable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::MissingAttribute {
            dn: "cn=bob,ou=people".into(),
            attribute: "uid".into(),
        };
        assert_eq!(
            err.to_string(),
            "directory record \"cn=bob,ou=people\" has no \"uid\" attribute"
        );
        assert_eq!(err.kind(), "missing_attribute");
    }
}
