//! # dirsync Engine
//!
//! Directory reconciliation engine and sync job driver.
//!
//! This crate provides:
//! - Directory search abstraction with an LDAP implementation
//! - Identity snapshots built from search results
//! - Group-name extraction patterns
//! - User and group reconciliation phases
//! - A job driver that runs both phases inside one transaction
//! - A persistence gateway over the local catalog
//!
//! ## Architecture
//!
//! One run follows a fixed order:
//! 1. Validate the configuration into an immutable [`RunContext`]
//! 2. Open a read-only directory session
//! 3. Begin a catalog transaction
//! 4. User phase: remove directory-sourced users missing from the directory
//! 5. Group phase (optional): create groups the directory has and the catalog lacks
//! 6. Commit if the transaction survived, then close the session
//!
//! ## Key Invariants
//!
//! - The directory is authoritative for existence
//! - A failed search is never mistaken for an empty directory
//! - Memberships are removed before the users they reference
//! - Groups are never deleted by a sync
//! - The directory session is closed on every exit path
//! - No commit follows a rollback of the same transaction
//! - A run never returns an error; its outcome is a [`RunReport`]

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod catalog_gateway;
mod config;
mod directory;
mod error;
mod gateway;
mod job;
mod ldap;
mod pattern;
mod reconcile;
mod snapshot;

pub use catalog_gateway::CatalogGateway;
pub use config::{
    DirectoryConfig, GroupPhaseContext, RunContext, SearchScope, SearchSpec, SyncJobConfig,
};
pub use directory::{
    DirectoryConnector, DirectoryRecord, DirectorySession, MockDirectory, MockSession,
    RecordStream, SessionGuard,
};
pub use error::{SyncError, SyncResult};
pub use gateway::{
    GatewayCall, GatewayOp, PersistenceGateway, RecordingGateway, SyncStore, TransactionBoundary,
};
pub use job::{JobState, JobStats, PhaseOutcome, RunReport, SyncJob, TransactionOutcome};
pub use ldap::{LdapDirectory, LdapSession};
pub use pattern::{resolve_group_name, GroupNamePattern};
pub use reconcile::{
    group_phase, reconcile_groups, reconcile_users, user_phase, GroupPhaseReport,
    UserPhaseReport,
};
pub use snapshot::IdentitySnapshot;
