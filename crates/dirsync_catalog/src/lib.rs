//! # dirsync Catalog
//!
//! Local user and group catalog for dirsync.
//!
//! This crate provides:
//! - Users, groups and memberships tables with unique-name indexes
//! - Single-writer transactions (`begin` / `commit` / `rollback`)
//! - Atomic, lock-guarded persistence of the catalog image (CBOR)
//! - An in-memory backend for tests
//!
//! ## Key Invariants
//!
//! - User names and group names are unique (group names are case-sensitive)
//! - A membership never references a missing user or group
//! - Only one write transaction is active at a time
//! - A commit publishes its tables only after the image is durable
//!
//! ## Example
//!
//! ```rust
//! use dirsync_catalog::{AuthKind, CatalogStore};
//!
//! let store = CatalogStore::open_in_memory().unwrap();
//! store
//!     .transaction(|tables| {
//!         tables.create_user("alice", AuthKind::Ldap, None)?;
//!         tables.create_group("Editors")?;
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! assert_eq!(store.stats().ldap_users, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod dir;
mod entity;
mod error;
mod image;
mod stats;
mod store;
mod tables;
mod transaction;
mod types;

pub use backend::{CatalogBackend, InMemoryBackend};
pub use dir::CatalogDir;
pub use entity::{LocalGroup, LocalUser, Membership};
pub use error::{CatalogError, CatalogResult};
pub use image::FORMAT_VERSION;
pub use stats::CatalogStats;
pub use store::CatalogStore;
pub use tables::Tables;
pub use transaction::{Transaction, TransactionState};
pub use types::{AuthKind, GroupId, Profile, TransactionId, UserId};
