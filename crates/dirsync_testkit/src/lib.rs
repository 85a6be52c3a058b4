//! # dirsync Testkit
//!
//! Test utilities for dirsync.
//!
//! This crate provides:
//! - Catalog fixtures (in-memory and file-backed) and seeding helpers
//! - Directory record builders and a scripted-directory scenario harness
//! - Property-based test generators using proptest
//! - Log capture for asserting on emitted log lines
//!
//! ## Usage
//!
//! ```rust
//! use dirsync_testkit::prelude::*;
//!
//! let scenario = SyncScenario::new()
//!     .with_catalog_users(&["alice", "bob"])
//!     .with_directory_users(&["alice"]);
//! let report = scenario.run();
//! assert_eq!(report.removed_users(), &["bob".to_string()]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logs;
pub mod scenario;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logs::*;
    pub use crate::scenario::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logs::*;
pub use scenario::*;
