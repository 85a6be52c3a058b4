//! Identity snapshots built from directory search results.

use crate::directory::DirectoryRecord;
use crate::error::{SyncError, SyncResult};
use std::collections::HashSet;

/// The set of identifiers one phase read from the directory.
///
/// A snapshot is either complete or not built at all: a missing attribute or
/// a failed search aborts construction, so an incomplete result can never
/// drive deletions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentitySnapshot {
    names: HashSet<String>,
}

impl IdentitySnapshot {
    /// Drains search results into a snapshot of the first value of
    /// `attribute` of each record.
    ///
    /// # Errors
    ///
    /// Returns `MissingAttribute` if a record lacks the attribute, or the
    /// first error item of the sequence.
    pub fn build<I>(records: I, attribute: &str) -> SyncResult<Self>
    where
        I: IntoIterator<Item = SyncResult<DirectoryRecord>>,
    {
        let mut names = HashSet::new();
        for record in records {
            let record = record?;
            let name = record
                .first_value(attribute)
                .ok_or_else(|| SyncError::MissingAttribute {
                    dn: record.dn().to_string(),
                    attribute: attribute.to_string(),
                })?;
            names.insert(name.to_string());
        }
        Ok(Self { names })
    }

    /// Creates a snapshot from known names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of distinct identifiers.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if the directory returned nothing.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns true if the identifier is present.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Iterates identifiers in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Identifiers in ascending order.
    pub fn sorted(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.iter().collect();
        names.sort_unstable();
        names
    }

    /// Returns the underlying set.
    pub fn as_set(&self) -> &HashSet<String> {
        &self.names
    }
}
