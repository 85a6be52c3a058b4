//! Transaction state.

use crate::error::{CatalogError, CatalogResult};
use crate::tables::Tables;
use crate::types::TransactionId;

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
}

/// A write transaction.
///
/// The transaction works on a private copy of the tables taken at `begin`.
/// Its changes become visible to readers only when the store commits it.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    tables: Tables,
    writes: usize,
}

impl Transaction {
    pub(crate) fn new(id: TransactionId, tables: Tables) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            tables,
            writes: 0,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Number of mutating calls made through this transaction.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Returns the working tables.
    #[must_use]
    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Returns the working tables for mutation.
    pub fn tables_mut(&mut self) -> CatalogResult<&mut Tables> {
        self.ensure_active()?;
        self.writes += 1;
        Ok(&mut self.tables)
    }

    pub(crate) fn mark_committed(&mut self) {
        self.state = TransactionState::Committed;
    }

    pub(crate) fn mark_aborted(&mut self) {
        self.state = TransactionState::Aborted;
    }

    pub(crate) fn into_tables(self) -> Tables {
        self.tables
    }

    fn ensure_active(&self) -> CatalogResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(CatalogError::NoActiveTransaction)
        }
    }
}
