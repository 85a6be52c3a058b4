//! Catalog store with single-writer transactions.

use crate::backend::{CatalogBackend, InMemoryBackend};
use crate::dir::CatalogDir;
use crate::error::{CatalogError, CatalogResult};
use crate::image;
use crate::stats::CatalogStats;
use crate::tables::Tables;
use crate::transaction::Transaction;
use crate::types::TransactionId;
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// The local catalog of users, groups and memberships.
///
/// The store provides:
/// - One write transaction at a time via `begin()` / `commit()` / `rollback()`
/// - Snapshot reads of the last committed state via `read_committed()`
/// - Durable commits: the image is persisted before the new tables are
///   published
///
/// ## Transaction Model
///
/// `begin()` copies the committed tables into a private working set. All
/// mutations go through `in_transaction()` and touch only that working set.
/// `commit()` encodes and stores the working set, then publishes it;
/// `rollback()` discards it. Committing or rolling back without an active
/// transaction fails with `NoActiveTransaction`.
pub struct CatalogStore {
    committed: RwLock<Tables>,
    active: Mutex<Option<Transaction>>,
    backend: Mutex<Box<dyn CatalogBackend>>,
    next_txid: AtomicU64,
}

impl CatalogStore {
    /// Opens (or creates) a persistent catalog in `path`.
    ///
    /// # Errors
    ///
    /// Returns `Locked` if another process has the catalog open, or
    /// `InvalidFormat` if the stored image cannot be decoded.
    pub fn open(path: &Path) -> CatalogResult<Self> {
        let dir = CatalogDir::open(path, true)?;
        Self::with_backend(Box::new(dir))
    }

    /// Opens an empty in-memory catalog.
    pub fn open_in_memory() -> CatalogResult<Self> {
        Self::with_backend(Box::new(InMemoryBackend::new()))
    }

    /// Opens a catalog over an arbitrary backend, loading its image.
    pub fn with_backend(backend: Box<dyn CatalogBackend>) -> CatalogResult<Self> {
        let tables = match backend.load()? {
            Some(bytes) => image::decode(&bytes)?,
            None => Tables::new(),
        };

        Ok(Self {
            committed: RwLock::new(tables),
            active: Mutex::new(None),
            backend: Mutex::new(backend),
            next_txid: AtomicU64::new(1),
        })
    }

    /// Begins a write transaction.
    ///
    /// # Errors
    ///
    /// Returns `TransactionInProgress` if a write transaction is active.
    pub fn begin(&self) -> CatalogResult<TransactionId> {
        let mut active = self.active.lock();
        if let Some(txn) = active.as_ref() {
            return Err(CatalogError::TransactionInProgress {
                txid: txn.id().to_string(),
            });
        }

        let txid = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        let working = self.committed.read().clone();
        *active = Some(Transaction::new(txid, working));

        debug!(%txid, "catalog transaction started");
        Ok(txid)
    }

    /// Commits the active transaction.
    ///
    /// The transaction ends whether or not the commit succeeds; on failure
    /// the committed state is unchanged.
    pub fn commit(&self) -> CatalogResult<TransactionId> {
        let mut active = self.active.lock();
        let mut txn = active.take().ok_or(CatalogError::NoActiveTransaction)?;
        let txid = txn.id();

        let bytes = match image::encode(txn.tables()) {
            Ok(bytes) => bytes,
            Err(e) => {
                txn.mark_aborted();
                warn!(%txid, error = %e, "catalog commit failed");
                return Err(e);
            }
        };
        if let Err(e) = self.backend.lock().store(&bytes) {
            txn.mark_aborted();
            warn!(%txid, error = %e, "catalog commit failed");
            return Err(e);
        }

        txn.mark_committed();
        let writes = txn.write_count();
        *self.committed.write() = txn.into_tables();

        debug!(%txid, writes, image_bytes = bytes.len(), "catalog transaction committed");
        Ok(txid)
    }

    /// Rolls back the active transaction, discarding its changes.
    pub fn rollback(&self) -> CatalogResult<TransactionId> {
        let mut txn = self
            .active
            .lock()
            .take()
            .ok_or(CatalogError::NoActiveTransaction)?;
        txn.mark_aborted();

        debug!(txid = %txn.id(), writes = txn.write_count(), "catalog transaction rolled back");
        Ok(txn.id())
    }

    /// Returns the active transaction, if any.
    #[must_use]
    pub fn active_transaction(&self) -> Option<TransactionId> {
        self.active.lock().as_ref().map(Transaction::id)
    }

    /// Runs `f` against the active transaction's working tables.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveTransaction` if no transaction is active, otherwise
    /// whatever `f` returns.
    pub fn in_transaction<T, F>(&self, f: F) -> CatalogResult<T>
    where
        F: FnOnce(&mut Tables) -> CatalogResult<T>,
    {
        let mut active = self.active.lock();
        let txn = active.as_mut().ok_or(CatalogError::NoActiveTransaction)?;
        f(txn.tables_mut()?)
    }

    /// Reads the tables a writer would see: the active transaction's working
    /// set if one is open, else the committed state.
    pub fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&Tables) -> T,
    {
        let active = self.active.lock();
        match active.as_ref() {
            Some(txn) => f(txn.tables()),
            None => f(&self.committed.read()),
        }
    }

    /// Reads the last committed state.
    pub fn read_committed<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&Tables) -> T,
    {
        f(&self.committed.read())
    }

    /// Runs `f` in a new transaction, committing on `Ok` and rolling back on
    /// `Err`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use dirsync_catalog::{AuthKind, CatalogStore};
    ///
    /// let store = CatalogStore::open_in_memory().unwrap();
    /// let user = store
    ///     .transaction(|tables| tables.create_user("bob", AuthKind::Ldap, None))
    ///     .unwrap();
    /// assert_eq!(user.username, "bob");
    /// ```
    pub fn transaction<T, F>(&self, f: F) -> CatalogResult<T>
    where
        F: FnOnce(&mut Tables) -> CatalogResult<T>,
    {
        self.begin()?;
        match self.in_transaction(f) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                // The transaction is ours; a failed rollback means it is gone already.
                let _ = self.rollback();
                Err(e)
            }
        }
    }

    /// Returns statistics of the committed state.
    #[must_use]
    pub fn stats(&self) -> CatalogStats {
        self.read_committed(Tables::stats)
    }
}

impl std::fmt::Debug for CatalogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogStore")
            .field("stats", &self.stats())
            .field("active_transaction", &self.active_transaction())
            .finish()
    }
}
