//! Catalog persistence backend.

use crate::error::{CatalogError, CatalogResult};
use parking_lot::RwLock;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Durable home of the catalog image.
///
/// Backends are **opaque byte stores**: they keep the latest image and know
/// nothing of users or groups. The store owns encoding.
///
/// # Invariants
///
/// - `load` returns exactly the bytes of the last successful `store`
/// - a failed `store` leaves the previous image in place
/// - backends must be `Send + Sync`
pub trait CatalogBackend: Send + Sync {
    /// Loads the current image, or `None` for a fresh catalog.
    fn load(&self) -> CatalogResult<Option<Vec<u8>>>;

    /// Replaces the image. After this returns successfully the image is
    /// durable.
    fn store(&mut self, image: &[u8]) -> CatalogResult<()>;
}

/// An in-memory backend for tests and ephemeral catalogs.
///
/// Clones share the same image, so a test can keep a handle after handing
/// the backend to a store.
///
/// # Example
///
/// ```rust
/// use dirsync_catalog::{CatalogBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// assert!(backend.load().unwrap().is_none());
/// backend.store(b"image").unwrap();
/// assert_eq!(backend.load().unwrap().as_deref(), Some(&b"image"[..]));
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    image: Arc<RwLock<Option<Vec<u8>>>>,
    fail_stores: Arc<AtomicBool>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `store` fail with an I/O error (or succeed
    /// again when `fail` is false).
    pub fn set_fail_stores(&self, fail: bool) {
        self.fail_stores.store(fail, Ordering::SeqCst);
    }

    /// Returns the stored image size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.image.read().as_ref().map_or(0, Vec::len)
    }
}

impl CatalogBackend for InMemoryBackend {
    fn load(&self) -> CatalogResult<Option<Vec<u8>>> {
        Ok(self.image.read().clone())
    }

    fn store(&mut self, image: &[u8]) -> CatalogResult<()> {
        if self.fail_stores.load(Ordering::SeqCst) {
            return Err(CatalogError::Io(io::Error::other("injected store failure")));
        }
        *self.image.write() = Some(image.to_vec());
        Ok(())
    }
}
