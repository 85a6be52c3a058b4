//! Catalog directory management.
//!
//! File system layout of a persistent catalog:
//!
//! ```text
//! <catalog_path>/
//! ├─ LOCK              # Advisory lock for single-writer
//! └─ catalog.cbor      # Latest committed catalog image
//! ```
//!
//! The LOCK file ensures only one process opens the catalog at a time.

use crate::backend::CatalogBackend;
use crate::error::{CatalogError, CatalogResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const IMAGE_FILE: &str = "catalog.cbor";
/// Temporary file for atomic image writes.
const IMAGE_TEMP: &str = "catalog.cbor.tmp";

/// A catalog directory holding the exclusive lock and the catalog image.
///
/// # Thread Safety
///
/// The lock is held for the lifetime of the value. Only one `CatalogDir`
/// can exist per directory at a time, across processes.
#[derive(Debug)]
pub struct CatalogDir {
    path: PathBuf,
    _lock_file: File,
}

impl CatalogDir {
    /// Opens a catalog directory, creating it first if `create_if_missing`
    /// is set, and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the path is missing (and not created) or
    /// is not a directory, `Locked` if another process holds the catalog,
    /// and `Io` for file system failures.
    pub fn open(path: &Path, create_if_missing: bool) -> CatalogResult<Self> {
        prepare_dir(path, create_if_missing)?;
        let lock_file = acquire_lock(&path.join(LOCK_FILE))?;
        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the catalog directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the catalog image.
    #[must_use]
    pub fn image_path(&self) -> PathBuf {
        self.path.join(IMAGE_FILE)
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> CatalogResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> CatalogResult<()> {
        // NTFS journals the rename
        Ok(())
    }
}

fn prepare_dir(path: &Path, create_if_missing: bool) -> CatalogResult<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(CatalogError::invalid_format(format!(
            "not a catalog directory: {}",
            path.display()
        ))),
        Err(e) if e.kind() == io::ErrorKind::NotFound && create_if_missing => {
            fs::create_dir_all(path)?;
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CatalogError::invalid_format(
            format!("no catalog directory at {}", path.display()),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Opens the lock file and locks it without blocking. The lock lives as
/// long as the returned handle.
fn acquire_lock(lock_path: &Path) -> CatalogResult<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)?;
    file.try_lock_exclusive().map_err(|_| CatalogError::Locked)?;
    Ok(file)
}

impl CatalogBackend for CatalogDir {
    fn load(&self) -> CatalogResult<Option<Vec<u8>>> {
        let image_path = self.image_path();
        if !image_path.exists() {
            return Ok(None);
        }

        let mut data = Vec::new();
        File::open(&image_path)?.read_to_end(&mut data)?;
        if data.is_empty() {
            return Ok(None);
        }
        Ok(Some(data))
    }

    /// Writes the image with write-then-rename:
    /// 1. Write to a temporary file and fsync it
    /// 2. Rename it over the image
    /// 3. Fsync the directory so the rename is durable
    fn store(&mut self, image: &[u8]) -> CatalogResult<()> {
        let temp_path = self.path.join(IMAGE_TEMP);

        let mut file = File::create(&temp_path)?;
        file.write_all(image)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.image_path())?;
        self.sync_directory()
    }
}
