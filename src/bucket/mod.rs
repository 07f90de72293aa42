//! Buckets: named, independently-opened storage units.
//!
//! A [`Bucket`] wraps one [`StorageEngine`] instance and exposes the five
//! facade operations (`list`, `get`, `set`, `delete`, `has`) plus `close`.
//! The [`registry`] submodule owns the directory of buckets known to a
//! running process, including the internal `_system` bucket.

pub mod registry;

pub use registry::{BucketRegistry, SYSTEM_BUCKET_NAME};

use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use tracing::instrument;

use crate::error::{DataBuddyError, Result, StorageError};
use crate::storage::{open_storage, StorageEngine};
use crate::types::BucketName;

/// A single named, independently-opened storage unit.
///
/// Each bucket owns one embedded engine file under
/// `<datadir>/buckets/<name>/data.redb`. The engine handle is held behind a
/// `RwLock` so that `close()` can take exclusive ownership of it while
/// every other operation only needs shared access (the engine itself
/// serializes its own writers).
pub struct Bucket {
    name: BucketName,
    path: PathBuf,
    engine: RwLock<Option<Box<dyn StorageEngine>>>,
}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Bucket {
    /// Opens (or creates) the bucket's engine file under `datadir/buckets/<name>`.
    #[instrument(skip(datadir), fields(bucket = %name))]
    pub fn open(datadir: &Path, name: BucketName) -> Result<Self> {
        let path = bucket_dir(datadir, name.as_str());
        let engine = open_storage(path.join("data.redb"))?;
        Ok(Self {
            name,
            path,
            engine: RwLock::new(Some(engine)),
        })
    }

    /// Returns the bucket's name.
    pub fn name(&self) -> &BucketName {
        &self.name
    }

    /// Returns the bucket's on-disk directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_engine<T>(&self, f: impl FnOnce(&dyn StorageEngine) -> Result<T>) -> Result<T> {
        let guard = self.engine.read().expect("bucket engine lock poisoned");
        match guard.as_deref() {
            Some(engine) => f(engine),
            None => Err(DataBuddyError::Storage(StorageError::NotOpen)),
        }
    }

    /// Lists all non-expired keys with the given prefix, ascending.
    pub fn list(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        self.with_engine(|engine| engine.list(prefix))
    }

    /// Gets the value for `key`, or `None` if absent or expired.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.with_engine(|engine| engine.get(key))
    }

    /// Sets `key` to `value`, with an optional TTL and metadata byte.
    pub fn set(&self, key: &[u8], value: &[u8], ttl: Option<Duration>, meta: u8) -> Result<()> {
        self.with_engine(|engine| engine.set(key, value, ttl, meta))
    }

    /// Deletes `key`. Returns `true` if it existed.
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        self.with_engine(|engine| engine.delete(key))
    }

    /// Returns `true` if `key` exists and has not expired.
    pub fn has(&self, key: &[u8]) -> Result<bool> {
        self.with_engine(|engine| engine.has(key))
    }

    /// Closes the bucket's engine. Idempotent: closing an already-closed
    /// bucket is a no-op.
    #[instrument(skip(self), fields(bucket = %self.name))]
    pub fn close(&self) -> Result<()> {
        let mut guard = self.engine.write().expect("bucket engine lock poisoned");
        if let Some(engine) = guard.take() {
            engine.close()?;
        }
        Ok(())
    }
}

/// Returns the on-disk directory for a bucket with the given name.
pub(crate) fn bucket_dir(datadir: &Path, name: &str) -> PathBuf {
    datadir.join("buckets").join(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_test_bucket(datadir: &Path, name: &str) -> Bucket {
        Bucket::open(datadir, BucketName::parse(name).unwrap()).unwrap()
    }

    #[test]
    fn test_bucket_set_get() {
        let dir = tempdir().unwrap();
        let bucket = open_test_bucket(dir.path(), "widgets");

        bucket.set(b"k", b"v", None, 0).unwrap();
        assert_eq!(bucket.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_bucket_close_then_operation_errors() {
        let dir = tempdir().unwrap();
        let bucket = open_test_bucket(dir.path(), "widgets");

        bucket.close().unwrap();
        let err = bucket.get(b"k").unwrap_err();
        assert!(err.is_storage());
    }

    #[test]
    fn test_bucket_close_idempotent() {
        let dir = tempdir().unwrap();
        let bucket = open_test_bucket(dir.path(), "widgets");

        bucket.close().unwrap();
        bucket.close().unwrap();
    }

    #[test]
    fn test_bucket_path_under_datadir() {
        let dir = tempdir().unwrap();
        let bucket = open_test_bucket(dir.path(), "widgets");
        assert!(bucket.path().starts_with(dir.path().join("buckets")));
    }
}
