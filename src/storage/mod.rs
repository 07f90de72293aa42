//! Storage layer abstractions for DataBuddy.
//!
//! This module provides a trait-based abstraction over the per-bucket
//! embedded engine, allowing different backends to be used (e.g., redb, a
//! mock for testing).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Bucket                                 │
//! │                         │                                     │
//! │                         ▼                                     │
//! │              ┌─────────────────────┐                         │
//! │              │   StorageEngine     │  ← Trait                │
//! │              └─────────────────────┘                         │
//! │                    ▲         ▲                               │
//! │                    │         │                               │
//! │         ┌─────────┴─┐   ┌───┴─────────┐                     │
//! │         │RedbEngine  │   │ MockEngine  │                     │
//! │         └───────────┘   └─────────────┘                     │
//! │           (prod)           (test)                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod redb;
pub mod schema;

pub use self::redb::RedbEngine;
pub use schema::{EngineMetadata, SCHEMA_VERSION};

use std::path::Path;

use crate::error::Result;
use crate::types::Timestamp;

/// Storage engine trait for a single bucket.
///
/// This trait defines the contract that any embedded storage backend must
/// implement. The primary implementation is [`RedbEngine`].
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the engine handles its own
/// internal synchronization (redb uses MVCC for readers, an exclusive lock
/// for writers).
pub trait StorageEngine: Send + Sync {
    /// Returns the engine's on-disk metadata.
    fn metadata(&self) -> &EngineMetadata;

    /// Returns the path to the engine file, if applicable.
    fn path(&self) -> Option<&Path>;

    /// Closes the storage engine, flushing any pending writes.
    ///
    /// Consumes the engine; after calling `close()` it cannot be used again.
    fn close(self: Box<Self>) -> Result<()>;

    /// Returns the value for `key`, or `None` if absent or TTL-expired.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Sets `key` to `value`.
    ///
    /// `ttl` is an optional duration after which the key is lazily treated
    /// as absent on reads. `meta` is a caller-supplied metadata byte.
    fn set(
        &self,
        key: &[u8],
        value: &[u8],
        ttl: Option<std::time::Duration>,
        meta: u8,
    ) -> Result<()>;

    /// Deletes `key`. Returns `true` if the key existed (and wasn't already
    /// expired).
    fn delete(&self, key: &[u8]) -> Result<bool>;

    /// Returns `true` if `key` exists and has not expired.
    fn has(&self, key: &[u8]) -> Result<bool>;

    /// Lists all non-expired keys with the given prefix, in ascending byte
    /// order, as observed by a single consistent read transaction.
    fn list(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>>;
}

/// Derives the expiry timestamp for a TTL supplied at `set` time.
pub(crate) fn expiry_for_ttl(ttl: Option<std::time::Duration>) -> Option<Timestamp> {
    ttl.map(|d| Timestamp::from_millis(Timestamp::now().as_millis() + d.as_millis() as i64))
}

/// Opens a storage engine at the given path, creating it if absent.
pub fn open_storage(path: impl AsRef<Path>) -> Result<Box<dyn StorageEngine>> {
    let engine = RedbEngine::open(path)?;
    Ok(Box::new(engine))
}
