//! Table and value layout for the per-bucket redb engine.
//!
//! Every bucket — including the internal `_system` bucket — is backed by
//! exactly one `redb::Database` file holding exactly one table. Keys are
//! raw user bytes; values are bincode-serialized [`StoredValue`] records
//! carrying the payload alongside an optional TTL and a caller-supplied
//! metadata byte.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ ENGINE_METADATA_TABLE                                         │
//! │   Key: &str                                                   │
//! │   Value: &[u8] (bincode EngineMetadata)                       │
//! │   Entries: "engine_metadata" -> EngineMetadata                │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ DATA_TABLE                                                    │
//! │   Key: &[u8] (raw user key)                                   │
//! │   Value: &[u8] (bincode StoredValue)                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use redb::TableDefinition;
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Current schema version.
///
/// Incremented when making breaking changes to the on-disk layout. A bucket
/// refuses to open if the stored version doesn't match.
pub const SCHEMA_VERSION: u32 = 1;

/// Metadata table: one fixed entry describing the engine file itself.
pub const ENGINE_METADATA_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("engine_metadata");

/// Key under which [`EngineMetadata`] is stored in `ENGINE_METADATA_TABLE`.
pub const ENGINE_METADATA_KEY: &str = "engine_metadata";

/// Data table: the bucket's actual key-value contents.
pub const DATA_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("data");

/// Metadata stored in the metadata table of every bucket engine file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineMetadata {
    /// Schema version for compatibility checking.
    pub schema_version: u32,

    /// Timestamp when the engine file was created.
    pub created_at: Timestamp,

    /// Last time the engine file was opened.
    pub last_opened_at: Timestamp,
}

impl EngineMetadata {
    /// Creates metadata for a freshly created engine file.
    pub fn new() -> Self {
        let now = Timestamp::now();
        Self {
            schema_version: SCHEMA_VERSION,
            created_at: now,
            last_opened_at: now,
        }
    }

    /// Updates `last_opened_at` to the current time.
    pub fn touch(&mut self) {
        self.last_opened_at = Timestamp::now();
    }

    /// Checks whether this metadata matches the current schema version.
    pub fn is_compatible(&self) -> bool {
        self.schema_version == SCHEMA_VERSION
    }
}

impl Default for EngineMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// The value stored for every key in a bucket's data table.
///
/// Wraps the caller's bytes with an optional TTL (an absolute expiry
/// timestamp, checked lazily on read) and a single metadata byte the
/// caller is free to use for its own purposes (flags, type tags, etc).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredValue {
    /// The value payload as supplied by `SET`.
    pub bytes: Vec<u8>,

    /// Absolute expiry timestamp. `None` means the key never expires.
    pub expires_at: Option<Timestamp>,

    /// Caller-supplied metadata byte.
    pub meta: u8,
}

impl StoredValue {
    /// Creates a new value with no TTL and a zero metadata byte.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            expires_at: None,
            meta: 0,
        }
    }

    /// Returns true if this value's TTL has elapsed.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|t| t.has_elapsed())
    }
}
