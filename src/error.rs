//! Error types for DataBuddy.
//!
//! DataBuddy uses a hierarchical error system:
//! - `DataBuddyError` is the top-level error returned by all public APIs
//! - Specific error types (`StorageError`, `ValidationError`, `NotFoundError`)
//!   provide detail
//!
//! # Error Handling Pattern
//! ```rust,ignore
//! use databuddy::{BucketRegistry, Result};
//!
//! fn example() -> Result<()> {
//!     let mut registry = BucketRegistry::init("./data", "default")?;
//!     // ... operations that may fail ...
//!     registry.close()?;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for DataBuddy operations.
pub type Result<T> = std::result::Result<T, DataBuddyError>;

/// Top-level error enum for all DataBuddy operations.
///
/// This is the only error type returned by public APIs. Use pattern
/// matching, or the `is_*` helpers, to handle specific error cases.
#[derive(Debug, Error)]
pub enum DataBuddyError {
    /// Storage layer error (I/O, corruption, transactions).
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration error.
    #[error("Configuration error: {reason}")]
    Config {
        /// Description of what's wrong with the configuration.
        reason: String,
    },

    /// Requested entity not found.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cluster membership error (join failure, transport failure).
    #[error("Cluster error: {0}")]
    Cluster(String),

    /// The data directory has not been initialized with `databuddy init`.
    #[error("data directory is not initialized: {0}")]
    NotInitialized(PathBuf),

    /// Malformed RESP framing on the wire.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl DataBuddyError {
    /// Creates a configuration error with the given reason.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Creates a cluster error with the given message.
    pub fn cluster(msg: impl Into<String>) -> Self {
        Self::Cluster(msg.into())
    }

    /// Returns true if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a storage error.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is a cluster error.
    pub fn is_cluster(&self) -> bool {
        matches!(self, Self::Cluster(_))
    }

    /// Returns true if this is a wire-protocol error.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

/// Storage-related errors.
///
/// These errors indicate problems with the underlying storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database file or data is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// Storage engine was asked to operate after being closed.
    #[error("storage engine is not open")]
    NotOpen,

    /// Transaction failed (commit, rollback, etc.).
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Error from the redb storage engine.
    #[error("storage engine error: {0}")]
    Redb(String),

    /// Database schema version doesn't match expected version.
    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version.
        expected: u32,
        /// Actual schema version found in database.
        found: u32,
    },

    /// Bucket directory exists but could not be opened as a valid engine file.
    #[error("bucket directory is locked by another writer")]
    Locked,
}

impl StorageError {
    /// Creates a corruption error with the given message.
    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    /// Creates a transaction error with the given message.
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// Creates a serialization error with the given message.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Creates a redb error with the given message.
    pub fn redb(msg: impl Into<String>) -> Self {
        Self::Redb(msg.into())
    }
}

// Conversions from redb error types, mirroring redb's own error hierarchy.
impl From<redb::Error> for StorageError {
    fn from(err: redb::Error) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::DatabaseError> for StorageError {
    fn from(err: redb::DatabaseError) -> Self {
        if matches!(err, redb::DatabaseError::DatabaseAlreadyOpen) {
            StorageError::Locked
        } else {
            StorageError::Redb(err.to_string())
        }
    }
}

impl From<redb::TransactionError> for StorageError {
    fn from(err: redb::TransactionError) -> Self {
        StorageError::Transaction(err.to_string())
    }
}

impl From<redb::CommitError> for StorageError {
    fn from(err: redb::CommitError) -> Self {
        StorageError::Transaction(format!("commit failed: {}", err))
    }
}

impl From<redb::TableError> for StorageError {
    fn from(err: redb::TableError) -> Self {
        StorageError::Redb(format!("table error: {}", err))
    }
}

impl From<redb::StorageError> for StorageError {
    fn from(err: redb::StorageError) -> Self {
        StorageError::Redb(format!("storage error: {}", err))
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

// Convenience direct conversions to DataBuddyError.
impl From<redb::Error> for DataBuddyError {
    fn from(err: redb::Error) -> Self {
        DataBuddyError::Storage(StorageError::from(err))
    }
}

impl From<redb::DatabaseError> for DataBuddyError {
    fn from(err: redb::DatabaseError) -> Self {
        DataBuddyError::Storage(StorageError::from(err))
    }
}

impl From<redb::TransactionError> for DataBuddyError {
    fn from(err: redb::TransactionError) -> Self {
        DataBuddyError::Storage(StorageError::from(err))
    }
}

impl From<redb::CommitError> for DataBuddyError {
    fn from(err: redb::CommitError) -> Self {
        DataBuddyError::Storage(StorageError::from(err))
    }
}

impl From<redb::TableError> for DataBuddyError {
    fn from(err: redb::TableError) -> Self {
        DataBuddyError::Storage(StorageError::from(err))
    }
}

impl From<redb::StorageError> for DataBuddyError {
    fn from(err: redb::StorageError) -> Self {
        DataBuddyError::Storage(StorageError::from(err))
    }
}

impl From<bincode::Error> for DataBuddyError {
    fn from(err: bincode::Error) -> Self {
        DataBuddyError::Storage(StorageError::from(err))
    }
}

/// Validation errors for input data.
///
/// These errors indicate problems with data provided by the caller.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field has an invalid value.
    #[error("invalid field '{field}': {reason}")]
    InvalidField {
        /// Name of the invalid field.
        field: String,
        /// Why the value is invalid.
        reason: String,
    },

    /// A required field is missing or empty.
    #[error("required field missing: {field}")]
    RequiredField {
        /// Name of the missing field.
        field: String,
    },
}

impl ValidationError {
    /// Creates an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a required field error.
    pub fn required_field(field: impl Into<String>) -> Self {
        Self::RequiredField {
            field: field.into(),
        }
    }
}

/// Not found errors for specific entity types.
#[derive(Debug, Error)]
pub enum NotFoundError {
    /// Bucket with the given name not found.
    #[error("bucket not found: {0}")]
    Bucket(String),

    /// Key not found in the current bucket.
    #[error("key not found: {0}")]
    Key(String),

    /// Command not found in the command registry.
    #[error("unknown command: {0}")]
    Command(String),
}

impl NotFoundError {
    /// Creates a bucket not found error.
    pub fn bucket(name: impl ToString) -> Self {
        Self::Bucket(name.to_string())
    }

    /// Creates a key not found error.
    pub fn key(key: impl ToString) -> Self {
        Self::Key(key.to_string())
    }

    /// Creates a command not found error.
    pub fn command(name: impl ToString) -> Self {
        Self::Command(name.to_string())
    }
}
