//! # DataBuddy
//!
//! A networked key-value datastore speaking the RESP wire protocol, with
//! named on-disk "buckets" and gossip-based cluster membership.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use databuddy::{BucketRegistry, ServerConfig};
//!
//! BucketRegistry::init("./data", "default")?;
//! let registry = BucketRegistry::open("./data")?;
//! let bucket = registry.get("default")?;
//! bucket.set(b"key", b"value", None, 0)?;
//! assert_eq!(bucket.get(b"key")?, Some(b"value".to_vec()));
//! registry.close()?;
//! # Ok::<(), databuddy::DataBuddyError>(())
//! ```
//!
//! ## Key Concepts
//!
//! ### Bucket
//!
//! A **bucket** is an independently-opened, named storage unit backed by its
//! own embedded [`redb`] database file. Clients select a bucket for their
//! connection with `BUCKET USE` and every subsequent `GET`/`SET`/`DEL`/`KEYS`
//! operates within it.
//!
//! ### Cluster membership
//!
//! Nodes discover each other and track liveness via SWIM-style gossip
//! ([`foca`]). Membership is informational only — DataBuddy does not
//! replicate data between nodes.
//!
//! ## Thread Safety
//!
//! [`Bucket`] and [`BucketRegistry`] are `Send + Sync` and are shared across
//! connection tasks behind an `Arc`.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

mod config;
mod error;
mod types;

pub mod bucket;
pub mod cluster;
pub mod command;
pub mod server;
pub mod storage;

pub use bucket::{Bucket, BucketRegistry, SYSTEM_BUCKET_NAME};
pub use cluster::{ClusterClient, ClusterMember, GossipEvent, NodeIdentity};
pub use command::{Command, CommandInfo, CommandRegistry, HandlerOutcome, RespValue, Session};
pub use config::{
    ServerConfig, DEFAULT_BUCKET, DEFAULT_DATADIR, DEFAULT_GOSSIP_PORT, DEFAULT_HOST,
    DEFAULT_LOG_LEVEL, DEFAULT_PORT,
};
pub use error::{DataBuddyError, NotFoundError, Result, StorageError, ValidationError};
pub use server::{serve, Handler};
pub use storage::{EngineMetadata, StorageEngine};
pub use types::{BucketName, NodeId, Timestamp};

/// Convenient imports for common DataBuddy usage.
///
/// ```rust
/// use databuddy::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bucket::{Bucket, BucketRegistry};
    pub use crate::config::ServerConfig;
    pub use crate::error::{DataBuddyError, Result};
    pub use crate::types::{BucketName, Timestamp};
}
