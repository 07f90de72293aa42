//! Core type definitions shared across DataBuddy: bucket names, timestamps,
//! node identity, and the per-connection session.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Maximum length of a bucket name, matching the RFC1123 DNS label limit.
pub const BUCKET_NAME_MAX_LEN: usize = 63;

/// A validated bucket name.
///
/// Bucket names follow the RFC1123 DNS label format: lowercase alphanumerics
/// and hyphens, 1 to 63 bytes, must not start or end with a hyphen.
///
/// # Example
/// ```
/// use databuddy::BucketName;
///
/// let name = BucketName::parse("my-bucket").unwrap();
/// assert_eq!(name.as_str(), "my-bucket");
/// assert!(BucketName::parse("-bad").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketName(String);

impl BucketName {
    /// Parses and validates a bucket name.
    ///
    /// # Errors
    /// Returns `ValidationError::InvalidField` if the name is empty, too
    /// long, or contains characters outside the RFC1123 label alphabet.
    pub fn parse(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if !is_valid_bucket_name(&name) {
            return Err(ValidationError::invalid_field(
                "name",
                "must be a valid RFC1123 label (lowercase alphanumerics and hyphens, 1-63 bytes)",
            ));
        }
        Ok(Self(name))
    }

    /// Returns the bucket name as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds a bucket name without validation, for the internal `_system`
    /// bucket, which is exempt from the RFC1123 label rules user-facing
    /// bucket names must follow.
    pub(crate) fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for BucketName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validates a bucket name against the RFC1123 label format: lowercase
/// alphanumerics and hyphens, 1-63 bytes, must start and end with an
/// alphanumeric character.
fn is_valid_bucket_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() > BUCKET_NAME_MAX_LEN {
        return false;
    }

    let is_alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();

    if !is_alnum(bytes[0]) || !is_alnum(bytes[bytes.len() - 1]) {
        return false;
    }

    bytes
        .iter()
        .all(|&b| is_alnum(b) || b == b'-')
}

/// Unix timestamp in milliseconds.
///
/// Used for TTL expiry and metadata bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    ///
    /// If the system clock is before the Unix epoch (should never happen
    /// in practice), returns a timestamp of 0 (epoch) rather than panicking.
    #[inline]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as i64)
    }

    /// Creates a timestamp from Unix milliseconds.
    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as Unix milliseconds.
    #[inline]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Returns whether this timestamp is at or before `now`.
    #[inline]
    pub fn has_elapsed(&self) -> bool {
        self.0 <= Timestamp::now().0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque gossip node identifier.
///
/// Derived as `sha256_hex(hostname || listen_addr)`, matching the fixed
/// per-process node identity the cluster membership layer advertises.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    /// Derives a node ID from a hostname and gossip listen address.
    pub fn derive(hostname: &str, listen_addr: &str) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(hostname.as_bytes());
        hasher.update(listen_addr.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Returns the node ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_name_valid() {
        assert!(BucketName::parse("default").is_ok());
        assert!(BucketName::parse("my-bucket-1").is_ok());
        assert!(BucketName::parse("a").is_ok());
    }

    #[test]
    fn test_bucket_name_empty_rejected() {
        assert!(BucketName::parse("").is_err());
    }

    #[test]
    fn test_bucket_name_leading_hyphen_rejected() {
        assert!(BucketName::parse("-bad").is_err());
    }

    #[test]
    fn test_bucket_name_trailing_hyphen_rejected() {
        assert!(BucketName::parse("bad-").is_err());
    }

    #[test]
    fn test_bucket_name_uppercase_rejected() {
        assert!(BucketName::parse("Bad").is_err());
    }

    #[test]
    fn test_bucket_name_too_long_rejected() {
        let name = "a".repeat(64);
        assert!(BucketName::parse(name).is_err());
    }

    #[test]
    fn test_bucket_name_max_length_accepted() {
        let name = "a".repeat(63);
        assert!(BucketName::parse(name).is_ok());
    }

    #[test]
    fn test_bucket_name_underscore_rejected() {
        assert!(BucketName::parse("bad_name").is_err());
    }

    #[test]
    fn test_timestamp_ordering() {
        let t1 = Timestamp::from_millis(1000);
        let t2 = Timestamp::from_millis(2000);
        assert!(t1 < t2);
    }

    #[test]
    fn test_timestamp_has_elapsed() {
        let past = Timestamp::from_millis(1);
        assert!(past.has_elapsed());
        let future = Timestamp::from_millis(Timestamp::now().as_millis() + 1_000_000);
        assert!(!future.has_elapsed());
    }

    #[test]
    fn test_node_id_derive_deterministic() {
        let a = NodeId::derive("host1", "127.0.0.1:6544");
        let b = NodeId::derive("host1", "127.0.0.1:6544");
        assert_eq!(a, b);
    }

    #[test]
    fn test_node_id_derive_differs_by_input() {
        let a = NodeId::derive("host1", "127.0.0.1:6544");
        let b = NodeId::derive("host2", "127.0.0.1:6544");
        assert_ne!(a, b);
    }
}
