//! Configuration types for DataBuddy.
//!
//! The [`ServerConfig`] struct controls process-wide behavior: where data is
//! stored, which bucket is the default, and where the RESP and gossip
//! listeners bind. It carries no business logic of its own — it is built by
//! the `databuddy` binary from CLI flags and `APP_*` environment variables,
//! then validated and handed to the core library.
//!
//! # Example
//! ```rust
//! use databuddy::ServerConfig;
//!
//! let config = ServerConfig {
//!     datadir: "/tmp/databuddy-data".into(),
//!     port: 7000,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::path::PathBuf;

use crate::error::ValidationError;

/// Default directory where all data is stored.
pub const DEFAULT_DATADIR: &str = "/var/lib/databuddy";

/// Default name of the bucket created and selected on first connect.
pub const DEFAULT_BUCKET: &str = "default";

/// Default RESP listen port.
pub const DEFAULT_PORT: u16 = 6543;

/// Default RESP/gossip listen host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default gossip (SWIM) listen port.
pub const DEFAULT_GOSSIP_PORT: u16 = 6544;

/// Server-wide configuration.
///
/// Built by the `databuddy` binary from CLI flags and environment
/// variables: `datadir`, `port`, `host`, `loglevel`, `devel`, `serfport`,
/// `join`.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Directory where all bucket data is stored.
    pub datadir: PathBuf,

    /// Name of the default bucket, selected for new connections.
    pub default_bucket: String,

    /// Host to bind the RESP listener on.
    pub host: String,

    /// Port to bind the RESP listener on.
    pub port: u16,

    /// Host to bind the gossip (SWIM) listener on.
    ///
    /// Defaults to the same value as `host`.
    pub gossip_host: String,

    /// Port to bind the gossip (SWIM) listener on.
    pub gossip_port: u16,

    /// Seed addresses (`host:port`) to join the gossip mesh through.
    pub join_seeds: Vec<String>,

    /// Log level filter (`trace`, `debug`, `info`, `warn`, `error`).
    pub log_level: String,

    /// Enables human-readable, ANSI-colored logging for local development.
    pub devel: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            datadir: PathBuf::from(DEFAULT_DATADIR),
            default_bucket: DEFAULT_BUCKET.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            gossip_host: DEFAULT_HOST.to_string(),
            gossip_port: DEFAULT_GOSSIP_PORT,
            join_seeds: Vec::new(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            devel: false,
        }
    }
}

impl ServerConfig {
    /// Creates a new `ServerConfig` with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the RESP listen address as `host:port`.
    pub fn resp_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the gossip listen address as `host:port`.
    pub fn gossip_addr(&self) -> String {
        format!("{}:{}", self.gossip_host, self.gossip_port)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `ValidationError` if `default_bucket` is not a valid bucket
    /// name, or if the RESP and gossip listeners collide on the same
    /// host/port pair.
    pub fn validate(&self) -> Result<(), ValidationError> {
        crate::types::BucketName::parse(&self.default_bucket).map_err(|_| {
            ValidationError::invalid_field("default_bucket", "must be a valid bucket name")
        })?;

        if self.host == self.gossip_host && self.port == self.gossip_port {
            return Err(ValidationError::invalid_field(
                "gossip_port",
                "must differ from the RESP port when hosts match",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.default_bucket, "default");
        assert_eq!(config.port, 6543);
        assert_eq!(config.gossip_port, 6544);
        assert!(config.join_seeds.is_empty());
    }

    #[test]
    fn test_validate_success() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_default_bucket() {
        let config = ServerConfig {
            default_bucket: "Bad_Name".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_port_collision() {
        let config = ServerConfig {
            gossip_port: DEFAULT_PORT,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resp_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.resp_addr(), "127.0.0.1:6543");
    }

    #[test]
    fn test_gossip_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.gossip_addr(), "127.0.0.1:6544");
    }
}
