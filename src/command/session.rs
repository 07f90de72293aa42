//! Per-connection session state.

use std::net::SocketAddr;

/// Mutable state owned by exactly one connection task.
///
/// Holds the *name* of the currently-selected bucket rather than an owning
/// handle: the live `Bucket` is resolved from the registry at each command
/// boundary so a `Drop` elsewhere can never leave a session holding a
/// dangling reference.
pub struct Session {
    bucket_name: String,
    remote_addr: SocketAddr,
}

impl Session {
    /// Creates a session bound to `default_bucket`, as every new connection
    /// is at accept time.
    pub fn new(default_bucket: impl Into<String>, remote_addr: SocketAddr) -> Self {
        Self {
            bucket_name: default_bucket.into(),
            remote_addr,
        }
    }

    /// Returns the name of the currently-selected bucket.
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// Rebinds the session to a different bucket name. Only `BUCKET USE`
    /// calls this.
    pub fn set_bucket_name(&mut self, name: impl Into<String>) {
        self.bucket_name = name.into();
    }

    /// Returns the connection's remote address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_starts_on_default_bucket() {
        let session = Session::new("default", "127.0.0.1:1".parse().unwrap());
        assert_eq!(session.bucket_name(), "default");
    }

    #[test]
    fn test_session_use_rebinds() {
        let mut session = Session::new("default", "127.0.0.1:1".parse().unwrap());
        session.set_bucket_name("widgets");
        assert_eq!(session.bucket_name(), "widgets");
    }
}
