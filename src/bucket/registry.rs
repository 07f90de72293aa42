//! The bucket registry: the top-level `_system` bucket plus every
//! currently-open user bucket.
//!
//! The system bucket keeps the durable list of bucket names
//! (`bucket:<name>` keys), the default bucket name (`defaults:bucket`), and
//! an initialization marker (`system:initialized`).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{info, instrument, warn};

use super::{bucket_dir, Bucket};
use crate::error::{DataBuddyError, NotFoundError, Result, ValidationError};
use crate::types::BucketName;

/// Name of the internal bucket that stores registry bookkeeping. Never
/// returned by `BUCKET LIST` or selectable via `BUCKET USE`.
pub const SYSTEM_BUCKET_NAME: &str = "_system";

const BUCKET_KEY_PREFIX: &[u8] = b"bucket:";
const DEFAULT_BUCKET_KEY: &[u8] = b"defaults:bucket";
const INIT_KEY: &[u8] = b"system:initialized";

/// The registry of buckets known to a running DataBuddy process.
pub struct BucketRegistry {
    datadir: PathBuf,
    system: Bucket,
    buckets: RwLock<HashMap<String, Arc<Bucket>>>,
    default_bucket: String,
}

impl std::fmt::Debug for BucketRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketRegistry")
            .field("datadir", &self.datadir)
            .field("default_bucket", &self.default_bucket)
            .finish_non_exhaustive()
    }
}

impl BucketRegistry {
    /// Initializes a brand new data directory.
    ///
    /// The directory must not exist, or must exist and be empty. Creates
    /// the `_system` bucket, records `default_bucket` as the default, and
    /// marks the directory initialized. Does not leave any bucket open —
    /// call [`BucketRegistry::open`] afterward to start serving.
    #[instrument(skip(datadir))]
    pub fn init(datadir: impl AsRef<Path>, default_bucket: &str) -> Result<()> {
        let datadir = datadir.as_ref();
        let default_name = BucketName::parse(default_bucket)?;

        check_data_directory(datadir)?;
        if !is_empty_dir(datadir)? {
            return Err(DataBuddyError::config(format!(
                "data directory {} is not empty",
                datadir.display()
            )));
        }

        let system = Bucket::open(datadir, BucketName::new_unchecked(SYSTEM_BUCKET_NAME))?;
        let bucket_key = [BUCKET_KEY_PREFIX, default_name.as_str().as_bytes()].concat();
        system.set(&bucket_key, &[], None, 0)?;
        system.set(DEFAULT_BUCKET_KEY, default_name.as_str().as_bytes(), None, 0)?;
        system.set(INIT_KEY, b"1", None, 0)?;
        system.close()?;

        info!(datadir = %datadir.display(), default_bucket, "data directory initialized");
        Ok(())
    }

    /// Opens an already-initialized data directory, restoring every bucket
    /// the `_system` bucket knows about.
    ///
    /// Buckets that fail to open are logged and skipped rather than
    /// aborting the whole open.
    #[instrument(skip(datadir))]
    pub fn open(datadir: impl AsRef<Path>) -> Result<Self> {
        let datadir = datadir.as_ref().to_path_buf();
        check_data_directory(&datadir)?;

        let system = Bucket::open(&datadir, BucketName::new_unchecked(SYSTEM_BUCKET_NAME))?;

        if system.get(INIT_KEY)?.is_none() {
            return Err(DataBuddyError::NotInitialized(datadir));
        }

        let default_bucket = system
            .get(DEFAULT_BUCKET_KEY)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .ok_or_else(|| DataBuddyError::config("missing default bucket record"))?;

        let mut buckets = HashMap::new();
        for key in system.list(BUCKET_KEY_PREFIX)? {
            let name = String::from_utf8_lossy(&key[BUCKET_KEY_PREFIX.len()..]).into_owned();
            let bucket_name = match BucketName::parse(&name) {
                Ok(n) => n,
                Err(e) => {
                    warn!(bucket = name, error = %e, "skipping bucket with invalid name");
                    continue;
                }
            };
            match Bucket::open(&datadir, bucket_name) {
                Ok(bucket) => {
                    buckets.insert(name, Arc::new(bucket));
                }
                Err(e) => {
                    warn!(bucket = name, error = %e, "failed to open bucket, skipping");
                }
            }
        }

        info!(buckets = buckets.len(), default_bucket, "data directory opened");

        Ok(Self {
            datadir,
            system,
            buckets: RwLock::new(buckets),
            default_bucket,
        })
    }

    /// Returns the configured default bucket name.
    pub fn default_bucket_name(&self) -> &str {
        &self.default_bucket
    }

    /// Creates a new bucket and opens it.
    ///
    /// A duplicate name is a silent no-op: the presence key is re-set and
    /// the already-open bucket is left as is, rather than erroring.
    #[instrument(skip(self))]
    pub fn create(&self, name: &str) -> Result<()> {
        let bucket_name = BucketName::parse(name)?;

        let bucket_key = [BUCKET_KEY_PREFIX, bucket_name.as_str().as_bytes()].concat();
        self.system.set(&bucket_key, &[], None, 0)?;

        let already_open = self
            .buckets
            .read()
            .expect("registry lock poisoned")
            .contains_key(bucket_name.as_str());

        if !already_open {
            let bucket = Bucket::open(&self.datadir, bucket_name.clone())?;
            self.buckets
                .write()
                .expect("registry lock poisoned")
                .insert(bucket_name.as_str().to_string(), Arc::new(bucket));
        }

        info!(bucket = name, "bucket created");
        Ok(())
    }

    /// Returns the named bucket, if open.
    pub fn get(&self, name: &str) -> Result<Arc<Bucket>> {
        self.buckets
            .read()
            .expect("registry lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| NotFoundError::bucket(name).into())
    }

    /// Lists bucket names with the given prefix, sorted ascending.
    ///
    /// The `_system` bucket is never included.
    pub fn list(&self, prefix: &str) -> Vec<String> {
        let buckets = self.buckets.read().expect("registry lock poisoned");
        let mut names: Vec<String> = buckets
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Returns the number of open buckets (excluding `_system`).
    pub fn count(&self) -> usize {
        self.buckets.read().expect("registry lock poisoned").len()
    }

    /// Drops a bucket: removes it from the registry, closes its engine, and
    /// deletes its on-disk directory.
    ///
    /// Refuses to drop the default bucket. The registry entry is removed
    /// and the system-bucket key deleted even if closing the engine or
    /// removing the directory fails.
    #[instrument(skip(self))]
    pub fn drop_bucket(&self, name: &str) -> Result<()> {
        if name == self.default_bucket {
            return Err(ValidationError::invalid_field(
                "name",
                "cannot drop the default bucket",
            )
            .into());
        }

        let bucket = {
            let mut buckets = self.buckets.write().expect("registry lock poisoned");
            buckets
                .remove(name)
                .ok_or_else(|| NotFoundError::bucket(name))?
        };

        let bucket_key = [BUCKET_KEY_PREFIX, name.as_bytes()].concat();
        self.system.delete(&bucket_key)?;

        if let Err(e) = bucket.close() {
            warn!(bucket = name, error = %e, "error closing bucket during drop");
        }

        let dir = bucket_dir(&self.datadir, name);
        if let Err(e) = fs::remove_dir_all(&dir) {
            warn!(bucket = name, error = %e, "error removing bucket directory during drop");
        }

        info!(bucket = name, "bucket dropped");
        Ok(())
    }

    /// Closes every open user bucket, then the `_system` bucket.
    #[instrument(skip(self))]
    pub fn close(self) -> Result<()> {
        let buckets = self.buckets.into_inner().expect("registry lock poisoned");
        for (name, bucket) in buckets {
            if let Err(e) = bucket.close() {
                warn!(bucket = name, error = %e, "error closing bucket");
            }
        }
        self.system.close()?;
        info!("registry closed");
        Ok(())
    }
}

/// Ensures `datadir` exists as a directory, creating it (mode 0700 on unix)
/// if absent.
fn check_data_directory(datadir: &Path) -> Result<()> {
    match fs::metadata(datadir) {
        Ok(meta) => {
            if !meta.is_dir() {
                return Err(DataBuddyError::config(format!(
                    "{} exists and is not a directory",
                    datadir.display()
                )));
            }
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mode = meta.permissions().mode() & 0o777;
                if mode != 0o700 {
                    return Err(DataBuddyError::config(format!(
                        "{} has permissions {mode:o}, expected 0700",
                        datadir.display()
                    )));
                }
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            fs::create_dir_all(datadir)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(datadir, fs::Permissions::from_mode(0o700))?;
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// True if the directory has no entries.
fn is_empty_dir(datadir: &Path) -> Result<bool> {
    Ok(fs::read_dir(datadir)?.next().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn new_datadir() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o700)).unwrap();
        }
        dir
    }

    #[test]
    fn test_init_then_open() {
        let dir = new_datadir();
        BucketRegistry::init(dir.path(), "default").unwrap();

        let registry = BucketRegistry::open(dir.path()).unwrap();
        assert_eq!(registry.default_bucket_name(), "default");
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.list(""), vec!["default".to_string()]);

        registry.close().unwrap();
    }

    #[test]
    fn test_init_rejects_nonempty_dir() {
        let dir = new_datadir();
        fs::write(dir.path().join("stray.txt"), b"hi").unwrap();

        let err = BucketRegistry::init(dir.path(), "default").unwrap_err();
        assert!(matches!(err, DataBuddyError::Config { .. }));
    }

    #[test]
    fn test_open_uninitialized_dir_errors() {
        let dir = new_datadir();
        let err = BucketRegistry::open(dir.path()).unwrap_err();
        assert!(matches!(err, DataBuddyError::NotInitialized(_)));
    }

    #[test]
    fn test_create_and_get_bucket() {
        let dir = new_datadir();
        BucketRegistry::init(dir.path(), "default").unwrap();
        let registry = BucketRegistry::open(dir.path()).unwrap();

        registry.create("widgets").unwrap();
        assert!(registry.get("widgets").is_ok());
        assert_eq!(registry.count(), 2);

        registry.close().unwrap();
    }

    #[test]
    fn test_create_duplicate_bucket_is_silent_no_op() {
        let dir = new_datadir();
        BucketRegistry::init(dir.path(), "default").unwrap();
        let registry = BucketRegistry::open(dir.path()).unwrap();

        registry.create("widgets").unwrap();
        registry.get("widgets").unwrap().set(b"k", b"v", None, 0).unwrap();

        registry.create("widgets").unwrap();
        assert_eq!(
            registry.get("widgets").unwrap().get(b"k").unwrap(),
            Some(b"v".to_vec())
        );

        registry.close().unwrap();
    }

    #[test]
    fn test_list_sorted_and_excludes_system() {
        let dir = new_datadir();
        BucketRegistry::init(dir.path(), "default").unwrap();
        let registry = BucketRegistry::open(dir.path()).unwrap();

        registry.create("zeta").unwrap();
        registry.create("alpha").unwrap();

        assert_eq!(
            registry.list(""),
            vec!["alpha".to_string(), "default".to_string(), "zeta".to_string()]
        );

        registry.close().unwrap();
    }

    #[test]
    fn test_drop_bucket() {
        let dir = new_datadir();
        BucketRegistry::init(dir.path(), "default").unwrap();
        let registry = BucketRegistry::open(dir.path()).unwrap();

        registry.create("widgets").unwrap();
        registry.drop_bucket("widgets").unwrap();

        assert!(registry.get("widgets").is_err());
        assert_eq!(registry.count(), 1);

        registry.close().unwrap();
    }

    #[test]
    fn test_drop_default_bucket_rejected() {
        let dir = new_datadir();
        BucketRegistry::init(dir.path(), "default").unwrap();
        let registry = BucketRegistry::open(dir.path()).unwrap();

        let err = registry.drop_bucket("default").unwrap_err();
        assert!(err.is_validation());

        registry.close().unwrap();
    }

    #[test]
    fn test_drop_nonexistent_bucket_errors() {
        let dir = new_datadir();
        BucketRegistry::init(dir.path(), "default").unwrap();
        let registry = BucketRegistry::open(dir.path()).unwrap();

        let err = registry.drop_bucket("ghost").unwrap_err();
        assert!(err.is_not_found());

        registry.close().unwrap();
    }

    #[test]
    fn test_buckets_persist_across_reopen() {
        let dir = new_datadir();
        BucketRegistry::init(dir.path(), "default").unwrap();

        {
            let registry = BucketRegistry::open(dir.path()).unwrap();
            registry.create("widgets").unwrap();
            let bucket = registry.get("widgets").unwrap();
            bucket.set(b"k", b"v", None, 0).unwrap();
            registry.close().unwrap();
        }

        let registry = BucketRegistry::open(dir.path()).unwrap();
        assert_eq!(registry.count(), 2);
        let bucket = registry.get("widgets").unwrap();
        assert_eq!(bucket.get(b"k").unwrap(), Some(b"v".to_vec()));

        registry.close().unwrap();
    }
}
