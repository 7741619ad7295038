//! src/services/storage_service.rs
//!
//! StorageService: bucket and object operations backed by flat CSV catalogs
//! for metadata and a directory tree for object payloads.
//!
//! Layout under `base_path`:
//!
//! ```text
//! buckets.csv            bucket catalog
//! {bucket}/              one directory per bucket
//! {bucket}/objects.csv   that bucket's object catalog
//! {bucket}/{key}         object payloads
//! ```
//!
//! Temporary files start with `~`, which is outside both the bucket-name and
//! the object-key alphabet, so they never collide with real entries.

use super::{
    catalog,
    error::{StorageError, StorageResult},
    locks::CatalogLocks,
    validation::validate_bucket_name,
};
use crate::models::bucket::Bucket;
use chrono::{DateTime, SubsecRound, Utc};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// File name of the global bucket catalog.
pub const BUCKET_CATALOG: &str = "buckets.csv";
/// File name of the per-bucket object catalog.
pub const OBJECT_CATALOG: &str = "objects.csv";
/// Leading character of every temporary file.
pub const TEMP_PREFIX: char = '~';

#[derive(Clone)]
pub struct StorageService {
    /// Root data directory holding the bucket catalog and bucket directories.
    pub base_path: PathBuf,

    locks: Arc<CatalogLocks>,
}

impl StorageService {
    /// Create a service rooted at `base_path`. The directory must already exist.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            locks: Arc::new(CatalogLocks::new()),
        }
    }

    pub(crate) fn locks(&self) -> &CatalogLocks {
        &self.locks
    }

    pub fn bucket_catalog_path(&self) -> PathBuf {
        self.base_path.join(BUCKET_CATALOG)
    }

    /// Directory of a bucket. Does not check for existence.
    pub(crate) fn bucket_root(&self, bucket: &str) -> PathBuf {
        self.base_path.join(bucket)
    }

    pub(crate) fn object_catalog_path(&self, bucket: &str) -> PathBuf {
        self.bucket_root(bucket).join(OBJECT_CATALOG)
    }

    pub(crate) fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.bucket_root(bucket).join(key)
    }

    /// Resolve the directory of a bucket named in a request.
    ///
    /// An empty name is a missing field. A name that could never have been
    /// created (invalid or reserved) is reported as not found, which also
    /// keeps names like `..` from resolving outside `base_path`.
    pub(crate) fn addressable_bucket_root(&self, bucket: &str) -> StorageResult<PathBuf> {
        if bucket.is_empty() {
            return Err(StorageError::MissingField("bucket name"));
        }
        if validate_bucket_name(bucket).is_err() || bucket == BUCKET_CATALOG {
            return Err(StorageError::BucketNotFound(bucket.to_string()));
        }
        Ok(self.bucket_root(bucket))
    }

    /// Fail with `BucketNotFound` unless `root` is an existing directory.
    pub(crate) async fn ensure_bucket_dir(&self, bucket: &str, root: &Path) -> StorageResult<()> {
        if is_dir(root).await? {
            Ok(())
        } else {
            Err(StorageError::BucketNotFound(bucket.to_string()))
        }
    }

    /// Refresh the bucket's `last_modified_time` after an object change.
    ///
    /// The object mutation has already committed when this runs, so a
    /// failure is logged rather than returned.
    pub(crate) async fn touch_bucket(&self, bucket: &str) {
        if let Err(err) = self.try_touch_bucket(bucket).await {
            warn!("failed to refresh last modified time of bucket `{}`: {}", bucket, err);
        }
    }

    async fn try_touch_bucket(&self, bucket: &str) -> StorageResult<()> {
        let catalog_path = self.bucket_catalog_path();
        let _guard = self.locks.lock(&catalog_path).await;

        let mut buckets: Vec<Bucket> = catalog::read_all(&catalog_path).await?;
        let Some(record) = buckets.iter_mut().find(|b| b.name == bucket) else {
            debug!("bucket `{}` has no catalog record to refresh", bucket);
            return Ok(());
        };
        record.last_modified_time = now();
        catalog::overwrite_all(&catalog_path, &buckets).await
    }
}

/// Current time at the second precision stored in catalogs.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Unique temporary path next to `path`, e.g. `~objects.csv.<uuid>.tmp`.
pub fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}{}.{}.tmp", TEMP_PREFIX, name, Uuid::new_v4()))
}

pub fn is_temp_name(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX)
}

pub(crate) async fn is_dir(path: &Path) -> StorageResult<bool> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_dir()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(StorageError::Io(err)),
    }
}
