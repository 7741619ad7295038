//! Bucket operations: create, list, delete.
//!
//! Filesystem changes come before catalog changes. A crash in between leaves
//! either a directory without a record (adopted by the next create of that
//! name) or a record without a directory (dropped by reconciliation).

use super::{
    catalog,
    error::{StorageError, StorageResult},
    storage_service::{BUCKET_CATALOG, OBJECT_CATALOG, StorageService, is_temp_name, now},
    validation::validate_bucket_name,
};
use crate::models::bucket::{Bucket, BucketStatus};
use std::io::ErrorKind;
use tokio::fs;
use tracing::{debug, info, warn};

impl StorageService {
    /// Create a bucket directory and its catalog record.
    ///
    /// Returns `BucketAlreadyExists` if the catalog already names the bucket.
    /// A directory that exists without a record is adopted.
    pub async fn create_bucket(&self, name: &str) -> StorageResult<Bucket> {
        if name.is_empty() {
            return Err(StorageError::MissingField("bucket name"));
        }
        validate_bucket_name(name)?;
        if name == BUCKET_CATALOG {
            return Err(StorageError::InvalidBucketName {
                name: name.to_string(),
                reason: "bucket name is reserved".into(),
            });
        }

        let catalog_path = self.bucket_catalog_path();
        let _guard = self.locks().lock(&catalog_path).await;

        let buckets: Vec<Bucket> = catalog::read_all(&catalog_path).await?;
        if buckets.iter().any(|b| b.name == name) {
            return Err(StorageError::BucketAlreadyExists(name.to_string()));
        }

        let bucket_root = self.bucket_root(name);
        match fs::create_dir(&bucket_root).await {
            Ok(()) => debug!("created bucket directory {}", bucket_root.display()),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                if fs::metadata(&bucket_root).await?.is_dir() {
                    warn!(
                        "adopting existing directory {} for bucket `{}`",
                        bucket_root.display(),
                        name
                    );
                } else {
                    return Err(StorageError::Io(err));
                }
            }
            Err(err) => return Err(StorageError::Io(err)),
        }

        let created = now();
        let bucket = Bucket {
            name: name.to_string(),
            creation_time: created,
            last_modified_time: created,
            status: BucketStatus::Active,
        };
        catalog::append(&catalog_path, &bucket).await?;

        info!("created bucket `{}`", name);
        Ok(bucket)
    }

    /// All bucket records in catalog order.
    pub async fn list_buckets(&self) -> StorageResult<Vec<Bucket>> {
        let catalog_path = self.bucket_catalog_path();
        let _guard = self.locks().lock(&catalog_path).await;
        catalog::read_all(&catalog_path).await
    }

    /// Delete an empty bucket: remove its directory, then its record.
    ///
    /// A bucket is empty when its directory holds nothing besides its object
    /// catalog and leftover temporary files.
    pub async fn delete_bucket(&self, name: &str) -> StorageResult<()> {
        let bucket_root = self.addressable_bucket_root(name)?;

        self.ensure_bucket_dir(name, &bucket_root).await?;

        let catalog_path = self.bucket_catalog_path();
        let _catalog_guard = self.locks().lock(&catalog_path).await;
        let _objects_guard = self.locks().lock(&self.object_catalog_path(name)).await;
        self.ensure_bucket_dir(name, &bucket_root).await?;

        let mut entries = fs::read_dir(&bucket_root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name != OBJECT_CATALOG && !is_temp_name(&file_name) {
                return Err(StorageError::BucketNotEmpty(name.to_string()));
            }
        }

        fs::remove_dir_all(&bucket_root).await?;
        debug!("removed bucket directory {}", bucket_root.display());

        let buckets: Vec<Bucket> = catalog::read_all(&catalog_path).await?;
        let remaining: Vec<Bucket> = buckets.into_iter().filter(|b| b.name != name).collect();
        catalog::overwrite_all(&catalog_path, &remaining).await?;

        info!("deleted bucket `{}`", name);
        Ok(())
    }
}
