//! Offline consistency sweep between catalogs and the directory tree.
//!
//! Every mutation touches the filesystem before the catalog, so a crash can
//! leave a record without its directory or file, or a directory or file
//! without a record, plus stray temporary files. This sweep finds those and,
//! in repair mode, brings the catalogs back in line with the tree. It deletes
//! temporary files, so it must not run while the server is serving requests.

use super::{
    catalog,
    error::StorageResult,
    objects::resolve_content_type,
    storage_service::{BUCKET_CATALOG, OBJECT_CATALOG, StorageService, is_temp_name, now},
    validation::{validate_bucket_name, validate_object_key},
};
use crate::models::{
    bucket::{Bucket, BucketStatus},
    object::Object,
};
use chrono::{DateTime, SubsecRound, Utc};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Only report inconsistencies.
    Report,
    /// Report and fix them.
    Repair,
}

/// Inconsistencies found by a sweep. Object entries are `(bucket, key)`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub orphan_bucket_records: Vec<String>,
    pub unrecorded_buckets: Vec<String>,
    pub orphan_object_records: Vec<(String, String)>,
    pub unrecorded_objects: Vec<(String, String)>,
    pub size_mismatches: Vec<(String, String)>,
    pub stale_temp_files: Vec<PathBuf>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

struct DirScan {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, (u64, DateTime<Utc>)>,
    temps: Vec<PathBuf>,
}

impl StorageService {
    pub async fn reconcile(&self, mode: ReconcileMode) -> StorageResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        let catalog_path = self.bucket_catalog_path();
        let _guard = self.locks().lock(&catalog_path).await;

        let records: Vec<Bucket> = catalog::read_all(&catalog_path).await?;
        let root = scan_dir(&self.base_path, BUCKET_CATALOG).await?;
        report.stale_temp_files.extend(root.temps.iter().cloned());

        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            if root.dirs.contains(&record.name) {
                kept.push(record);
            } else {
                warn!("bucket record `{}` has no directory", record.name);
                report.orphan_bucket_records.push(record.name);
            }
        }

        for name in &root.dirs {
            if validate_bucket_name(name).is_err() {
                debug!("ignoring directory `{}`: not a valid bucket name", name);
                continue;
            }
            if !kept.iter().any(|b| &b.name == name) {
                warn!("bucket directory `{}` has no catalog record", name);
                report.unrecorded_buckets.push(name.clone());
                let created = now();
                kept.push(Bucket {
                    name: name.clone(),
                    creation_time: created,
                    last_modified_time: created,
                    status: BucketStatus::Active,
                });
            }
        }

        for bucket in &kept {
            self.reconcile_bucket(&bucket.name, mode, &mut report).await?;
        }

        if mode == ReconcileMode::Repair {
            if !report.orphan_bucket_records.is_empty() || !report.unrecorded_buckets.is_empty() {
                catalog::overwrite_all(&catalog_path, &kept).await?;
            }
            for path in &report.stale_temp_files {
                if let Err(err) = fs::remove_file(path).await {
                    warn!("failed to remove temp file {}: {}", path.display(), err);
                }
            }
        }

        info!(
            "reconcile ({:?}): {} orphan bucket records, {} unrecorded buckets, \
             {} orphan object records, {} unrecorded objects, {} size mismatches, \
             {} stale temp files",
            mode,
            report.orphan_bucket_records.len(),
            report.unrecorded_buckets.len(),
            report.orphan_object_records.len(),
            report.unrecorded_objects.len(),
            report.size_mismatches.len(),
            report.stale_temp_files.len()
        );
        Ok(report)
    }

    async fn reconcile_bucket(
        &self,
        bucket: &str,
        mode: ReconcileMode,
        report: &mut ReconcileReport,
    ) -> StorageResult<()> {
        let catalog_path = self.object_catalog_path(bucket);
        let _guard = self.locks().lock(&catalog_path).await;

        let records: Vec<Object> = catalog::read_all(&catalog_path).await?;
        let scan = scan_dir(&self.bucket_root(bucket), OBJECT_CATALOG).await?;
        report.stale_temp_files.extend(scan.temps.iter().cloned());

        let mut changed = false;
        let mut kept = Vec::with_capacity(records.len());
        for mut record in records {
            match scan.files.get(&record.key) {
                None => {
                    warn!("object record `{}/{}` has no file", bucket, record.key);
                    report
                        .orphan_object_records
                        .push((bucket.to_string(), record.key));
                    changed = true;
                }
                Some((len, _)) => {
                    if record.size != *len {
                        warn!(
                            "object `{}/{}` recorded as {} bytes, file has {}",
                            bucket, record.key, record.size, len
                        );
                        report
                            .size_mismatches
                            .push((bucket.to_string(), record.key.clone()));
                        record.size = *len;
                        changed = true;
                    }
                    kept.push(record);
                }
            }
        }

        for (key, (len, modified)) in &scan.files {
            if validate_object_key(key).is_err() {
                debug!("ignoring file `{}/{}`: not a valid object key", bucket, key);
                continue;
            }
            if !kept.iter().any(|o| &o.key == key) {
                warn!("object file `{}/{}` has no catalog record", bucket, key);
                report
                    .unrecorded_objects
                    .push((bucket.to_string(), key.clone()));
                kept.push(Object {
                    key: key.clone(),
                    size: *len,
                    content_type: resolve_content_type(key, None),
                    last_modified: *modified,
                });
                changed = true;
            }
        }

        if mode == ReconcileMode::Repair && changed {
            catalog::overwrite_all(&catalog_path, &kept).await?;
        }
        Ok(())
    }
}

/// Split a directory's entries into subdirectories, regular files and
/// temporary files, skipping the catalog named `catalog_name`.
async fn scan_dir(path: &Path, catalog_name: &str) -> StorageResult<DirScan> {
    let mut scan = DirScan {
        dirs: BTreeSet::new(),
        files: BTreeMap::new(),
        temps: Vec::new(),
    };

    let mut entries = fs::read_dir(path).await?;
    while let Some(entry) = entries.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let meta = entry.metadata().await?;
        if is_temp_name(&name) {
            scan.temps.push(entry.path());
        } else if meta.is_dir() {
            scan.dirs.insert(name);
        } else if meta.is_file() && name != catalog_name {
            let modified = meta
                .modified()
                .map(|t| DateTime::<Utc>::from(t).trunc_subsecs(0))
                .unwrap_or_else(|_| now());
            scan.files.insert(name, (meta.len(), modified));
        }
    }
    Ok(scan)
}
