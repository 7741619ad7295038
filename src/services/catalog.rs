//! Flat CSV catalogs.
//!
//! A catalog is a header-less CSV file with one record per line. The bucket
//! catalog and every object catalog go through the same three operations:
//! [`read_all`], [`overwrite_all`] and [`append`]. Callers serialize
//! read-modify-write cycles through [`super::locks::CatalogLocks`]; nothing
//! in here locks.

use super::{
    error::{StorageError, StorageResult},
    storage_service::temp_sibling,
};
use crate::models::{bucket::Bucket, object::Object};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    io::{self, ErrorKind},
    path::Path,
};
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
};
use tracing::debug;

/// A row type stored in a catalog.
pub trait CatalogRecord: Serialize + DeserializeOwned {
    /// Number of fields per row.
    const WIDTH: usize;

    /// Value of the unique key column.
    fn record_key(&self) -> &str;
}

impl CatalogRecord for Bucket {
    const WIDTH: usize = 4;

    fn record_key(&self) -> &str {
        &self.name
    }
}

impl CatalogRecord for Object {
    const WIDTH: usize = 4;

    fn record_key(&self) -> &str {
        &self.key
    }
}

/// Read every record of the catalog at `path`.
///
/// A missing file is an empty catalog. Rows with the wrong field count or
/// unparsable values fail with [`StorageError::CorruptCatalog`].
pub async fn read_all<R: CatalogRecord>(path: &Path) -> StorageResult<Vec<R>> {
    let data = match fs::read(path).await {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(StorageError::Io(err)),
    };
    parse_records(path, &data)
}

/// Replace the catalog at `path` with `records`.
///
/// The rows are written to a temporary sibling and renamed over the old
/// file, so readers see either the old or the new catalog in full.
pub async fn overwrite_all<R: CatalogRecord>(path: &Path, records: &[R]) -> StorageResult<()> {
    let mut data = Vec::new();
    for record in records {
        data.extend_from_slice(&encode_record(record)?);
    }

    let tmp_path = temp_sibling(path);
    let write_result = async {
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(err) = write_result {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(StorageError::Io(err));
    }

    debug!("rewrote catalog {} with {} records", path.display(), records.len());
    Ok(())
}

/// Append one record to the catalog at `path`, creating the file if needed.
pub async fn append<R: CatalogRecord>(path: &Path, record: &R) -> StorageResult<()> {
    let line = encode_record(record)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(&line).await?;
    file.sync_data().await?;
    Ok(())
}

fn parse_records<R: CatalogRecord>(path: &Path, data: &[u8]) -> StorageResult<Vec<R>> {
    let corrupt = |reason: String| StorageError::CorruptCatalog {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row_no = index + 1;
        let row = row.map_err(|err| corrupt(format!("record {row_no}: {err}")))?;
        if row.len() != R::WIDTH {
            return Err(corrupt(format!(
                "record {row_no}: expected {} fields, found {}",
                R::WIDTH,
                row.len()
            )));
        }
        let record = row
            .deserialize::<R>(None)
            .map_err(|err| corrupt(format!("record {row_no}: {err}")))?;
        records.push(record);
    }
    Ok(records)
}

fn encode_record<R: CatalogRecord>(record: &R) -> StorageResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.serialize(record).map_err(io::Error::other)?;
    writer
        .into_inner()
        .map_err(|err| StorageError::Io(io::Error::other(err.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bucket::BucketStatus;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn object(key: &str, size: u64, content_type: &str) -> Object {
        Object {
            key: key.to_string(),
            size,
            content_type: content_type.to_string(),
            last_modified: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let records: Vec<Bucket> = read_all(&dir.path().join("buckets.csv")).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn overwrite_then_read_preserves_order_and_quoting() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("objects.csv");
        let records = vec![
            object("b.txt", 5, "text/plain; charset=utf-8"),
            object("a.bin", 0, "application/octet-stream"),
        ];

        overwrite_all(&path, &records).await.unwrap();
        let read: Vec<Object> = read_all(&path).await.unwrap();

        assert_eq!(read, records);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("b.txt,5,\"text/plain; charset=utf-8\",2024-05-01T12:00:00Z\n"));
    }

    #[tokio::test]
    async fn append_adds_a_row_after_existing_ones() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("objects.csv");
        overwrite_all(&path, &[object("first", 1, "text/plain")])
            .await
            .unwrap();
        append(&path, &object("second", 2, "image/png")).await.unwrap();

        let keys: Vec<String> = read_all::<Object>(&path)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, ["first", "second"]);
    }

    #[tokio::test]
    async fn overwrite_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("objects.csv");
        overwrite_all(&path, &[object("k", 1, "text/plain")])
            .await
            .unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, ["objects.csv"]);
    }

    #[tokio::test]
    async fn reads_catalog_with_offset_timestamps() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("buckets.csv");
        std::fs::write(
            &path,
            "photos,2024-10-01T15:04:05+03:00,2024-10-01T15:04:05+03:00,active\n",
        )
        .unwrap();

        let buckets: Vec<Bucket> = read_all(&path).await.unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].name, "photos");
        assert_eq!(buckets[0].status, BucketStatus::Active);
        assert_eq!(
            buckets[0].creation_time,
            Utc.with_ymd_and_hms(2024, 10, 1, 12, 4, 5).unwrap()
        );
    }

    #[tokio::test]
    async fn wrong_field_count_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("buckets.csv");
        std::fs::write(&path, "photos,2024-10-01T15:04:05Z,active\n").unwrap();

        let err = read_all::<Bucket>(&path).await.unwrap_err();
        assert!(matches!(err, StorageError::CorruptCatalog { .. }), "{err:?}");
        assert!(err.to_string().contains("expected 4 fields, found 3"));
    }

    #[tokio::test]
    async fn unparsable_value_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("objects.csv");
        std::fs::write(&path, "a.txt,not-a-number,text/plain,2024-10-01T15:04:05Z\n").unwrap();

        let err = read_all::<Object>(&path).await.unwrap_err();
        assert!(matches!(err, StorageError::CorruptCatalog { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn unknown_status_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("buckets.csv");
        std::fs::write(
            &path,
            "photos,2024-10-01T15:04:05Z,2024-10-01T15:04:05Z,frozen\n",
        )
        .unwrap();

        assert!(matches!(
            read_all::<Bucket>(&path).await,
            Err(StorageError::CorruptCatalog { .. })
        ));
    }
}
