//! Object operations: put, get, delete.
//!
//! Payloads are streamed into a temporary file first and renamed into place
//! while the bucket's object-catalog lock is held, so the catalog row and
//! the visible file always change together.

use super::{
    catalog,
    error::{StorageError, StorageResult},
    storage_service::{OBJECT_CATALOG, StorageService, now, temp_sibling},
    validation::validate_object_key,
};
use crate::models::object::Object;
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    io::{self, ErrorKind},
    path::Path,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info, warn};

/// Content type used when nothing better is known.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

impl StorageService {
    /// Stream-upload an object, replacing any previous object under `key`.
    ///
    /// - Writes bytes to a temporary file, counting the size as it goes.
    /// - Renames the file into place under the object-catalog lock.
    /// - Replaces the key's catalog row with a fresh one.
    ///
    /// The declared content type wins; otherwise it is guessed from the
    /// key's extension.
    pub async fn put_object<S>(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<String>,
        stream: S,
    ) -> StorageResult<Object>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        ensure_key_valid(key)?;
        let bucket_root = self.addressable_bucket_root(bucket)?;
        self.ensure_bucket_dir(bucket, &bucket_root).await?;

        let file_path = self.object_path(bucket, key);
        let tmp_path = temp_sibling(&file_path);
        let size = match write_stream(&tmp_path, stream).await {
            Ok(size) => size,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(map_missing_bucket(err, bucket));
            }
        };

        let content_type = resolve_content_type(key, content_type.as_deref());

        let catalog_path = self.object_catalog_path(bucket);
        let guard = self.locks().lock(&catalog_path).await;

        if let Err(err) = self.ensure_bucket_dir(bucket, &bucket_root).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }
        if let Err(err) = rename_into_place(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(map_missing_bucket(err, bucket));
        }

        let object = Object {
            key: key.to_string(),
            size,
            content_type,
            last_modified: now(),
        };

        let mut objects: Vec<Object> = catalog::read_all(&catalog_path).await?;
        objects.retain(|o| o.key != key);
        objects.push(object.clone());
        if let Err(err) = catalog::overwrite_all(&catalog_path, &objects).await {
            warn!(
                "object `{}/{}` written but catalog update failed: {}",
                bucket, key, err
            );
            return Err(err);
        }
        drop(guard);

        self.touch_bucket(bucket).await;
        info!("stored object `{}/{}` ({} bytes)", bucket, key, size);
        Ok(object)
    }

    /// Read a whole object into memory together with its content type.
    ///
    /// The content type comes from the object's catalog row; objects without
    /// a row fall back to [`content_type_for_extension`].
    pub async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<(Bytes, String)> {
        ensure_key_valid(key)?;
        let bucket_root = self.addressable_bucket_root(bucket)?;

        self.ensure_bucket_dir(bucket, &bucket_root).await?;

        let catalog_path = self.object_catalog_path(bucket);
        let _guard = self.locks().lock(&catalog_path).await;
        // Re-check: the bucket may have been deleted while we waited.
        self.ensure_bucket_dir(bucket, &bucket_root).await?;

        let data = fs::read(self.object_path(bucket, key))
            .await
            .map_err(|err| {
                if err.kind() == ErrorKind::NotFound {
                    StorageError::ObjectNotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StorageError::Io(err)
                }
            })?;

        let objects: Vec<Object> = catalog::read_all(&catalog_path).await?;
        let content_type = match objects.into_iter().find(|o| o.key == key) {
            Some(object) => object.content_type,
            None => {
                debug!("object `{}/{}` has no catalog record", bucket, key);
                content_type_for_extension(key).to_string()
            }
        };

        Ok((Bytes::from(data), content_type))
    }

    /// Delete an object: remove its file, then its catalog row.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        ensure_key_valid(key)?;
        let bucket_root = self.addressable_bucket_root(bucket)?;

        self.ensure_bucket_dir(bucket, &bucket_root).await?;

        let catalog_path = self.object_catalog_path(bucket);
        let guard = self.locks().lock(&catalog_path).await;
        // Re-check: the bucket may have been deleted while we waited.
        self.ensure_bucket_dir(bucket, &bucket_root).await?;

        let file_path = self.object_path(bucket, key);
        match fs::remove_file(&file_path).await {
            Ok(()) => debug!("removed object file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StorageError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                });
            }
            Err(err) => return Err(StorageError::Io(err)),
        }

        let mut objects: Vec<Object> = catalog::read_all(&catalog_path).await?;
        objects.retain(|o| o.key != key);
        catalog::overwrite_all(&catalog_path, &objects).await?;
        drop(guard);

        self.touch_bucket(bucket).await;
        info!("deleted object `{}/{}`", bucket, key);
        Ok(())
    }
}

/// Content type for a key from the fixed extension table used when an
/// object has no catalog record.
pub fn content_type_for_extension(key: &str) -> &'static str {
    let extension = Path::new(key)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("txt") => "text/plain",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// Declared type if present, else a guess from the key's extension.
pub fn resolve_content_type(key: &str, declared: Option<&str>) -> String {
    match declared.map(str::trim).filter(|ct| !ct.is_empty()) {
        Some(ct) => ct.to_string(),
        None => mime_guess::from_path(key)
            .first_raw()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string(),
    }
}

fn ensure_key_valid(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::MissingField("object key"));
    }
    validate_object_key(key)?;
    // `.` and `..` fit the key alphabet but name the bucket directory or its parent.
    if matches!(key, OBJECT_CATALOG | "." | "..") {
        return Err(StorageError::InvalidObjectKey {
            key: key.to_string(),
            reason: "object key is reserved".into(),
        });
    }
    Ok(())
}

async fn write_stream<S>(path: &Path, stream: S) -> io::Result<u64>
where
    S: Stream<Item = io::Result<Bytes>> + Send,
{
    let mut file = File::create(path).await?;
    let mut size: u64 = 0;
    pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        size += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(size)
}

async fn rename_into_place(tmp_path: &Path, file_path: &Path) -> io::Result<()> {
    match fs::rename(tmp_path, file_path).await {
        // Platforms where rename does not replace an existing file.
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            fs::remove_file(file_path).await?;
            fs::rename(tmp_path, file_path).await
        }
        other => other,
    }
}

/// The bucket directory vanished under us (deleted concurrently).
fn map_missing_bucket(err: io::Error, bucket: &str) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::BucketNotFound(bucket.to_string())
    } else {
        StorageError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage_service::BUCKET_CATALOG;
    use futures::stream;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn service_with_bucket(bucket: &str) -> (TempDir, StorageService) {
        let dir = TempDir::new().unwrap();
        let service = StorageService::new(dir.path());
        service.create_bucket(bucket).await.unwrap();
        (dir, service)
    }

    fn body(data: impl Into<Bytes>) -> impl Stream<Item = io::Result<Bytes>> + Send {
        stream::iter(vec![Ok(data.into())])
    }

    fn object_keys(dir: &TempDir, bucket: &str) -> Vec<String> {
        let raw = std::fs::read_to_string(dir.path().join(bucket).join(OBJECT_CATALOG))
            .unwrap_or_default();
        raw.lines()
            .map(|line| line.split(',').next().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn put_then_get_and_overwrite() {
        let (dir, service) = service_with_bucket("b-1").await;

        let first = service
            .put_object("b-1", "a.txt", None, body("hello"))
            .await
            .unwrap();
        assert_eq!(first.size, 5);
        assert_eq!(first.content_type, "text/plain");

        let (data, content_type) = service.get_object("b-1", "a.txt").await.unwrap();
        assert_eq!(&data[..], b"hello");
        assert_eq!(content_type, "text/plain");

        service
            .put_object("b-1", "a.txt", None, body("world!"))
            .await
            .unwrap();
        let (data, _) = service.get_object("b-1", "a.txt").await.unwrap();
        assert_eq!(&data[..], b"world!");
        assert_eq!(object_keys(&dir, "b-1"), ["a.txt"]);
    }

    #[tokio::test]
    async fn chunked_body_is_counted() {
        let (dir, service) = service_with_bucket("chunks").await;
        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Ok(Bytes::from_static(b"")),
            Ok(Bytes::from_static(b"defg")),
        ]);

        let object = service
            .put_object("chunks", "data.bin", None, chunks)
            .await
            .unwrap();
        assert_eq!(object.size, 7);
        assert_eq!(
            std::fs::metadata(dir.path().join("chunks").join("data.bin"))
                .unwrap()
                .len(),
            7
        );
    }

    #[tokio::test]
    async fn failed_stream_leaves_previous_version() {
        let (dir, service) = service_with_bucket("keep").await;
        service
            .put_object("keep", "k.txt", None, body("original"))
            .await
            .unwrap();

        let broken = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(ErrorKind::ConnectionReset, "client went away")),
        ]);
        let err = service
            .put_object("keep", "k.txt", None, broken)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Io(_)), "{err:?}");

        let (data, _) = service.get_object("keep", "k.txt").await.unwrap();
        assert_eq!(&data[..], b"original");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("keep"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with('~'))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[tokio::test]
    async fn declared_content_type_is_authoritative() {
        let (_dir, service) = service_with_bucket("types").await;
        let object = service
            .put_object(
                "types",
                "page.txt",
                Some("text/html; charset=utf-8".into()),
                body("<p>hi</p>"),
            )
            .await
            .unwrap();
        assert_eq!(object.content_type, "text/html; charset=utf-8");

        let (_, content_type) = service.get_object("types", "page.txt").await.unwrap();
        assert_eq!(content_type, "text/html; charset=utf-8");
    }

    #[tokio::test]
    async fn content_type_guessed_from_extension() {
        let (_dir, service) = service_with_bucket("types").await;
        let png = service
            .put_object("types", "logo.png", Some("  ".into()), body("png"))
            .await
            .unwrap();
        assert_eq!(png.content_type, "image/png");

        let unknown = service
            .put_object("types", "blob.zzz", None, body("?"))
            .await
            .unwrap();
        assert_eq!(unknown.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn unrecorded_file_uses_extension_table() {
        let (dir, service) = service_with_bucket("raw").await;
        std::fs::write(dir.path().join("raw").join("pic.JPEG"), b"jpeg").unwrap();

        let (data, content_type) = service.get_object("raw", "pic.JPEG").await.unwrap();
        assert_eq!(&data[..], b"jpeg");
        assert_eq!(content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn delete_removes_file_and_record() {
        let (dir, service) = service_with_bucket("del").await;
        for key in ["a.txt", "b.txt"] {
            service
                .put_object("del", key, None, body("x"))
                .await
                .unwrap();
        }

        service.delete_object("del", "a.txt").await.unwrap();
        assert!(!dir.path().join("del").join("a.txt").exists());
        assert_eq!(object_keys(&dir, "del"), ["b.txt"]);
        assert!(matches!(
            service.get_object("del", "a.txt").await,
            Err(StorageError::ObjectNotFound { .. })
        ));
        assert!(matches!(
            service.delete_object("del", "a.txt").await,
            Err(StorageError::ObjectNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn request_errors_are_classified() {
        let (dir, service) = service_with_bucket("present").await;

        assert!(matches!(
            service.put_object("", "k", None, body("x")).await,
            Err(StorageError::MissingField("bucket name"))
        ));
        assert!(matches!(
            service.put_object("present", "", None, body("x")).await,
            Err(StorageError::MissingField("object key"))
        ));
        assert!(matches!(
            service.put_object("present", "a/b", None, body("x")).await,
            Err(StorageError::InvalidObjectKey { .. })
        ));
        assert!(matches!(
            service
                .put_object("present", OBJECT_CATALOG, None, body("x"))
                .await,
            Err(StorageError::InvalidObjectKey { .. })
        ));
        assert!(matches!(
            service.put_object("absent", "k", None, body("x")).await,
            Err(StorageError::BucketNotFound(_))
        ));
        assert!(matches!(
            service.get_object("absent", "k").await,
            Err(StorageError::BucketNotFound(_))
        ));
        assert!(matches!(
            service.delete_object("absent", "k").await,
            Err(StorageError::BucketNotFound(_))
        ));
        assert!(matches!(
            service.get_object(BUCKET_CATALOG, "k").await,
            Err(StorageError::BucketNotFound(_))
        ));
        assert!(!dir.path().join("absent").exists());
    }

    #[tokio::test]
    async fn dot_keys_are_rejected_before_touching_disk() {
        let (dir, service) = service_with_bucket("docs").await;

        for key in [".", ".."] {
            assert!(
                matches!(
                    service.put_object("docs", key, None, body("x")).await,
                    Err(StorageError::InvalidObjectKey { .. })
                ),
                "put {key}"
            );
            assert!(
                matches!(
                    service.get_object("docs", key).await,
                    Err(StorageError::InvalidObjectKey { .. })
                ),
                "get {key}"
            );
            assert!(
                matches!(
                    service.delete_object("docs", key).await,
                    Err(StorageError::InvalidObjectKey { .. })
                ),
                "delete {key}"
            );
        }
        assert!(dir.path().join("docs").join(OBJECT_CATALOG).is_file());
        assert!(dir.path().join(BUCKET_CATALOG).is_file());
    }

    #[tokio::test]
    async fn invalid_key_is_reported_before_missing_bucket() {
        let (_dir, service) = service_with_bucket("present").await;
        assert!(matches!(
            service.put_object("No_Such", "a/b", None, body("x")).await,
            Err(StorageError::InvalidObjectKey { .. })
        ));
        assert!(matches!(
            service.get_object("absent", "").await,
            Err(StorageError::MissingField("object key"))
        ));
        assert!(matches!(
            service.delete_object("absent", "..").await,
            Err(StorageError::InvalidObjectKey { .. })
        ));
    }

    #[tokio::test]
    async fn missing_buckets_leave_no_lock_entries() {
        let (_dir, service) = service_with_bucket("real").await;
        for i in 0..200 {
            let bucket = format!("nobucket-{i}");
            assert!(service.get_object(&bucket, "k").await.is_err());
            assert!(service.delete_object(&bucket, "k").await.is_err());
            assert!(service.put_object(&bucket, "k", None, body("x")).await.is_err());
        }
        service
            .put_object("real", "k.txt", None, body("x"))
            .await
            .unwrap();
        service.get_object("real", "k.txt").await.unwrap();
        assert_eq!(service.locks().len(), 0);
    }

    #[tokio::test]
    async fn object_changes_refresh_bucket_timestamp() {
        let (dir, service) = service_with_bucket("touch").await;
        let old = "touch,2020-01-01T00:00:00Z,2020-01-01T00:00:00Z,active\n";
        std::fs::write(dir.path().join(BUCKET_CATALOG), old).unwrap();

        service
            .put_object("touch", "k.txt", None, body("x"))
            .await
            .unwrap();

        let bucket = &service.list_buckets().await.unwrap()[0];
        assert_eq!(bucket.creation_time.to_rfc3339(), "2020-01-01T00:00:00+00:00");
        assert!(bucket.last_modified_time > bucket.creation_time);
    }

    #[tokio::test]
    async fn concurrent_puts_are_all_recorded() {
        let (dir, service) = service_with_bucket("busy").await;
        let service = Arc::new(service);

        let mut tasks = Vec::new();
        for i in 0..32 {
            let svc = service.clone();
            tasks.push(tokio::spawn(async move {
                let payload = format!("payload-{i}");
                svc.put_object("busy", &format!("key-{i}.txt"), None, body(payload))
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut keys = object_keys(&dir, "busy");
        keys.sort();
        let mut expected: Vec<String> = (0..32).map(|i| format!("key-{i}.txt")).collect();
        expected.sort();
        assert_eq!(keys, expected);
    }

    #[test]
    fn extension_table() {
        assert_eq!(content_type_for_extension("a.png"), "image/png");
        assert_eq!(content_type_for_extension("a.jpg"), "image/jpeg");
        assert_eq!(content_type_for_extension("a.jpeg"), "image/jpeg");
        assert_eq!(content_type_for_extension("a.txt"), "text/plain");
        assert_eq!(content_type_for_extension("a.json"), DEFAULT_CONTENT_TYPE);
        assert_eq!(content_type_for_extension("noext"), DEFAULT_CONTENT_TYPE);
    }
}
