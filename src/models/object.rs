//! Represents an object (file) stored in a bucket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of a bucket's object catalog: `key,size,contentType,lastModified`.
///
/// The record describes the object; the bytes live in the file named `key`
/// inside the bucket directory. `size` equals that file's length as of the
/// last successful write.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Object {
    /// Object key, unique within its bucket.
    pub key: String,

    /// Size in bytes.
    pub size: u64,

    /// Content type (MIME type).
    pub content_type: String,

    /// Timestamp of the last successful upload.
    pub last_modified: DateTime<Utc>,
}
