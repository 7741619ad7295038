//! Represents a bucket, the top-level container for objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a bucket. Only `active` is produced today.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BucketStatus {
    Active,
}

impl BucketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
        }
    }
}

/// One row of the bucket catalog: `name,creationTime,lastModifiedTime,status`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Bucket {
    /// Unique bucket name; also the name of the bucket's directory.
    pub name: String,

    /// When the bucket was created.
    pub creation_time: DateTime<Utc>,

    /// Last time the bucket or any object inside it changed.
    pub last_modified_time: DateTime<Utc>,

    pub status: BucketStatus,
}
