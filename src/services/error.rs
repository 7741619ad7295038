use axum::http::StatusCode;
use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("object key `{key}` invalid: {reason}")]
    InvalidObjectKey { key: String, reason: String },
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("bucket `{0}` already exists")]
    BucketAlreadyExists(String),
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("bucket `{0}` is not empty, delete objects before deleting the bucket")]
    BucketNotEmpty(String),
    #[error("catalog `{}` is corrupt: {reason}", path.display())]
    CorruptCatalog { path: PathBuf, reason: String },
    #[error("storage fault: {0}")]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// HTTP status the boundary layer reports for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidBucketName { .. }
            | Self::InvalidObjectKey { .. }
            | Self::MissingField(_)
            | Self::BucketNotEmpty(_) => StatusCode::BAD_REQUEST,
            Self::BucketAlreadyExists(_) => StatusCode::CONFLICT,
            Self::BucketNotFound(_) | Self::ObjectNotFound { .. } => StatusCode::NOT_FOUND,
            Self::CorruptCatalog { .. } | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable code rendered in error documents.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidBucketName { .. } => "InvalidBucketName",
            Self::InvalidObjectKey { .. } => "InvalidObjectKey",
            Self::MissingField(_) => "MissingField",
            Self::BucketAlreadyExists(_) => "BucketAlreadyExists",
            Self::BucketNotFound(_) => "NoSuchBucket",
            Self::ObjectNotFound { .. } => "NoSuchKey",
            Self::BucketNotEmpty(_) => "BucketNotEmpty",
            Self::CorruptCatalog { .. } => "CorruptCatalog",
            Self::Io(_) => "StorageFault",
        }
    }
}
