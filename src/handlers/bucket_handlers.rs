//! HTTP handlers for bucket operations.

use super::xml::{XML_CONTENT_TYPE, bucket_document, bucket_list_document};
use crate::{errors::AppError, services::storage_service::StorageService};
use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};

/// PUT `/{bucket}` — create bucket.
pub async fn create_bucket(
    State(service): State<StorageService>,
    Path(bucket): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = service
        .create_bucket(&bucket)
        .await
        .map_err(|err| AppError::from(err).with_resource(format!("/{bucket}")))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, XML_CONTENT_TYPE)],
        bucket_document(&record),
    ))
}

/// GET `/` or `/{bucket}` — list all buckets. The bucket segment is ignored.
pub async fn list_buckets(
    State(service): State<StorageService>,
) -> Result<impl IntoResponse, AppError> {
    let buckets = service.list_buckets().await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, XML_CONTENT_TYPE)],
        bucket_list_document(&buckets),
    ))
}

/// DELETE `/{bucket}` — delete an empty bucket.
pub async fn delete_bucket(
    State(service): State<StorageService>,
    Path(bucket): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    service
        .delete_bucket(&bucket)
        .await
        .map_err(|err| AppError::from(err).with_resource(format!("/{bucket}")))?;
    Ok(StatusCode::NO_CONTENT)
}
