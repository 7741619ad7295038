//! HTTP handlers for object operations.
//! Uploads stream the request body straight to `StorageService`; downloads
//! return the whole object.

use super::xml::{XML_CONTENT_TYPE, object_document};
use crate::{errors::AppError, services::storage_service::StorageService};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use std::io;

/// PUT `/{bucket}/{key}` — upload object. `Content-Type` is the declared type.
pub async fn upload_object(
    State(service): State<StorageService>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let stream = body.into_data_stream().map(|chunk| chunk.map_err(io::Error::other));

    let object = service
        .put_object(&bucket, &key, content_type, stream)
        .await
        .map_err(|err| AppError::from(err).with_resource(format!("/{bucket}/{key}")))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, XML_CONTENT_TYPE)],
        object_document(&object),
    ))
}

/// GET `/{bucket}/{key}` — download object bytes.
pub async fn get_object(
    State(service): State<StorageService>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let (data, content_type) = service
        .get_object(&bucket, &key)
        .await
        .map_err(|err| AppError::from(err).with_resource(format!("/{bucket}/{key}")))?;

    let content_type = HeaderValue::from_str(&content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    let mut response = Response::new(Body::from(data));
    *response.status_mut() = StatusCode::OK;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, content_type);
    Ok(response)
}

/// DELETE `/{bucket}/{key}` — delete object.
pub async fn delete_object(
    State(service): State<StorageService>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    service
        .delete_object(&bucket, &key)
        .await
        .map_err(|err| AppError::from(err).with_resource(format!("/{bucket}/{key}")))?;
    Ok(StatusCode::NO_CONTENT)
}
