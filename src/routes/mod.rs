//! Defines routes for all bucket and object operations.
//!
//! ## Structure
//! - **Bucket-level endpoints**
//!   - `GET    /` and `GET /{bucket}` — list all buckets
//!   - `PUT    /{bucket}` — create bucket
//!   - `DELETE /{bucket}` — delete bucket
//!
//! - **Object-level endpoints**
//!   - `PUT    /{bucket}/{key}` — upload object
//!   - `GET    /{bucket}/{key}` — download object
//!   - `DELETE /{bucket}/{key}` — delete object
//!
//! Any other path shape is a 400; a known shape with an unsupported verb is
//! a 405. `/healthz` and `/readyz` shadow the buckets of the same name.

use crate::{
    errors::AppError,
    handlers::{
        bucket_handlers::{create_bucket, delete_bucket, list_buckets},
        health_handlers::{healthz, readyz},
        object_handlers::{delete_object, get_object, upload_object},
    },
    services::storage_service::StorageService,
};
use axum::{
    Router,
    http::{Method, Uri},
    routing::get,
};
use tower_http::trace::TraceLayer;

/// Build the router. State (`StorageService`) is attached by the caller.
pub fn routes() -> Router<StorageService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/", get(list_buckets))
        .route(
            "/{bucket}",
            get(list_buckets).put(create_bucket).delete(delete_bucket),
        )
        .route(
            "/{bucket}/{key}",
            get(get_object).put(upload_object).delete(delete_object),
        )
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(invalid_path)
        .layer(TraceLayer::new_for_http())
}

async fn invalid_path(uri: Uri) -> AppError {
    AppError::bad_request("invalid URL format, expected /{bucket} or /{bucket}/{key}")
        .with_resource(uri.path().to_string())
}

async fn method_not_allowed(method: Method, uri: Uri) -> AppError {
    AppError::method_not_allowed(format!("method {} is not allowed here", method))
        .with_resource(uri.path().to_string())
}
