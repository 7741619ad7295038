//! triples: a small object store that keeps bucket and object metadata in
//! flat CSV catalogs next to the object files they describe.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

use axum::Router;
use services::storage_service::StorageService;

/// Router for a data directory, with state attached.
pub fn app(storage: StorageService) -> Router {
    routes::routes().with_state(storage)
}
