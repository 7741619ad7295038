//! HTTP handlers. Each one extracts path parts, delegates to
//! `StorageService`, and renders the outcome through [`xml`].

pub mod bucket_handlers;
pub mod health_handlers;
pub mod object_handlers;
pub mod xml;
