//! Storage layer: name validation, CSV catalogs, and the bucket/object
//! operations that keep catalogs and the directory tree in step.

pub mod buckets;
pub mod catalog;
pub mod error;
pub mod locks;
pub mod objects;
pub mod reconcile;
pub mod storage_service;
pub mod validation;
