//! Catalog records for buckets and objects.
//!
//! Each struct is one catalog row. Field order is the column order on disk,
//! so reordering fields changes the catalog format.

pub mod bucket;
pub mod object;
