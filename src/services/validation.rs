//! Name rules for buckets and object keys.
//!
//! Both checks are pure: no I/O and no shared state. They run before any
//! catalog read or filesystem mutation so client input errors never leave
//! partial changes behind.

use super::error::{StorageError, StorageResult};
use std::net::Ipv4Addr;

const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;
const OBJECT_KEY_MAX_LEN: usize = 255;

/// Validate a bucket name.
///
/// Accepts 3-63 characters from `[a-z0-9.-]` that do not start or end with
/// a hyphen, contain no `--` or `..`, and do not parse as an IPv4 address.
pub fn validate_bucket_name(name: &str) -> StorageResult<()> {
    let invalid = |reason: &str| StorageError::InvalidBucketName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let len = name.len();
    if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
        return Err(invalid("bucket name must be between 3 and 63 characters"));
    }

    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return Err(invalid(
            "bucket name can only contain lowercase letters, numbers, hyphens, and periods",
        ));
    }

    if name.starts_with('-') || name.ends_with('-') {
        return Err(invalid("bucket name must not begin or end with a hyphen"));
    }

    if name.contains("--") || name.contains("..") {
        return Err(invalid(
            "bucket name must not contain two consecutive periods or hyphens",
        ));
    }

    if name.parse::<Ipv4Addr>().is_ok() {
        return Err(invalid("bucket name must not be formatted as an IP address"));
    }

    Ok(())
}

/// Validate an object key.
///
/// Keys are 1-255 characters from `[A-Za-z0-9._-]`. The alphabet excludes
/// `/`, which keeps every key a single path component inside its bucket.
pub fn validate_object_key(key: &str) -> StorageResult<()> {
    let well_formed = (1..=OBJECT_KEY_MAX_LEN).contains(&key.len())
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if well_formed {
        Ok(())
    } else {
        Err(StorageError::InvalidObjectKey {
            key: key.to_string(),
            reason: "object key must be 1-255 characters long and can only contain letters, \
                     numbers, underscores, hyphens, and periods"
                .to_string(),
        })
    }
}
