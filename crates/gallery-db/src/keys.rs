//! Blob key derivation and validation.
//!
//! Keys have the shape `{unix_millis}-{sanitised file name}` and are the last
//! path segment of the public URL handed out for the blob.

use chrono::{DateTime, Utc};

/// Fallback name used when an upload carries no usable file name.
const FALLBACK_FILE_NAME: &str = "upload";

/// Derives the storage key for a freshly uploaded file.
pub fn derive_blob_key(now: DateTime<Utc>, original_name: &str) -> String {
    format!(
        "{}-{}",
        now.timestamp_millis(),
        sanitize_file_name(original_name)
    )
}

/// Strips directory components and maps every character outside
/// `[A-Za-z0-9._-]` to `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        FALLBACK_FILE_NAME.to_string()
    } else {
        cleaned
    }
}

/// Checks that a key names exactly one object inside a bucket.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && !key.contains(|c: char| c == '/' || c == '\\' || c.is_control())
}
