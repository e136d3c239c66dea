//! Collaborator interfaces: object storage and the `images` row store.
//!
//! The gallery only ever talks to these traits. Implementations live in
//! [`crate::supabase`] (REST backends) and [`crate::schema`] (local SQLite).

use std::future::Future;

use crate::error::StorageResult;
use crate::models::{ImageRow, NewImageRow, StorageEntry};

/// Bucket-addressed blob storage
pub trait ObjectStorage: Send + Sync + 'static {
    /// Lists the direct children of `prefix` in `bucket`
    fn list(
        &self,
        bucket: &str,
        prefix: &str,
        limit: usize,
    ) -> impl Future<Output = StorageResult<Vec<StorageEntry>>> + Send;

    /// Stores `bytes` at `path`, replacing an existing object when `upsert` is set
    fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        mime_type: &str,
        upsert: bool,
    ) -> impl Future<Output = StorageResult<()>> + Send;

    /// Publicly fetchable URL of an object
    fn public_url(&self, bucket: &str, path: &str) -> StorageResult<String>;

    /// Fetches the bytes behind a URL returned by [`ObjectStorage::public_url`]
    fn download(&self, url: &str) -> impl Future<Output = StorageResult<Vec<u8>>> + Send;
}

/// User-scoped `images` table
pub trait RowStore: Send + Sync + 'static {
    /// All rows of a user, newest first
    fn select_images(
        &self,
        user_id: &str,
    ) -> impl Future<Output = StorageResult<Vec<ImageRow>>> + Send;

    /// Inserts a row and returns it with id and timestamps filled in
    fn insert_image(
        &self,
        row: NewImageRow,
    ) -> impl Future<Output = StorageResult<ImageRow>> + Send;
}

/// Joins a bucket-relative path, dropping duplicate slashes
pub fn object_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.trim_start_matches('/').to_string()
    } else {
        format!(
            "{}/{}",
            prefix.trim_end_matches('/'),
            name.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path() {
        assert_eq!(object_path("user-1/", "a.png"), "user-1/a.png");
        assert_eq!(object_path("user-1", "/a.png"), "user-1/a.png");
        assert_eq!(object_path("", "a.png"), "a.png");
    }
}
