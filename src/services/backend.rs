//! Runtime choice between the Supabase and the local collaborators

use photo_gallery::{
    ImageRow, NewImageRow, ObjectStorage, PostgrestRowStore, RowStore, SqliteRowStore,
    StorageEntry, StorageResult, SupabaseStorage,
};

use crate::filesystem::LocalStorage;

pub enum AppStorage {
    Supabase(SupabaseStorage),
    Local(LocalStorage),
}

impl ObjectStorage for AppStorage {
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        limit: usize,
    ) -> StorageResult<Vec<StorageEntry>> {
        match self {
            AppStorage::Supabase(s) => s.list(bucket, prefix, limit).await,
            AppStorage::Local(s) => s.list(bucket, prefix, limit).await,
        }
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        mime_type: &str,
        upsert: bool,
    ) -> StorageResult<()> {
        match self {
            AppStorage::Supabase(s) => s.upload(bucket, path, bytes, mime_type, upsert).await,
            AppStorage::Local(s) => s.upload(bucket, path, bytes, mime_type, upsert).await,
        }
    }

    fn public_url(&self, bucket: &str, path: &str) -> StorageResult<String> {
        match self {
            AppStorage::Supabase(s) => s.public_url(bucket, path),
            AppStorage::Local(s) => s.public_url(bucket, path),
        }
    }

    async fn download(&self, url: &str) -> StorageResult<Vec<u8>> {
        match self {
            AppStorage::Supabase(s) => s.download(url).await,
            AppStorage::Local(s) => s.download(url).await,
        }
    }
}

pub enum AppRowStore {
    Postgrest(PostgrestRowStore),
    Sqlite(SqliteRowStore),
}

impl RowStore for AppRowStore {
    async fn select_images(&self, user_id: &str) -> StorageResult<Vec<ImageRow>> {
        match self {
            AppRowStore::Postgrest(r) => r.select_images(user_id).await,
            AppRowStore::Sqlite(r) => r.select_images(user_id).await,
        }
    }

    async fn insert_image(&self, row: NewImageRow) -> StorageResult<ImageRow> {
        match self {
            AppRowStore::Postgrest(r) => r.insert_image(row).await,
            AppRowStore::Sqlite(r) => r.insert_image(row).await,
        }
    }
}
