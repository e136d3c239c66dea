//! Supabase backends for the gallery collaborators
//!
//! [`SupabaseStorage`] talks to the Storage REST API (`/storage/v1`) and
//! [`PostgrestRowStore`] to the PostgREST endpoint (`/rest/v1`) of the same
//! project. Both authenticate with the project API key and, once the user is
//! signed in, the user's access token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{StorageError, StorageResult};
use crate::models::{ImageRow, NewImageRow, StorageEntry};
use crate::storage::{ObjectStorage, RowStore};

const USER_AGENT: &str = concat!("photo-gallery/", env!("CARGO_PKG_VERSION"));

/// Connection settings shared by the Supabase backends
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://abc.supabase.co`
    pub url: String,
    /// Project anon/public API key
    pub api_key: String,
    /// Access token of the signed-in user; falls back to the API key
    pub access_token: Option<String>,
}

impl SupabaseConfig {
    fn base(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    fn bearer(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.api_key)
    }
}

fn build_client() -> StorageResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .connect_timeout(Duration::from_secs(10))
        .tcp_keepalive(Duration::from_secs(30))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| StorageError::Http(format!("Client build failed: {}", e)))
}

async fn check_status(response: reqwest::Response) -> StorageResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Status(status.as_u16(), body))
}

#[derive(Debug, Serialize)]
struct ListRequest<'a> {
    prefix: &'a str,
    limit: usize,
    offset: usize,
    #[serde(rename = "sortBy")]
    sort_by: SortBy<'a>,
}

#[derive(Debug, Serialize)]
struct SortBy<'a> {
    column: &'a str,
    order: &'a str,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    name: String,
    /// Folders come back without an object id
    id: Option<String>,
    created_at: Option<DateTime<Utc>>,
    metadata: Option<ListMetadata>,
}

#[derive(Debug, Deserialize)]
struct ListMetadata {
    size: Option<u64>,
    mimetype: Option<String>,
    #[serde(rename = "isDir")]
    is_dir: Option<bool>,
}

impl From<ListItem> for StorageEntry {
    fn from(item: ListItem) -> Self {
        let metadata_dir = item
            .metadata
            .as_ref()
            .and_then(|m| m.is_dir)
            .unwrap_or(false);
        let (size, mime_type) = match item.metadata {
            Some(m) => (m.size, m.mimetype),
            None => (None, None),
        };
        StorageEntry {
            is_dir: item.id.is_none() || metadata_dir,
            name: item.name,
            size,
            mime_type,
            created_at: item.created_at,
        }
    }
}

/// Supabase Storage REST client
pub struct SupabaseStorage {
    config: SupabaseConfig,
    client: reqwest::Client,
}

impl SupabaseStorage {
    pub fn new(config: SupabaseConfig) -> StorageResult<Self> {
        Ok(Self {
            config,
            client: build_client()?,
        })
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.base(),
            bucket,
            path.trim_start_matches('/')
        )
    }
}

impl ObjectStorage for SupabaseStorage {
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        limit: usize,
    ) -> StorageResult<Vec<StorageEntry>> {
        let url = format!("{}/storage/v1/object/list/{}", self.config.base(), bucket);
        let body = ListRequest {
            prefix,
            limit,
            offset: 0,
            sort_by: SortBy {
                column: "name",
                order: "asc",
            },
        };

        log::debug!("Listing {}/{} (limit {})", bucket, prefix, limit);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(self.config.bearer())
            .json(&body)
            .send()
            .await?;
        let items = check_status(response).await?.json::<Vec<ListItem>>().await?;

        Ok(items.into_iter().map(StorageEntry::from).collect())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        mime_type: &str,
        upsert: bool,
    ) -> StorageResult<()> {
        let url = self.object_url(bucket, path);
        let size = bytes.len();

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(self.config.bearer())
            .header("Content-Type", mime_type)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(bytes)
            .send()
            .await?;
        check_status(response).await?;

        log::info!("Uploaded {} bytes to {}/{}", size, bucket, path);
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> StorageResult<String> {
        if bucket.is_empty() || path.trim_matches('/').is_empty() {
            return Err(StorageError::InvalidData(
                "Bucket and path are required for a public URL".to_string(),
            ));
        }
        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.base(),
            bucket,
            path.trim_start_matches('/')
        ))
    }

    async fn download(&self, url: &str) -> StorageResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .header("apikey", &self.config.api_key)
            .send()
            .await?;
        let bytes = check_status(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// PostgREST client for the `images` table
pub struct PostgrestRowStore {
    config: SupabaseConfig,
    table: String,
    client: reqwest::Client,
}

impl PostgrestRowStore {
    pub fn new(config: SupabaseConfig, table: &str) -> StorageResult<Self> {
        Ok(Self {
            config,
            table: table.to_string(),
            client: build_client()?,
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.config.base(), self.table)
    }
}

impl RowStore for PostgrestRowStore {
    async fn select_images(&self, user_id: &str) -> StorageResult<Vec<ImageRow>> {
        let user_filter = format!("eq.{}", user_id);
        let response = self
            .client
            .get(self.table_url())
            .header("apikey", &self.config.api_key)
            .bearer_auth(self.config.bearer())
            .query(&[
                ("select", "*"),
                ("user_id", user_filter.as_str()),
                ("order", "created_at.desc"),
            ])
            .send()
            .await?;
        let rows = check_status(response).await?.json::<Vec<ImageRow>>().await?;

        log::debug!("Selected {} rows from {}", rows.len(), self.table);
        Ok(rows)
    }

    async fn insert_image(&self, row: NewImageRow) -> StorageResult<ImageRow> {
        let response = self
            .client
            .post(self.table_url())
            .header("apikey", &self.config.api_key)
            .bearer_auth(self.config.bearer())
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await?;
        let mut rows = check_status(response).await?.json::<Vec<ImageRow>>().await?;

        if rows.is_empty() {
            return Err(StorageError::InvalidData(
                "Insert returned no representation".to_string(),
            ));
        }
        Ok(rows.swap_remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SupabaseConfig {
        SupabaseConfig {
            url: "https://project.supabase.co/".to_string(),
            api_key: "anon".to_string(),
            access_token: None,
        }
    }

    #[test]
    fn test_public_url() {
        let storage = SupabaseStorage::new(config()).unwrap();
        assert_eq!(
            storage.public_url("user-images", "user-1/a.png").unwrap(),
            "https://project.supabase.co/storage/v1/object/public/user-images/user-1/a.png"
        );
        assert!(storage.public_url("user-images", "").is_err());
    }

    #[test]
    fn test_list_item_folder_and_file() {
        let json = r#"[
            {"name": "nested", "id": null, "created_at": null, "metadata": null},
            {"name": "a.png", "id": "0b1c", "created_at": "2025-03-01T10:00:00.000Z",
             "metadata": {"size": 2048, "mimetype": "image/png", "eTag": "\"abc\""}}
        ]"#;
        let items: Vec<ListItem> = serde_json::from_str(json).unwrap();
        let entries: Vec<StorageEntry> = items.into_iter().map(StorageEntry::from).collect();

        assert!(entries[0].is_dir);
        assert!(!entries[1].is_dir);
        assert_eq!(entries[1].size, Some(2048));
        assert_eq!(entries[1].mime_type.as_deref(), Some("image/png"));
        assert!(entries[1].created_at.is_some());
    }

    #[test]
    fn test_bearer_prefers_access_token() {
        let mut cfg = config();
        assert_eq!(cfg.bearer(), "anon");
        cfg.access_token = Some("jwt".to_string());
        assert_eq!(cfg.bearer(), "jwt");
    }
}
