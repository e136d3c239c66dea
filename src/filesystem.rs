use chrono::{DateTime, Utc};
use photo_gallery::models::guess_mime_from_name;
use photo_gallery::{ObjectStorage, StorageEntry, StorageError, StorageResult};
use std::path::{Component, Path, PathBuf};

const FILE_SCHEME: &str = "file://";

/// Object storage on the local disk: `<root>/<bucket>/<path>`
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves a bucket path, refusing anything that escapes the bucket
    fn object_file(&self, bucket: &str, path: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidData(format!("Invalid path: {}", path)));
        }
        Ok(self.root.join(bucket).join(relative))
    }

    /// Resolves a `file://` URL handed out by `public_url`; it must point
    /// at an object inside one of the buckets under the root
    fn file_for_url(&self, url: &str) -> StorageResult<PathBuf> {
        let path = url
            .strip_prefix(FILE_SCHEME)
            .ok_or_else(|| StorageError::InvalidData(format!("Not a local URL: {}", url)))?;
        let root = std::path::absolute(&self.root).unwrap_or_else(|_| self.root.clone());
        let relative = Path::new(path)
            .strip_prefix(&root)
            .map_err(|_| StorageError::InvalidData(format!("Outside the storage root: {}", url)))?;

        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !contained || relative.components().count() < 2 {
            return Err(StorageError::InvalidData(format!("Invalid path: {}", url)));
        }
        Ok(root.join(relative))
    }
}

impl ObjectStorage for LocalStorage {
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        limit: usize,
    ) -> StorageResult<Vec<StorageEntry>> {
        let dir = self.object_file(bucket, prefix)?;
        if !dir.exists() {
            log::debug!("{:?} does not exist yet", dir);
            return Ok(Vec::new());
        }

        let mut read_dir = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| StorageError::Http(format!("Failed to read {:?}: {}", dir, e)))?;

        let mut entries = Vec::new();
        while let Some(item) = read_dir
            .next_entry()
            .await
            .map_err(|e| StorageError::Http(format!("Failed to read {:?}: {}", dir, e)))?
        {
            let name = item.file_name().to_string_lossy().to_string();
            let metadata = match item.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    log::warn!("Skipping {}: {}", name, e);
                    continue;
                }
            };
            let created_at: Option<DateTime<Utc>> = metadata
                .created()
                .or_else(|_| metadata.modified())
                .ok()
                .map(DateTime::<Utc>::from);

            entries.push(StorageEntry {
                is_dir: metadata.is_dir(),
                size: (!metadata.is_dir()).then(|| metadata.len()),
                mime_type: (!metadata.is_dir()).then(|| guess_mime_from_name(&name).to_string()),
                created_at,
                name,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _mime_type: &str,
        upsert: bool,
    ) -> StorageResult<()> {
        let file = self.object_file(bucket, path)?;
        if !upsert && file.exists() {
            return Err(StorageError::Status(409, format!("{} already exists", path)));
        }
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Http(format!("Failed to create {:?}: {}", parent, e)))?;
        }
        tokio::fs::write(&file, &bytes)
            .await
            .map_err(|e| StorageError::Http(format!("Failed to write {:?}: {}", file, e)))?;

        log::info!("Stored {} bytes at {:?}", bytes.len(), file);
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> StorageResult<String> {
        if path.trim_matches('/').is_empty() {
            return Err(StorageError::InvalidData("Path is required".to_string()));
        }
        let file = self.object_file(bucket, path)?;
        let absolute = std::path::absolute(&file).unwrap_or(file);
        Ok(format!("{}{}", FILE_SCHEME, absolute.display()))
    }

    async fn download(&self, url: &str) -> StorageResult<Vec<u8>> {
        let file = self.file_for_url(url)?;
        tokio::fs::read(&file)
            .await
            .map_err(|e| StorageError::Status(404, format!("{:?}: {}", file, e)))
    }
}
