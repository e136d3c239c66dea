//! In-memory collaborators for tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::{StorageError, StorageResult};
use crate::models::{guess_mime_from_name, StorageEntry};
use crate::storage::ObjectStorage;

const URL_SCHEME: &str = "memory://";

/// Object storage keeping every object in a map keyed by bucket path.
/// The bucket name only shows up in public URLs.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    /// Listing entries without a backing object, keyed by folder prefix
    entries: Mutex<Vec<(String, StorageEntry)>>,
    fail_listing: AtomicBool,
    fail_uploads: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_object(&self, path: &str, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(path.to_string(), bytes);
    }

    pub fn put_entry(&self, prefix: &str, entry: StorageEntry) {
        self.entries
            .lock()
            .unwrap()
            .push((prefix.to_string(), entry));
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(path).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }
}

impl ObjectStorage for MemoryStorage {
    async fn list(
        &self,
        _bucket: &str,
        prefix: &str,
        limit: usize,
    ) -> StorageResult<Vec<StorageEntry>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(StorageError::Status(500, "listing disabled".to_string()));
        }

        let mut listed: Vec<StorageEntry> = Vec::new();
        for (path, bytes) in self.objects.lock().unwrap().iter() {
            let Some(rest) = path.strip_prefix(prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((folder, _)) => {
                    if !listed.iter().any(|e| e.is_dir && e.name == folder) {
                        listed.push(StorageEntry {
                            name: folder.to_string(),
                            is_dir: true,
                            size: None,
                            mime_type: None,
                            created_at: None,
                        });
                    }
                }
                None => listed.push(StorageEntry {
                    name: rest.to_string(),
                    is_dir: false,
                    size: Some(bytes.len() as u64),
                    mime_type: Some(guess_mime_from_name(rest).to_string()),
                    created_at: None,
                }),
            }
        }

        for (entry_prefix, entry) in self.entries.lock().unwrap().iter() {
            if entry_prefix == prefix {
                listed.push(entry.clone());
            }
        }

        listed.truncate(limit);
        Ok(listed)
    }

    async fn upload(
        &self,
        _bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _mime_type: &str,
        upsert: bool,
    ) -> StorageResult<()> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Status(503, "uploads disabled".to_string()));
        }
        let mut objects = self.objects.lock().unwrap();
        if !upsert && objects.contains_key(path) {
            return Err(StorageError::Status(409, format!("{} exists", path)));
        }
        objects.insert(path.to_string(), bytes);
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> StorageResult<String> {
        if path.is_empty() {
            return Err(StorageError::InvalidData("empty path".to_string()));
        }
        Ok(format!("{}{}/{}", URL_SCHEME, bucket, path))
    }

    async fn download(&self, url: &str) -> StorageResult<Vec<u8>> {
        let path = url
            .strip_prefix(URL_SCHEME)
            .and_then(|rest| rest.split_once('/'))
            .map(|(_, path)| path)
            .ok_or_else(|| StorageError::InvalidData(format!("not a memory URL: {}", url)))?;
        self.object(path)
            .ok_or_else(|| StorageError::Status(404, format!("{} not found", path)))
    }
}
