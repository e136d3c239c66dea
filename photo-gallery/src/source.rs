//! Image record source
//!
//! Turns storage listings, row-store rows, uploads and edited exports into
//! [`ImageRecord`]s and owns the record set they end up in. All mutations of
//! the set go through [`RecordSource`]; the derived view only ever reads it.

use chrono::Utc;
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{GalleryError, GalleryResult};
use crate::models::{
    file_name_from_path, ImageRecord, NewImageRow, PhotoGalleryConfig, UploadFile, TAG_EDITED,
    TAG_UPLOADED,
};
use crate::storage::{object_path, ObjectStorage, RowStore};

/// Owned collection of records, unique by id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    records: Vec<ImageRecord>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set, keeping the first record for every id
    pub fn from_records(records: Vec<ImageRecord>) -> Self {
        let mut seen = HashSet::new();
        let records = records
            .into_iter()
            .filter(|r| seen.insert(r.id.clone()))
            .collect();
        Self { records }
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ImageRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub(crate) fn replace_all(&mut self, records: Vec<ImageRecord>) {
        *self = Self::from_records(records);
    }

    /// Puts a record in front; an existing record with the same id is replaced
    pub(crate) fn prepend(&mut self, record: ImageRecord) {
        self.records.retain(|r| r.id != record.id);
        self.records.insert(0, record);
    }

    /// Flips `favorite` and returns the new value
    pub(crate) fn toggle_favorite(&mut self, id: &str) -> Option<bool> {
        let record = self.records.iter_mut().find(|r| r.id == id)?;
        record.favorite = !record.favorite;
        Some(record.favorite)
    }
}

/// Monotonic counter used to tell the latest load request apart from stale ones
#[derive(Debug, Clone, Default)]
pub struct GenerationCounter(Arc<AtomicU64>);

impl GenerationCounter {
    /// Starts a new generation; every earlier token stops being current
    pub fn advance(&self) -> GenerationToken {
        let generation = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        GenerationToken {
            generation,
            counter: self.0.clone(),
        }
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct GenerationToken {
    generation: u64,
    counter: Arc<AtomicU64>,
}

impl GenerationToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.generation
    }
}

/// Result of a finished [`PendingLoad`]
#[derive(Debug)]
pub struct LoadOutcome {
    pub token: GenerationToken,
    pub user_id: String,
    pub records: Vec<ImageRecord>,
}

/// A load request for one user, detached from the session so it can be spawned
pub struct PendingLoad<S, R> {
    storage: Arc<S>,
    rows: Arc<R>,
    config: PhotoGalleryConfig,
    user_id: String,
    token: GenerationToken,
}

impl<S: ObjectStorage, R: RowStore> PendingLoad<S, R> {
    pub fn token(&self) -> &GenerationToken {
        &self.token
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Lists the bucket and the row store and merges both. Never fails;
    /// stops early once a newer load has been requested.
    pub async fn run(self) -> LoadOutcome {
        let mut records =
            load_from_bucket(self.storage.as_ref(), &self.config, &self.user_id).await;

        if !self.token.is_current() {
            log::debug!(
                "Load {} for {} superseded, skipping row store",
                self.token.generation(),
                self.user_id
            );
            return LoadOutcome {
                token: self.token,
                user_id: self.user_id,
                records: Vec::new(),
            };
        }

        let row_records = load_from_rows(self.rows.as_ref(), &self.user_id).await;
        records = merge_records(row_records, records);

        LoadOutcome {
            token: self.token,
            user_id: self.user_id,
            records,
        }
    }
}

/// Lists `<user_id>/` and normalizes every image file into a record.
/// Listing errors are logged and yield an empty sequence.
pub async fn load_from_bucket<S: ObjectStorage>(
    storage: &S,
    config: &PhotoGalleryConfig,
    user_id: &str,
) -> Vec<ImageRecord> {
    if user_id.trim().is_empty() {
        return Vec::new();
    }

    let prefix = config.user_prefix(user_id);
    let entries = match storage
        .list(&config.bucket, &prefix, config.listing_limit)
        .await
    {
        Ok(entries) => entries,
        Err(e) => {
            let err = GalleryError::listing(&e);
            log::error!("{}/{}: {}", config.bucket, prefix, err);
            return Vec::new();
        }
    };

    let fetched_at = Utc::now();
    let mut records = Vec::new();
    for entry in entries {
        if entry.is_dir || !config.accepts_name(&entry.name) {
            continue;
        }

        let path = object_path(&prefix, &entry.name);
        let url = match storage.public_url(&config.bucket, &path) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("No public URL for {}: {}", path, e);
                continue;
            }
        };

        let mut record = ImageRecord::new(
            ImageRecord::storage_id(&path),
            url,
            entry.name.clone(),
            entry.created_at.unwrap_or(fetched_at),
        );
        if let Some(size) = entry.size {
            record = record.with_size(size);
        }
        if let Some(mime) = entry.mime_type {
            record.mime_type = mime;
        }
        record.storage_path = Some(path);

        if record.is_displayable() {
            records.push(record);
        }
    }

    log::debug!("Listed {} images for {}", records.len(), user_id);
    records
}

/// Selects the user's rows and normalizes them. Errors yield an empty sequence.
pub async fn load_from_rows<R: RowStore>(rows: &R, user_id: &str) -> Vec<ImageRecord> {
    if user_id.trim().is_empty() {
        return Vec::new();
    }

    match rows.select_images(user_id).await {
        Ok(rows) => rows
            .iter()
            .filter_map(|row| {
                let record = ImageRecord::from_row(row);
                if record.is_none() {
                    log::warn!("Skipping row {} without an image URL", row.id);
                }
                record
            })
            .collect(),
        Err(e) => {
            log::error!("Error fetching images for {}: {}", user_id, e);
            Vec::new()
        }
    }
}

/// Row records first; bucket records whose URL a row already shows are dropped
fn merge_records(rows: Vec<ImageRecord>, bucket: Vec<ImageRecord>) -> Vec<ImageRecord> {
    let known_urls: HashSet<String> = rows.iter().map(|r| r.source_url.clone()).collect();
    rows.into_iter()
        .chain(
            bucket
                .into_iter()
                .filter(|r| !known_urls.contains(&r.source_url)),
        )
        .collect()
}

/// Short random suffix so names generated in the same millisecond differ
fn name_suffix() -> String {
    format!("{:06x}", rand::rng().random::<u32>() & 0xff_ffff)
}

/// Keeps ASCII alphanumerics, dots, dashes and underscores
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = file_name_from_path(name)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

/// Owner of the record set and the only place that mutates it
pub struct RecordSource<S, R> {
    storage: Arc<S>,
    rows: Arc<R>,
    config: PhotoGalleryConfig,
    records: RecordSet,
    /// Records registered since the latest `start_load`; a listing taken
    /// before they were stored does not contain them
    registered: Vec<ImageRecord>,
    user_id: Option<String>,
    generation: GenerationCounter,
}

impl<S: ObjectStorage, R: RowStore> RecordSource<S, R> {
    pub fn new(storage: Arc<S>, rows: Arc<R>, config: PhotoGalleryConfig) -> Self {
        Self {
            storage,
            rows,
            config,
            records: RecordSet::new(),
            registered: Vec::new(),
            user_id: None,
            generation: GenerationCounter::default(),
        }
    }

    pub fn config(&self) -> &PhotoGalleryConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        self.storage.as_ref()
    }

    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    /// User the latest load was requested for
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Starts loading the gallery of `user_id`. Any load still in flight
    /// becomes stale and its outcome will be ignored.
    pub fn start_load(&mut self, user_id: &str) -> PendingLoad<S, R> {
        let token = self.generation.advance();
        if self.user_id.as_deref() != Some(user_id) {
            self.records = RecordSet::new();
        }
        self.registered.clear();
        self.user_id = Some(user_id.to_string());

        log::info!("Loading gallery for {} (load {})", user_id, token.generation());

        PendingLoad {
            storage: self.storage.clone(),
            rows: self.rows.clone(),
            config: self.config.clone(),
            user_id: user_id.to_string(),
            token,
        }
    }

    /// Commits a finished load if it is still the latest one. Records
    /// registered while it ran stay in front of the loaded ones.
    /// Returns whether the record set was replaced.
    pub fn apply_load(&mut self, outcome: LoadOutcome) -> bool {
        if !outcome.token.is_current() {
            log::debug!(
                "Discarding stale load {} for {}",
                outcome.token.generation(),
                outcome.user_id
            );
            return false;
        }

        self.records.replace_all(outcome.records);
        for record in self.registered.iter().rev() {
            if self.records.get(&record.id).is_none() {
                log::debug!("Keeping {} registered during load", record.id);
                self.records.prepend(record.clone());
            }
        }
        log::info!(
            "Gallery for {} has {} images",
            outcome.user_id,
            self.records.len()
        );
        true
    }

    /// Abandons every load in flight, e.g. on sign-out
    pub fn cancel_loads(&mut self) {
        self.generation.advance();
    }

    /// Clears the record set and forgets the user
    pub fn reset(&mut self) {
        self.cancel_loads();
        self.records = RecordSet::new();
        self.registered.clear();
        self.user_id = None;
    }

    /// Loads and commits in one step
    pub async fn refresh(&mut self, user_id: &str) -> bool {
        let pending = self.start_load(user_id);
        let outcome = pending.run().await;
        self.apply_load(outcome)
    }

    /// Lists the bucket folder of `user_id` without touching the record set
    pub async fn load_from_bucket(&self, user_id: &str) -> Vec<ImageRecord> {
        load_from_bucket(self.storage.as_ref(), &self.config, user_id).await
    }

    fn insert_registered(&mut self, record: ImageRecord) {
        self.registered.retain(|r| r.id != record.id);
        self.registered.push(record.clone());
        self.records.prepend(record);
    }

    fn require_user(&self) -> GalleryResult<String> {
        self.user_id
            .clone()
            .ok_or_else(|| GalleryError::Validation("No user is signed in".to_string()))
    }

    async fn store_object(
        &self,
        user_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> GalleryResult<(String, String)> {
        let path = object_path(&self.config.user_prefix(user_id), file_name);
        self.storage
            .upload(&self.config.bucket, &path, bytes, mime_type, true)
            .await
            .map_err(|e| GalleryError::Upload(e.to_string()))?;
        let url = self
            .storage
            .public_url(&self.config.bucket, &path)
            .map_err(|e| GalleryError::Upload(e.to_string()))?;
        Ok((path, url))
    }

    /// Uploads a user file and puts its record first in the set
    pub async fn register_upload(&mut self, file: UploadFile) -> GalleryResult<ImageRecord> {
        let user_id = self.require_user()?;
        if file.is_empty() {
            return Err(GalleryError::Validation(format!("{} is empty", file.name)));
        }
        if file.len() > self.config.max_upload_bytes {
            return Err(GalleryError::Validation(format!(
                "{} is larger than {} MB",
                file.name,
                self.config.max_upload_bytes / (1024 * 1024)
            )));
        }

        let file_name = format!(
            "upload-{}-{}-{}",
            Utc::now().timestamp_millis(),
            name_suffix(),
            sanitize_file_name(&file.name)
        );
        let size = file.len();
        let (path, url) = self
            .store_object(&user_id, &file_name, file.bytes, &file.mime_type)
            .await?;

        let mut record = ImageRecord::new(ImageRecord::storage_id(&path), url, file_name, Utc::now())
            .with_size(size)
            .with_tag(TAG_UPLOADED);
        record.mime_type = file.mime_type;
        record.storage_path = Some(path);

        log::info!("Registered upload {}", record.id);
        self.insert_registered(record.clone());
        Ok(record)
    }

    /// Uploads a rendered edit as a new record derived from `source`.
    /// `source` itself stays in the set unchanged.
    pub async fn register_edited_copy(
        &mut self,
        source: &ImageRecord,
        rendered: Vec<u8>,
    ) -> GalleryResult<ImageRecord> {
        let user_id = self.require_user()?;
        if rendered.is_empty() {
            return Err(GalleryError::Render("Rendered image is empty".to_string()));
        }

        let file_name = format!(
            "edited-{}-{}.jpg",
            Utc::now().timestamp_millis(),
            name_suffix()
        );
        let size = rendered.len() as u64;
        let (path, url) = self
            .store_object(&user_id, &file_name, rendered, "image/jpeg")
            .await?;

        let mut record = ImageRecord::new(ImageRecord::storage_id(&path), url, file_name, Utc::now())
            .with_size(size);
        record.tags = source.tags.clone();
        record.tags.insert(TAG_EDITED.to_string());
        record.favorite = source.favorite;
        record.edited = true;
        record.mime_type = "image/jpeg".to_string();
        record.storage_path = Some(path);

        log::info!("Registered edited copy {} of {}", record.id, source.id);
        self.insert_registered(record.clone());
        Ok(record)
    }

    /// Records a transformation request for `source` in the row store
    pub async fn register_transformation(
        &mut self,
        source: &ImageRecord,
        style: &str,
    ) -> GalleryResult<ImageRecord> {
        let user_id = self.require_user()?;
        if style.trim().is_empty() {
            return Err(GalleryError::Validation("A style is required".to_string()));
        }

        let row = self
            .rows
            .insert_image(NewImageRow {
                user_id,
                original_url: source.source_url.clone(),
                transformed_url: None,
                style: style.to_string(),
                title: Some(format!("{} transformation", style)),
                status: "processing".to_string(),
            })
            .await
            .map_err(|e| GalleryError::RowStore(e.to_string()))?;

        let record = ImageRecord::from_row(&row).ok_or_else(|| {
            GalleryError::RowStore(format!("Row {} has no image URL", row.id))
        })?;

        log::info!("Requested {} transformation of {}", style, source.id);
        self.insert_registered(record.clone());
        Ok(record)
    }

    /// Flips `favorite` on a record; client-side only
    pub fn toggle_favorite(&mut self, id: &str) -> Option<bool> {
        self.records.toggle_favorite(id)
    }
}
