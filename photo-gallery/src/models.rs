use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{GalleryError, GalleryResult};

/// Size label used when a listing does not report a size
pub const UNKNOWN_SIZE: &str = "Unknown";

/// Provenance tags attached by the record source
pub const TAG_UPLOADED: &str = "uploaded";
pub const TAG_EDITED: &str = "edited";
pub const TAG_SUPABASE: &str = "supabase";

/// One image as the gallery sees it, whatever backend it came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRecord {
    pub id: String,
    pub source_url: String,
    pub thumbnail_url: String,
    pub name: String,
    pub size_label: String,
    pub created_at: DateTime<Utc>,
    pub tags: BTreeSet<String>,
    pub favorite: bool,
    pub edited: bool,
    pub mime_type: String,
    /// Bucket path for records that live in object storage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
    /// Processing status for records that come from the row store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ImageStatus>,
}

impl ImageRecord {
    /// Creates a record with unknown size, no tags and both flags cleared
    pub fn new(id: String, source_url: String, name: String, created_at: DateTime<Utc>) -> Self {
        let mime_type = guess_mime_from_name(&name).to_string();
        Self {
            id,
            thumbnail_url: source_url.clone(),
            source_url,
            name,
            size_label: UNKNOWN_SIZE.to_string(),
            created_at,
            tags: BTreeSet::new(),
            favorite: false,
            edited: false,
            mime_type,
            storage_path: None,
            status: None,
        }
    }

    /// Synthesized id for objects addressed by their bucket path
    pub fn storage_id(path: &str) -> String {
        format!("storage:{}", path)
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.insert(tag.to_string());
        self
    }

    pub fn with_size(mut self, bytes: u64) -> Self {
        self.size_label = format_size_label(bytes);
        self
    }

    /// Whether the record carries everything the view needs
    pub fn is_displayable(&self) -> bool {
        !self.source_url.trim().is_empty() && !self.name.trim().is_empty()
    }

    /// Size in MB parsed from the label, `None` when unknown
    pub fn size_mb(&self) -> Option<f64> {
        parse_size_mb(&self.size_label)
    }

    /// Normalizes a row-store row. Rows without any usable URL are skipped.
    pub fn from_row(row: &ImageRow) -> Option<Self> {
        let source_url = row
            .transformed_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(&row.original_url)
            .to_string();
        if source_url.trim().is_empty() {
            return None;
        }

        let name = row
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&row.style)
            .to_string();
        let name = if name.trim().is_empty() {
            "Untitled".to_string()
        } else {
            name
        };

        let mut record = ImageRecord::new(row.id.clone(), source_url, name, row.created_at);
        record.mime_type = guess_mime_from_name(&record.source_url).to_string();
        record.tags.insert(TAG_SUPABASE.to_string());
        if !row.style.trim().is_empty() {
            record.tags.insert(row.style.clone());
        }
        let status = ImageStatus::from(row.status.clone());
        record.tags.insert(status.as_str().to_string());
        record.status = Some(status);
        Some(record)
    }
}

/// Processing state of a transformation row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ImageStatus {
    Completed,
    Processing,
    Failed,
    Other(String),
}

impl ImageStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ImageStatus::Completed => "completed",
            ImageStatus::Processing => "processing",
            ImageStatus::Failed => "failed",
            ImageStatus::Other(s) => s,
        }
    }
}

impl From<String> for ImageStatus {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "completed" => ImageStatus::Completed,
            "processing" => ImageStatus::Processing,
            "failed" => ImageStatus::Failed,
            _ => ImageStatus::Other(s),
        }
    }
}

impl From<ImageStatus> for String {
    fn from(status: ImageStatus) -> Self {
        status.as_str().to_string()
    }
}

/// A row of the user-scoped `images` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRow {
    pub id: String,
    pub user_id: String,
    pub original_url: String,
    pub transformed_url: Option<String>,
    pub style: String,
    pub title: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for the `images` table; id and timestamps are assigned by the store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewImageRow {
    pub user_id: String,
    pub original_url: String,
    pub transformed_url: Option<String>,
    pub style: String,
    pub title: Option<String>,
    pub status: String,
}

/// One item of a storage listing
#[derive(Debug, Clone, PartialEq)]
pub struct StorageEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: Option<u64>,
    pub mime_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl StorageEntry {
    pub fn file(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_dir: false,
            size: None,
            mime_type: None,
            created_at: None,
        }
    }
}

/// A file picked by the user, ready to upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            mime_type: guess_mime_from_name(name).to_string(),
            bytes,
        }
    }

    /// Decodes a `data:<mime>;base64,<payload>` URL
    pub fn from_data_url(name: &str, data_url: &str) -> GalleryResult<Self> {
        let rest = data_url
            .strip_prefix("data:")
            .ok_or_else(|| GalleryError::Validation("Not a data URL".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| GalleryError::Validation("Data URL has no payload".to_string()))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| GalleryError::Validation("Only base64 data URLs are supported".to_string()))?;
        if !mime.starts_with("image/") {
            return Err(GalleryError::Validation(format!(
                "Unsupported content type: {}",
                mime
            )));
        }

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| GalleryError::Validation(format!("Invalid base64 payload: {}", e)))?;

        Ok(Self {
            name: name.to_string(),
            mime_type: mime.to_string(),
            bytes,
        })
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Configuration for the gallery pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PhotoGalleryConfig {
    /// Storage bucket holding the user folders
    pub bucket: String,
    /// Maximum entries requested per listing
    pub listing_limit: usize,
    /// File extensions shown in the gallery (lowercase, without dot)
    pub image_extensions: Vec<String>,
    /// When non-empty, only names starting with one of these are listed
    pub name_prefixes: Vec<String>,
    /// Upload size limit in bytes
    pub max_upload_bytes: u64,
    /// JPEG quality for edited exports (1-100)
    pub export_quality: u8,
    /// Window of the "recent" filter in days
    pub recent_window_days: i64,
    /// Threshold of the "large" filter in MB
    pub large_threshold_mb: f64,
}

impl Default for PhotoGalleryConfig {
    fn default() -> Self {
        Self {
            bucket: "user-images".to_string(),
            listing_limit: 100,
            image_extensions: ["jpg", "jpeg", "png", "gif", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            name_prefixes: Vec::new(),
            max_upload_bytes: 10 * 1024 * 1024,
            export_quality: 90,
            recent_window_days: 7,
            large_threshold_mb: 2.0,
        }
    }
}

impl PhotoGalleryConfig {
    /// Whether a listed file name belongs in the gallery
    pub fn accepts_name(&self, name: &str) -> bool {
        if name.is_empty() || name.starts_with('.') {
            return false;
        }
        let lower = name.to_ascii_lowercase();
        let has_image_ext = lower
            .rsplit_once('.')
            .map(|(_, ext)| self.image_extensions.iter().any(|e| e == ext))
            .unwrap_or(false);
        let has_prefix =
            self.name_prefixes.is_empty() || self.name_prefixes.iter().any(|p| name.starts_with(p));
        has_image_ext && has_prefix
    }

    /// Folder of a user inside the bucket
    pub fn user_prefix(&self, user_id: &str) -> String {
        format!("{}/", user_id.trim_end_matches('/'))
    }
}

/// Formats a byte count the way the gallery displays it ("3.5 MB")
pub fn format_size_label(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Parses the leading number of a size label as megabytes
pub fn parse_size_mb(label: &str) -> Option<f64> {
    let trimmed = label.trim_start();
    let end = trimmed
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    trimmed[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Simple MIME type guess from the file extension
pub fn guess_mime_from_name(name: &str) -> &'static str {
    let name = name.split(['?', '#']).next().unwrap_or(name);
    match name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        _ => "image/jpeg",
    }
}

/// Last segment of a storage path
pub fn file_name_from_path(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(transformed: Option<&str>, title: Option<&str>) -> ImageRow {
        let now = Utc::now();
        ImageRow {
            id: "row-1".to_string(),
            user_id: "user-1".to_string(),
            original_url: "https://cdn.example/original.png".to_string(),
            transformed_url: transformed.map(|s| s.to_string()),
            style: "Ghibli".to_string(),
            title: title.map(|s| s.to_string()),
            status: "completed".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_new_record_defaults() {
        let record = ImageRecord::new(
            "a".to_string(),
            "https://cdn.example/a.png".to_string(),
            "a.png".to_string(),
            Utc::now(),
        );
        assert!(!record.favorite);
        assert!(!record.edited);
        assert_eq!(record.size_label, UNKNOWN_SIZE);
        assert_eq!(record.thumbnail_url, record.source_url);
        assert_eq!(record.mime_type, "image/png");
    }

    #[test]
    fn test_parse_size_mb() {
        assert_eq!(parse_size_mb("3.5 MB"), Some(3.5));
        assert_eq!(parse_size_mb("1.0 MB"), Some(1.0));
        assert_eq!(parse_size_mb("12MB"), Some(12.0));
        assert_eq!(parse_size_mb(UNKNOWN_SIZE), None);
        assert_eq!(parse_size_mb(""), None);
    }

    #[test]
    fn test_format_size_label() {
        assert_eq!(format_size_label(3 * 1024 * 1024 + 512 * 1024), "3.5 MB");
        assert_eq!(format_size_label(0), "0.0 MB");
    }

    #[test]
    fn test_from_row_prefers_transformed_url() {
        let record = ImageRecord::from_row(&row(Some("https://cdn.example/t.webp"), None)).unwrap();
        assert_eq!(record.source_url, "https://cdn.example/t.webp");
        assert_eq!(record.name, "Ghibli");
        assert_eq!(record.mime_type, "image/webp");
        assert_eq!(record.status, Some(ImageStatus::Completed));
        assert!(record.tags.contains(TAG_SUPABASE));
        assert!(record.tags.contains("completed"));
    }

    #[test]
    fn test_from_row_falls_back_to_original() {
        let record = ImageRecord::from_row(&row(Some(""), Some("My cat"))).unwrap();
        assert_eq!(record.source_url, "https://cdn.example/original.png");
        assert_eq!(record.name, "My cat");
    }

    #[test]
    fn test_accepts_name() {
        let mut config = PhotoGalleryConfig::default();
        assert!(config.accepts_name("photo.JPG"));
        assert!(!config.accepts_name(".emptyFolderPlaceholder"));
        assert!(!config.accepts_name("notes.txt"));
        assert!(!config.accepts_name("folder"));

        config.name_prefixes = vec!["transform-".to_string()];
        assert!(config.accepts_name("transform-1.png"));
        assert!(!config.accepts_name("upload-1.png"));
    }

    #[test]
    fn test_upload_file_from_data_url() {
        let file = UploadFile::from_data_url("x.png", "data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(file.mime_type, "image/png");
        assert_eq!(file.bytes, b"hello");

        assert!(UploadFile::from_data_url("x.txt", "data:text/plain;base64,aGVsbG8=").is_err());
        assert!(UploadFile::from_data_url("x.png", "https://example.com/x.png").is_err());
    }

    #[test]
    fn test_file_name_from_path() {
        assert_eq!(file_name_from_path("user-1/edited-1.jpg"), "edited-1.jpg");
        assert_eq!(file_name_from_path("plain.png"), "plain.png");
    }
}
