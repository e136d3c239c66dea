//! Error types for the gallery pipeline and its storage collaborators.

/// Result type for collaborator calls (object storage, row store)
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for gallery operations
pub type GalleryResult<T> = Result<T, GalleryError>;

/// Errors returned by the object storage and row store collaborators
#[derive(Debug)]
pub enum StorageError {
    /// Transport failure (connection refused, timeout, TLS, ...)
    Http(String),
    /// The backend answered with a non-success status
    Status(u16, String),
    /// Response body could not be decoded
    Json(String),
    DatabaseError(rusqlite::Error),
    /// Input rejected before it reached the backend
    InvalidData(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Http(msg) => write!(f, "HTTP error: {}", msg),
            StorageError::Status(code, body) => write!(f, "Backend returned {}: {}", code, body),
            StorageError::Json(msg) => write!(f, "JSON error: {}", msg),
            StorageError::DatabaseError(e) => write!(f, "Database error: {}", e),
            StorageError::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::DatabaseError(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Json(err.to_string())
    }
}

#[cfg(feature = "supabase")]
impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StorageError::Json(err.to_string())
        } else {
            StorageError::Http(err.to_string())
        }
    }
}

/// Errors surfaced by the gallery session
#[derive(Debug)]
pub enum GalleryError {
    /// Storage listing failed; recovered as an empty gallery
    Listing(String),
    /// Upload or public URL resolution failed
    Upload(String),
    /// Decoding, rendering or encoding an image failed
    Render(String),
    /// An action was attempted without its precondition
    Validation(String),
    /// Row store select/insert failed
    RowStore(String),
}

impl std::fmt::Display for GalleryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GalleryError::Listing(msg) => write!(f, "Listing failed: {}", msg),
            GalleryError::Upload(msg) => write!(f, "Upload failed: {}", msg),
            GalleryError::Render(msg) => write!(f, "Render failed: {}", msg),
            GalleryError::Validation(msg) => write!(f, "Validation error: {}", msg),
            GalleryError::RowStore(msg) => write!(f, "Row store error: {}", msg),
        }
    }
}

impl std::error::Error for GalleryError {}

impl From<image::ImageError> for GalleryError {
    fn from(err: image::ImageError) -> Self {
        GalleryError::Render(err.to_string())
    }
}

impl GalleryError {
    pub fn listing(err: &StorageError) -> Self {
        GalleryError::Listing(err.to_string())
    }

    /// Short title for a user-facing notification
    pub fn title(&self) -> &'static str {
        match self {
            GalleryError::Listing(_) => "Could not load images",
            GalleryError::Upload(_) => "Upload failed",
            GalleryError::Render(_) => "Could not render image",
            GalleryError::Validation(_) => "Action not available",
            GalleryError::RowStore(_) => "Could not save image",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let err = StorageError::Status(403, "forbidden".to_string());
        assert_eq!(err.to_string(), "Backend returned 403: forbidden");
    }

    #[test]
    fn test_gallery_error_title() {
        let err = GalleryError::Upload("bucket missing".to_string());
        assert_eq!(err.title(), "Upload failed");
        assert_eq!(err.to_string(), "Upload failed: bucket missing");
    }

    #[test]
    fn test_listing_error_from_storage() {
        let err = GalleryError::listing(&StorageError::Status(404, "Bucket not found".to_string()));
        assert!(matches!(err, GalleryError::Listing(_)));
        assert_eq!(err.title(), "Could not load images");
        assert_eq!(
            err.to_string(),
            "Listing failed: Backend returned 404: Bucket not found"
        );
    }
}
