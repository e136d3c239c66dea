//! # Photo Gallery
//!
//! Gallery aggregation and view pipeline for user image collections.
//!
//! This crate provides:
//! - Normalization of storage listings, database rows, uploads and edited
//!   exports into one [`ImageRecord`] shape ([`source`])
//! - Search, filter and sort over the record set ([`view`])
//! - Selection, favorites, a lightbox viewer and an image editor ([`session`])
//! - Brightness/contrast/saturation/rotation/grayscale/sepia rendering ([`adjust`])
//! - Object storage and row store collaborators: Supabase REST backends
//!   (feature `supabase`) and a local SQLite row store
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use photo_gallery::{GallerySession, PhotoGalleryConfig, RecordSource};
//!
//! let source = RecordSource::new(storage, rows, PhotoGalleryConfig::default());
//! let mut session = GallerySession::new(source);
//!
//! let pending = session.start_load(&user_id);
//! let outcome = tokio::spawn(pending.run()).await?;
//! session.apply_load(outcome);
//!
//! for record in session.view() {
//!     println!("{} {}", record.name, record.size_label);
//! }
//! ```

pub mod adjust;
pub mod error;
pub mod models;
pub mod schema;
pub mod session;
pub mod source;
pub mod storage;
pub mod view;

#[cfg(feature = "supabase")]
pub mod supabase;

#[cfg(test)]
pub(crate) mod testing;

pub use adjust::{render_adjustments, AdjustmentParams, AdjustmentUpdate, RotateDirection};
pub use error::{GalleryError, GalleryResult, StorageError, StorageResult};
pub use models::{
    ImageRecord, ImageRow, ImageStatus, NewImageRow, PhotoGalleryConfig, StorageEntry, UploadFile,
};
pub use schema::SqliteRowStore;
pub use session::{Direction, GallerySession, Notification, NotificationLevel};
pub use source::{LoadOutcome, PendingLoad, RecordSet, RecordSource};
pub use storage::{ObjectStorage, RowStore};
pub use view::{derived_view, FilterBy, SortBy, SortOrder, ViewContext, ViewMode, ViewParams, YearMonth};

#[cfg(feature = "supabase")]
pub use supabase::{PostgrestRowStore, SupabaseConfig, SupabaseStorage};
