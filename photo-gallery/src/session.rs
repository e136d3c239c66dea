//! Gallery session: selection, favorites, the viewer and the image editor.
//!
//! Every index handled here points into the current derived view, not into
//! the record set. Operations that can fail also push a [`Notification`] so
//! a front-end can show a toast without inspecting the error.

use image::{DynamicImage, RgbaImage};
use std::collections::BTreeSet;

use crate::adjust::{decode_image, encode_jpeg, render_adjustments, AdjustmentParams, AdjustmentUpdate};
use crate::error::{GalleryError, GalleryResult};
use crate::models::{ImageRecord, UploadFile};
use crate::source::{LoadOutcome, PendingLoad, RecordSource};
use crate::storage::{ObjectStorage, RowStore};
use crate::view::{available_months, derived_view, MonthOption, ViewContext, ViewMode, ViewParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn success(title: &str, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            title: title.to_string(),
            message: message.into(),
        }
    }

    pub fn error(err: &GalleryError) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: err.title().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

/// State of an open editor
pub struct EditSession {
    record: ImageRecord,
    source: DynamicImage,
    params: AdjustmentParams,
    preview: RgbaImage,
}

impl EditSession {
    fn new(record: ImageRecord, source: DynamicImage) -> Self {
        let params = AdjustmentParams::default();
        let preview = render_adjustments(&source, &params);
        Self {
            record,
            source,
            params,
            preview,
        }
    }

    pub fn record(&self) -> &ImageRecord {
        &self.record
    }

    pub fn params(&self) -> &AdjustmentParams {
        &self.params
    }

    pub fn preview(&self) -> &RgbaImage {
        &self.preview
    }
}

pub struct GallerySession<S, R> {
    source: RecordSource<S, R>,
    params: ViewParams,
    view_mode: ViewMode,
    selected: BTreeSet<String>,
    viewer: Option<usize>,
    edit: Option<EditSession>,
    notifications: Vec<Notification>,
}

impl<S: ObjectStorage, R: RowStore> GallerySession<S, R> {
    pub fn new(source: RecordSource<S, R>) -> Self {
        Self {
            source,
            params: ViewParams::default(),
            view_mode: ViewMode::default(),
            selected: BTreeSet::new(),
            viewer: None,
            edit: None,
            notifications: Vec::new(),
        }
    }

    pub fn source(&self) -> &RecordSource<S, R> {
        &self.source
    }

    pub fn records(&self) -> &[ImageRecord] {
        self.source.records().records()
    }

    // --- loading ---

    pub fn start_load(&mut self, user_id: &str) -> PendingLoad<S, R> {
        if self.source.user_id() != Some(user_id) {
            self.clear_interaction();
        }
        self.source.start_load(user_id)
    }

    /// Commits a finished load; stale outcomes are ignored
    pub fn apply_load(&mut self, outcome: LoadOutcome) -> bool {
        if !self.source.apply_load(outcome) {
            return false;
        }
        let source = &self.source;
        self.selected.retain(|id| source.records().get(id).is_some());
        self.clamp_viewer();
        true
    }

    pub fn cancel_loads(&mut self) {
        self.source.cancel_loads();
    }

    pub async fn refresh(&mut self, user_id: &str) -> bool {
        let pending = self.start_load(user_id);
        let outcome = pending.run().await;
        self.apply_load(outcome)
    }

    /// Drops all records and interaction state, e.g. on sign-out
    pub fn reset(&mut self) {
        self.source.reset();
        self.clear_interaction();
    }

    fn clear_interaction(&mut self) {
        self.selected.clear();
        self.viewer = None;
        self.edit = None;
    }

    // --- derived view ---

    pub fn view_params(&self) -> &ViewParams {
        &self.params
    }

    pub fn view_context(&self) -> ViewContext {
        ViewContext::at_now(self.source.config())
    }

    /// Current filtered and sorted sequence
    pub fn view(&self) -> Vec<&ImageRecord> {
        derived_view(self.records(), &self.params, &self.view_context())
    }

    pub fn available_months(&self) -> Vec<MonthOption> {
        available_months(self.records())
    }

    /// Replaces the view parameters; closes the viewer if its index is gone
    pub fn set_view(&mut self, params: ViewParams) {
        self.params = params;
        self.clamp_viewer();
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    fn viewed_id(&self) -> Option<String> {
        self.current_record().map(|r| r.id.clone())
    }

    /// Points the open viewer back at `id` after records were added in front
    fn keep_viewer_on(&mut self, id: Option<String>) {
        let Some(id) = id else { return };
        match self.view().iter().position(|r| r.id == id) {
            Some(index) => self.viewer = Some(index),
            None => self.clamp_viewer(),
        }
    }

    fn clamp_viewer(&mut self) {
        if let Some(index) = self.viewer {
            if index >= self.view().len() {
                self.close_viewer();
            }
        }
    }

    // --- selection and favorites ---

    /// Returns whether `id` is selected afterwards
    pub fn toggle_select(&mut self, id: &str) -> bool {
        if self.selected.remove(id) {
            false
        } else {
            self.selected.insert(id.to_string());
            true
        }
    }

    pub fn selected(&self) -> &BTreeSet<String> {
        &self.selected
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn can_edit_selected(&self) -> bool {
        self.selected.len() == 1
    }

    /// Opens the editor on the only selected record
    pub async fn edit_selected(&mut self) -> GalleryResult<()> {
        let index = self.selected_view_index();
        match index {
            Ok(index) => self.begin_edit(index).await,
            Err(e) => {
                self.notifications.push(Notification::error(&e));
                Err(e)
            }
        }
    }

    fn selected_view_index(&self) -> GalleryResult<usize> {
        if !self.can_edit_selected() {
            return Err(GalleryError::Validation(
                "Select exactly one image to edit".to_string(),
            ));
        }
        let id = self.selected.iter().next().ok_or_else(|| {
            GalleryError::Validation("Select exactly one image to edit".to_string())
        })?;
        self.view()
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| GalleryError::Validation("The selected image is hidden by the current filter".to_string()))
    }

    /// Flips `favorite`; returns the new value or `None` for an unknown id
    pub fn toggle_favorite(&mut self, id: &str) -> Option<bool> {
        let favorite = self.source.toggle_favorite(id);
        self.clamp_viewer();
        favorite
    }

    // --- viewer ---

    pub fn open_viewer(&mut self, index: usize) -> GalleryResult<()> {
        let len = self.view().len();
        if index >= len {
            return Err(GalleryError::Validation(format!(
                "No image at position {} ({} shown)",
                index, len
            )));
        }
        if self.viewer != Some(index) {
            self.edit = None;
        }
        self.viewer = Some(index);
        Ok(())
    }

    pub fn close_viewer(&mut self) {
        self.viewer = None;
        self.edit = None;
    }

    pub fn viewer_index(&self) -> Option<usize> {
        self.viewer
    }

    /// Record shown in the viewer
    pub fn current_record(&self) -> Option<&ImageRecord> {
        let index = self.viewer?;
        self.view().get(index).copied()
    }

    /// Moves the viewer with wrap-around and leaves edit mode
    pub fn navigate(&mut self, direction: Direction) -> Option<usize> {
        let index = self.viewer?;
        let len = self.view().len();
        if len == 0 {
            self.close_viewer();
            return None;
        }

        let next = match direction {
            Direction::Next => (index + 1) % len,
            Direction::Prev => (index + len - 1) % len,
        };
        self.edit = None;
        self.viewer = Some(next);
        Some(next)
    }

    // --- editor ---

    pub fn is_editing(&self) -> bool {
        self.edit.is_some()
    }

    pub fn edit_session(&self) -> Option<&EditSession> {
        self.edit.as_ref()
    }

    /// Opens the viewer at `index`, fetches the image and starts editing it
    pub async fn begin_edit(&mut self, index: usize) -> GalleryResult<()> {
        let result = self.fetch_for_edit(index).await;
        match result {
            Ok((index, image)) => self.begin_edit_with(index, image),
            Err(e) => {
                log::error!("Could not open editor: {}", e);
                self.notifications.push(Notification::error(&e));
                Err(e)
            }
        }
    }

    async fn fetch_for_edit(&mut self, index: usize) -> GalleryResult<(usize, DynamicImage)> {
        self.open_viewer(index)?;
        let url = self
            .current_record()
            .map(|r| r.source_url.clone())
            .ok_or_else(|| GalleryError::Validation("No image to edit".to_string()))?;

        let bytes = self
            .source
            .storage()
            .download(&url)
            .await
            .map_err(|e| GalleryError::Render(format!("Could not fetch {}: {}", url, e)))?;
        Ok((index, decode_image(&bytes)?))
    }

    /// Starts editing the record at `index` with an already decoded image
    pub fn begin_edit_with(&mut self, index: usize, image: DynamicImage) -> GalleryResult<()> {
        self.open_viewer(index)?;
        let record = self
            .current_record()
            .cloned()
            .ok_or_else(|| GalleryError::Validation("No image to edit".to_string()))?;

        log::debug!("Editing {} ({}x{})", record.id, image.width(), image.height());
        self.edit = Some(EditSession::new(record, image));
        Ok(())
    }

    /// Updates the adjustments and re-renders the preview
    pub fn apply_adjustments(&mut self, update: &AdjustmentUpdate) -> GalleryResult<AdjustmentParams> {
        let edit = self
            .edit
            .as_mut()
            .ok_or_else(|| GalleryError::Validation("No image is being edited".to_string()))?;
        edit.params.apply(update);
        edit.preview = render_adjustments(&edit.source, &edit.params);
        Ok(edit.params)
    }

    /// Discards the edit; the next edit starts from default adjustments
    pub fn cancel_edit(&mut self) {
        self.edit = None;
    }

    /// Exports the render as a new record. On failure the editor stays open.
    pub async fn save_edit(&mut self) -> GalleryResult<ImageRecord> {
        let result = self.export_edit().await;
        match result {
            Ok(record) => {
                self.edit = None;
                let position = self.view().iter().position(|r| r.id == record.id);
                match position {
                    Some(index) => self.viewer = Some(index),
                    None => self.clamp_viewer(),
                }
                self.notifications.push(Notification::success(
                    "Image saved",
                    format!("Saved edited copy as {}", record.name),
                ));
                Ok(record)
            }
            Err(e) => {
                log::error!("Saving edit failed: {}", e);
                self.notifications.push(Notification::error(&e));
                Err(e)
            }
        }
    }

    async fn export_edit(&mut self) -> GalleryResult<ImageRecord> {
        let edit = self
            .edit
            .as_ref()
            .ok_or_else(|| GalleryError::Validation("No image is being edited".to_string()))?;
        let bytes = encode_jpeg(&edit.preview, self.source.config().export_quality)?;
        let record = edit.record.clone();
        self.source.register_edited_copy(&record, bytes).await
    }

    // --- uploads and transformations ---

    pub async fn upload(&mut self, file: UploadFile) -> GalleryResult<ImageRecord> {
        let viewed = self.viewed_id();
        match self.source.register_upload(file).await {
            Ok(record) => {
                self.keep_viewer_on(viewed);
                self.notifications.push(Notification::success(
                    "Upload complete",
                    format!("{} was added to your gallery", record.name),
                ));
                Ok(record)
            }
            Err(e) => {
                log::error!("Upload failed: {}", e);
                self.notifications.push(Notification::error(&e));
                Err(e)
            }
        }
    }

    /// Queues a style transformation of the record `id`
    pub async fn request_transformation(&mut self, id: &str, style: &str) -> GalleryResult<ImageRecord> {
        let viewed = self.viewed_id();
        let result = match self.source.records().get(id).cloned() {
            Some(record) => self.source.register_transformation(&record, style).await,
            None => Err(GalleryError::Validation(format!("Unknown image {}", id))),
        };
        match result {
            Ok(record) => {
                self.keep_viewer_on(viewed);
                self.notifications.push(Notification::success(
                    "Transformation requested",
                    format!("{} is being processed", record.name),
                ));
                Ok(record)
            }
            Err(e) => {
                self.notifications.push(Notification::error(&e));
                Err(e)
            }
        }
    }

    // --- notifications ---

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjust::RotateDirection;
    use crate::models::{PhotoGalleryConfig, TAG_EDITED};
    use crate::schema::SqliteRowStore;
    use crate::testing::MemoryStorage;
    use crate::view::{FilterBy, SortBy, SortOrder};
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;
    use std::sync::Arc;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([200, 40, 90, 255])));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    async fn session_with(paths: &[&str]) -> GallerySession<MemoryStorage, SqliteRowStore> {
        let storage = MemoryStorage::new();
        for path in paths {
            storage.put_object(path, png(4, 2));
        }
        let source = RecordSource::new(
            Arc::new(storage),
            Arc::new(SqliteRowStore::open_in_memory().unwrap()),
            PhotoGalleryConfig::default(),
        );
        let mut session = GallerySession::new(source);
        assert!(session.refresh("alice").await);
        session
    }

    #[tokio::test]
    async fn test_toggle_favorite_is_involution() {
        let mut session = session_with(&["alice/a.png"]).await;
        let id = "storage:alice/a.png";
        let before = session.records().to_vec();

        assert_eq!(session.toggle_favorite(id), Some(true));
        assert_eq!(session.toggle_favorite(id), Some(false));
        assert_eq!(session.records(), before.as_slice());
        assert_eq!(session.toggle_favorite("missing"), None);
    }

    #[tokio::test]
    async fn test_navigate_wraps_around() {
        let mut session = session_with(&["alice/a.png", "alice/b.png", "alice/c.png"]).await;
        let len = session.view().len();
        assert_eq!(len, 3);

        session.open_viewer(1).unwrap();
        for _ in 0..len {
            session.navigate(Direction::Next);
        }
        assert_eq!(session.viewer_index(), Some(1));

        session.open_viewer(0).unwrap();
        assert_eq!(session.navigate(Direction::Prev), Some(2));
    }

    #[tokio::test]
    async fn test_open_viewer_out_of_range() {
        let mut session = session_with(&["alice/a.png"]).await;
        assert!(session.open_viewer(1).is_err());
        assert_eq!(session.viewer_index(), None);
    }

    #[tokio::test]
    async fn test_selection_gates_editing() {
        let mut session = session_with(&["alice/a.png", "alice/b.png"]).await;
        assert!(!session.can_edit_selected());

        assert!(session.toggle_select("storage:alice/a.png"));
        assert!(session.can_edit_selected());

        session.toggle_select("storage:alice/b.png");
        assert!(!session.can_edit_selected());
        assert!(session.edit_selected().await.is_err());

        assert!(!session.toggle_select("storage:alice/b.png"));
        session.edit_selected().await.unwrap();
        assert!(session.is_editing());
        assert_eq!(session.current_record().unwrap().id, "storage:alice/a.png");
    }

    #[tokio::test]
    async fn test_upload_shows_first_in_default_view() {
        let mut session = session_with(&["alice/a.png", "alice/b.png"]).await;
        let record = session
            .upload(UploadFile::new("new.png", png(2, 2)))
            .await
            .unwrap();

        assert_eq!(session.view()[0].id, record.id);
        let notes = session.drain_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].level, NotificationLevel::Success);
        assert!(session.drain_notifications().is_empty());
    }

    #[tokio::test]
    async fn test_edit_grayscale_and_save() {
        let mut session = session_with(&["alice/a.png"]).await;
        session.begin_edit(0).await.unwrap();
        assert_eq!(
            session.edit_session().unwrap().params(),
            &AdjustmentParams::default()
        );

        session
            .apply_adjustments(&AdjustmentUpdate::grayscale(true))
            .unwrap();
        let params = session
            .apply_adjustments(&AdjustmentUpdate::rotate(RotateDirection::Clockwise))
            .unwrap();
        assert_eq!(params.rotation, 90);
        assert_eq!(session.edit_session().unwrap().preview().dimensions(), (2, 4));

        let saved = session.save_edit().await.unwrap();
        assert!(saved.edited);
        assert_eq!(saved.tags.iter().filter(|t| *t == TAG_EDITED).count(), 1);
        assert!(!session.is_editing());
        assert_eq!(session.records().len(), 2);
        assert!(session.source().records().get("storage:alice/a.png").is_some());
        assert_eq!(session.current_record().unwrap().id, saved.id);

        let stored = session
            .source()
            .storage()
            .object(saved.storage_path.as_deref().unwrap())
            .unwrap();
        let decoded = decode_image(&stored).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (2, 4));
    }

    #[tokio::test]
    async fn test_failed_save_stays_in_edit_mode() {
        let mut session = session_with(&["alice/a.png"]).await;
        session.begin_edit(0).await.unwrap();
        session.source().storage().fail_uploads(true);
        session.drain_notifications();

        let before = session.records().to_vec();
        assert!(session.save_edit().await.is_err());
        assert!(session.is_editing());
        assert_eq!(session.records(), before.as_slice());

        let notes = session.drain_notifications();
        assert_eq!(notes[0].level, NotificationLevel::Error);
        assert_eq!(notes[0].title, "Upload failed");
    }

    #[tokio::test]
    async fn test_cancel_edit_resets_params() {
        let mut session = session_with(&["alice/a.png"]).await;
        session.begin_edit(0).await.unwrap();
        session
            .apply_adjustments(&AdjustmentUpdate::brightness(150.0))
            .unwrap();
        session.cancel_edit();
        assert!(!session.is_editing());
        assert!(session
            .apply_adjustments(&AdjustmentUpdate::sepia(true))
            .is_err());

        session.begin_edit(0).await.unwrap();
        assert_eq!(session.edit_session().unwrap().params().brightness, 100.0);
    }

    #[tokio::test]
    async fn test_navigate_leaves_edit_mode() {
        let mut session = session_with(&["alice/a.png", "alice/b.png"]).await;
        session.begin_edit(0).await.unwrap();
        session.navigate(Direction::Next);
        assert!(!session.is_editing());
        assert_eq!(session.viewer_index(), Some(1));
    }

    #[tokio::test]
    async fn test_begin_edit_with_undecodable_image() {
        let mut session = session_with(&[]).await;
        session.source().storage().put_object("alice/broken.png", b"nope".to_vec());
        session.refresh("alice").await;
        session.drain_notifications();

        let err = session.begin_edit(0).await.unwrap_err();
        assert!(matches!(err, GalleryError::Render(_)));
        assert!(!session.is_editing());
        assert_eq!(session.drain_notifications()[0].level, NotificationLevel::Error);
    }

    #[tokio::test]
    async fn test_set_view_closes_out_of_range_viewer() {
        let mut session = session_with(&["alice/a.png", "alice/b.png"]).await;
        session.open_viewer(1).unwrap();
        session.set_view(ViewParams {
            filter_by: FilterBy::Favorites,
            ..Default::default()
        });
        assert_eq!(session.viewer_index(), None);

        session.set_view(ViewParams {
            sort_by: SortBy::Name,
            sort_order: SortOrder::Asc,
            ..Default::default()
        });
        session.open_viewer(0).unwrap();
        assert_eq!(session.current_record().unwrap().name, "a.png");
        session.set_view_mode(ViewMode::List);
        assert_eq!(session.view_mode(), ViewMode::List);
        assert_eq!(session.viewer_index(), Some(0));
    }

    #[tokio::test]
    async fn test_request_transformation() {
        let mut session = session_with(&["alice/a.png"]).await;
        let record = session
            .request_transformation("storage:alice/a.png", "Ghibli")
            .await
            .unwrap();
        assert_eq!(session.view()[0].id, record.id);
        assert!(session.request_transformation("missing", "Ghibli").await.is_err());
    }

    #[tokio::test]
    async fn test_viewer_stays_on_record_when_images_are_added() {
        let mut session = session_with(&["alice/a.png", "alice/b.png"]).await;
        session.open_viewer(0).unwrap();
        let viewed = session.current_record().unwrap().id.clone();

        let uploaded = session
            .upload(UploadFile::new("new.png", png(2, 2)))
            .await
            .unwrap();
        assert_eq!(session.view()[0].id, uploaded.id);
        assert_eq!(session.viewer_index(), Some(1));
        assert_eq!(session.current_record().unwrap().id, viewed);

        let requested = session.request_transformation(&viewed, "Ghibli").await.unwrap();
        assert_eq!(session.view()[0].id, requested.id);
        assert_eq!(session.viewer_index(), Some(2));
        assert_eq!(session.current_record().unwrap().id, viewed);
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let mut session = session_with(&["alice/a.png"]).await;
        session.toggle_select("storage:alice/a.png");
        session.open_viewer(0).unwrap();
        session.reset();
        assert!(session.records().is_empty());
        assert!(session.selected().is_empty());
        assert_eq!(session.viewer_index(), None);
        assert_eq!(session.source().user_id(), None);
    }
}
