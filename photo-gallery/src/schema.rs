use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result};
use std::sync::Mutex;

use crate::error::{StorageError, StorageResult};
use crate::models::{ImageRow, NewImageRow};
use crate::storage::RowStore;

/// Initialize the local `images` table
pub fn init_image_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS image_schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT version FROM image_schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        create_image_schema_v1(conn)?;
        conn.execute("INSERT INTO image_schema_version (version) VALUES (1)", [])?;
    }

    Ok(())
}

/// Same columns as the hosted `images` table
fn create_image_schema_v1(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS images (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            original_url TEXT NOT NULL,
            transformed_url TEXT,
            style TEXT NOT NULL,
            title TEXT,
            status TEXT NOT NULL DEFAULT 'processing',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_images_user_created
         ON images(user_id, created_at DESC)",
        [],
    )?;

    Ok(())
}

/// Row store backed by a local SQLite database
pub struct SqliteRowStore {
    conn: Mutex<Connection>,
}

impl SqliteRowStore {
    /// Wraps an open connection and makes sure the schema exists
    pub fn new(conn: Connection) -> StorageResult<Self> {
        init_image_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open(path: &str) -> StorageResult<Self> {
        Self::new(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StorageResult<T>) -> StorageResult<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::InvalidData("SQLite connection poisoned".to_string()))?;
        f(&conn)
    }

    /// Inserts a fully specified row
    pub fn insert_row(&self, row: &ImageRow) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO images (id, user_id, original_url, transformed_url, style, title, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    row.id,
                    row.user_id,
                    row.original_url,
                    row.transformed_url,
                    row.style,
                    row.title,
                    row.status,
                    row.created_at,
                    row.updated_at,
                ],
            )?;
            Ok(())
        })
    }
}

impl RowStore for SqliteRowStore {
    async fn select_images(&self, user_id: &str) -> StorageResult<Vec<ImageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, original_url, transformed_url, style, title, status, created_at, updated_at
                 FROM images
                 WHERE user_id = ?1
                 ORDER BY created_at DESC",
            )?;

            let rows = stmt.query_map(params![user_id], |row| {
                let created_at: DateTime<Utc> = row.get(7)?;
                let updated_at: DateTime<Utc> = row.get(8)?;
                Ok(ImageRow {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    original_url: row.get(2)?,
                    transformed_url: row.get(3)?,
                    style: row.get(4)?,
                    title: row.get(5)?,
                    status: row.get(6)?,
                    created_at,
                    updated_at,
                })
            })?;

            Ok(rows.collect::<Result<Vec<_>>>()?)
        })
    }

    async fn insert_image(&self, new_row: NewImageRow) -> StorageResult<ImageRow> {
        let now = Utc::now();
        let row = ImageRow {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: new_row.user_id,
            original_url: new_row.original_url,
            transformed_url: new_row.transformed_url,
            style: new_row.style,
            title: new_row.title,
            status: new_row.status,
            created_at: now,
            updated_at: now,
        };
        self.insert_row(&row)?;
        log::debug!("Inserted image row {}", row.id);
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn row(id: &str, user_id: &str, created_at: DateTime<Utc>) -> ImageRow {
        ImageRow {
            id: id.to_string(),
            user_id: user_id.to_string(),
            original_url: format!("https://cdn.example/{}.png", id),
            transformed_url: None,
            style: "Pixar".to_string(),
            title: None,
            status: "completed".to_string(),
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_image_schema(&conn).unwrap();
        init_image_schema(&conn).unwrap();
    }

    #[tokio::test]
    async fn test_select_is_user_scoped_and_newest_first() {
        let store = SqliteRowStore::open_in_memory().unwrap();
        let now = Utc::now();
        store.insert_row(&row("old", "alice", now - Duration::days(3))).unwrap();
        store.insert_row(&row("new", "alice", now)).unwrap();
        store.insert_row(&row("other", "bob", now)).unwrap();

        let rows = store.select_images("alice").await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamps() {
        let store = SqliteRowStore::open_in_memory().unwrap();
        let inserted = store
            .insert_image(NewImageRow {
                user_id: "alice".to_string(),
                original_url: "https://cdn.example/a.png".to_string(),
                transformed_url: None,
                style: "Van Gogh".to_string(),
                title: Some("Van Gogh transformation".to_string()),
                status: "processing".to_string(),
            })
            .await
            .unwrap();

        assert!(!inserted.id.is_empty());
        assert_eq!(inserted.created_at, inserted.updated_at);

        let rows = store.select_images("alice").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title.as_deref(), Some("Van Gogh transformation"));
    }
}
