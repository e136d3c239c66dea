use photo_gallery::{
    GallerySession, PhotoGalleryConfig, PostgrestRowStore, RecordSource, SqliteRowStore,
    SupabaseConfig, SupabaseStorage,
};
use std::path::Path;
use std::sync::Arc;
use supabase_auth::SupabaseAuthService;

use crate::config::{AppConfig, Backend};
use crate::error::AppError;
use crate::filesystem::LocalStorage;
use crate::services::backend::{AppRowStore, AppStorage};

pub type AppSession = GallerySession<AppStorage, AppRowStore>;

/// A gallery session bound to a user
pub struct Connection {
    pub session: AppSession,
    pub user_id: String,
    auth: Option<SupabaseAuthService>,
}

/// Signs in (Supabase backend) and wires the collaborators into a session
pub async fn connect(config: &AppConfig) -> Result<Connection, AppError> {
    config.validate()?;

    match config.backend {
        Backend::Supabase => connect_supabase(config).await,
        Backend::Local => connect_local(config),
    }
}

async fn connect_supabase(config: &AppConfig) -> Result<Connection, AppError> {
    let settings = &config.supabase;
    let email = settings.email.as_deref().unwrap_or_default();
    let password = settings.password.as_deref().unwrap_or_default();

    let auth = SupabaseAuthService::new(&settings.url, &settings.anon_key)?;
    let auth_session = auth.sign_in(email, password).await?;

    let supabase = SupabaseConfig {
        url: settings.url.clone(),
        api_key: settings.anon_key.clone(),
        access_token: Some(auth_session.access_token.clone()),
    };
    let storage = AppStorage::Supabase(SupabaseStorage::new(supabase.clone())?);
    let rows = AppRowStore::Postgrest(PostgrestRowStore::new(supabase, &settings.images_table)?);

    Ok(Connection {
        session: new_session(storage, rows, config.gallery.clone()),
        user_id: auth_session.user.id,
        auth: Some(auth),
    })
}

fn connect_local(config: &AppConfig) -> Result<Connection, AppError> {
    let settings = &config.local;
    if let Some(parent) = Path::new(&settings.database_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let storage = AppStorage::Local(LocalStorage::new(&settings.data_dir));
    let rows = AppRowStore::Sqlite(SqliteRowStore::open(&settings.database_path)?);
    log::info!(
        "Using local gallery in {} ({})",
        settings.data_dir,
        settings.database_path
    );

    Ok(Connection {
        session: new_session(storage, rows, config.gallery.clone()),
        user_id: settings.user_id.clone(),
        auth: None,
    })
}

fn new_session(storage: AppStorage, rows: AppRowStore, config: PhotoGalleryConfig) -> AppSession {
    GallerySession::new(RecordSource::new(Arc::new(storage), Arc::new(rows), config))
}

impl Connection {
    /// Loads the user's gallery on a spawned task and commits the result
    pub async fn load(&mut self) -> Result<bool, AppError> {
        let pending = self.session.start_load(&self.user_id);
        let outcome = tokio::spawn(pending.run())
            .await
            .map_err(|e| AppError::Other(format!("Gallery load task failed: {}", e)))?;
        Ok(self.session.apply_load(outcome))
    }

    /// Abandons in-flight loads, clears the session and signs out
    pub async fn disconnect(mut self) -> Result<(), AppError> {
        self.session.reset();
        if let Some(auth) = self.auth.take() {
            auth.sign_out().await?;
        }
        Ok(())
    }
}
