use photo_gallery::{FilterBy, PhotoGalleryConfig, SortBy, SortOrder, ViewMode, ViewParams};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::AppError;

pub const DEFAULT_CONFIG_PATH: &str = "restyle.toml";

/// Which collaborators back the gallery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Supabase Storage + PostgREST, signed in through GoTrue
    #[default]
    Supabase,
    /// Files under a local directory + SQLite, no sign-in
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupabaseSettings {
    pub url: String,
    pub anon_key: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub images_table: String,
}

impl Default for SupabaseSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            email: None,
            password: None,
            images_table: "images".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalSettings {
    /// Root directory; buckets are sub-directories
    pub data_dir: String,
    pub database_path: String,
    /// Folder name used in place of a signed-in user id
    pub user_id: String,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            database_path: "./data/restyle.db".to_string(),
            user_id: "local".to_string(),
        }
    }
}

/// Initial view parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    pub search: String,
    pub filter: FilterBy,
    pub sort: SortBy,
    pub order: SortOrder,
    /// `YYYY-MM`
    pub month: Option<String>,
    pub mode: ViewMode,
}

impl ViewSettings {
    pub fn to_params(&self) -> Result<ViewParams, AppError> {
        let month = match self.month.as_deref().map(str::trim) {
            Some(m) if !m.is_empty() => Some(m.parse()?),
            _ => None,
        };
        Ok(ViewParams {
            search_term: self.search.clone(),
            filter_by: self.filter,
            month,
            sort_by: self.sort,
            sort_order: self.order,
        })
    }
}

/// Application configuration, read from `restyle.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: Backend,
    /// Default log filter when `RUST_LOG` is not set
    pub log_level: String,
    pub supabase: SupabaseSettings,
    pub local: LocalSettings,
    pub gallery: PhotoGalleryConfig,
    pub view: ViewSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            log_level: "info".to_string(),
            supabase: SupabaseSettings::default(),
            local: LocalSettings::default(),
            gallery: PhotoGalleryConfig::default(),
            view: ViewSettings::default(),
        }
    }
}

impl AppConfig {
    /// Reads the configuration file. A missing default file yields defaults,
    /// a missing explicitly given file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let explicit = path.is_some();
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));

        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)?;
            Self::from_toml(&text)?
        } else if explicit {
            return Err(AppError::Config(format!(
                "{} does not exist",
                path.display()
            )));
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, AppError> {
        Ok(toml::from_str(text)?)
    }

    /// Overrides connection settings and credentials from the environment
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("RESTYLE_SUPABASE_URL") {
            self.supabase.url = url;
        }
        if let Some(key) = lookup("RESTYLE_SUPABASE_KEY") {
            self.supabase.anon_key = key;
        }
        if let Some(email) = lookup("RESTYLE_EMAIL") {
            self.supabase.email = Some(email);
        }
        if let Some(password) = lookup("RESTYLE_PASSWORD") {
            self.supabase.password = Some(password);
        }
    }

    /// Checks the settings the selected backend needs
    pub fn validate(&self) -> Result<(), AppError> {
        if self.gallery.bucket.trim().is_empty() {
            return Err(AppError::Config("gallery.bucket must not be empty".to_string()));
        }
        if !(1..=100).contains(&self.gallery.export_quality) {
            return Err(AppError::Config(
                "gallery.export_quality must be between 1 and 100".to_string(),
            ));
        }
        match self.backend {
            Backend::Supabase => {
                if self.supabase.url.trim().is_empty() || self.supabase.anon_key.trim().is_empty() {
                    return Err(AppError::Config(
                        "supabase.url and supabase.anon_key are required".to_string(),
                    ));
                }
                if self.supabase.email.is_none() || self.supabase.password.is_none() {
                    return Err(AppError::Config(
                        "supabase.email and supabase.password (or RESTYLE_EMAIL/RESTYLE_PASSWORD) are required".to_string(),
                    ));
                }
            }
            Backend::Local => {
                if self.local.user_id.trim().is_empty() {
                    return Err(AppError::Config("local.user_id must not be empty".to_string()));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.gallery.bucket, "user-images");
        assert_eq!(config.view.to_params().unwrap(), ViewParams::default());
    }

    #[test]
    fn test_parse_full_file() {
        let config = AppConfig::from_toml(
            r#"
            backend = "local"
            log_level = "debug"

            [local]
            data_dir = "/tmp/restyle"
            user_id = "me"

            [gallery]
            bucket = "pictures"
            name_prefixes = ["transform-"]

            [view]
            filter = "favorites"
            sort = "name"
            order = "asc"
            month = "2025-03"
            mode = "list"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend, Backend::Local);
        assert_eq!(config.local.user_id, "me");
        assert_eq!(config.local.database_path, "./data/restyle.db");
        assert_eq!(config.gallery.bucket, "pictures");
        assert_eq!(config.gallery.max_upload_bytes, 10 * 1024 * 1024);

        let params = config.view.to_params().unwrap();
        assert_eq!(params.filter_by, FilterBy::Favorites);
        assert_eq!(params.sort_by, SortBy::Name);
        assert_eq!(params.sort_order, SortOrder::Asc);
        assert_eq!(params.month.unwrap().to_string(), "2025-03");
        assert_eq!(config.view.mode, ViewMode::List);
        config.validate().unwrap();
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_env(|key| match key {
            "RESTYLE_SUPABASE_URL" => Some("https://abc.supabase.co".to_string()),
            "RESTYLE_SUPABASE_KEY" => Some("anon".to_string()),
            "RESTYLE_EMAIL" => Some("ada@example.com".to_string()),
            _ => None,
        });
        assert_eq!(config.supabase.url, "https://abc.supabase.co");
        assert!(config.validate().is_err());

        config.supabase.password = Some("secret".to_string());
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_values() {
        assert!(AppConfig::from_toml(r#"backend = "ftp""#).is_err());
        let config = AppConfig::from_toml("[view]\nmonth = \"2025-13\"").unwrap();
        assert!(config.view.to_params().is_err());
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/restyle.toml"))).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
