use std::fmt;

/// Central error types for the Restyle app
#[derive(Debug)]
pub enum AppError {
    /// Configuration file or environment is unusable
    Config(String),
    /// Sign-in/sign-out failed
    Auth(supabase_auth::AuthError),
    /// Gallery operation failed (listing, upload, render, ...)
    Gallery(photo_gallery::GalleryError),
    /// Backend could not be set up
    Storage(photo_gallery::StorageError),
    /// Filesystem error
    Filesystem(std::io::Error),
    /// Validation error (e.g. invalid command line)
    Validation(String),
    /// Background task failed
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Auth(e) => write!(f, "Authentication error: {}", e),
            AppError::Gallery(e) => write!(f, "{}", e),
            AppError::Storage(e) => write!(f, "Storage error: {}", e),
            AppError::Filesystem(e) => write!(f, "Filesystem error: {}", e),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AppError {}

// Conversions from other error types
impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Filesystem(e)
    }
}

impl From<supabase_auth::AuthError> for AppError {
    fn from(e: supabase_auth::AuthError) -> Self {
        AppError::Auth(e)
    }
}

impl From<photo_gallery::GalleryError> for AppError {
    fn from(e: photo_gallery::GalleryError) -> Self {
        AppError::Gallery(e)
    }
}

impl From<photo_gallery::StorageError> for AppError {
    fn from(e: photo_gallery::StorageError) -> Self {
        AppError::Storage(e)
    }
}

impl From<toml::de::Error> for AppError {
    fn from(e: toml::de::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

/// User-friendly error messages for the terminal
impl AppError {
    pub fn user_message(&self) -> String {
        match self {
            AppError::Config(msg) => format!("Please check your configuration: {}", msg),
            AppError::Auth(supabase_auth::AuthError::InvalidCredentials(_)) => {
                "Login failed. Please check your email and password.".to_string()
            }
            AppError::Auth(supabase_auth::AuthError::ValidationError(msg)) => msg.clone(),
            AppError::Auth(_) => "Could not reach the sign-in service. Please try again later.".to_string(),
            AppError::Gallery(e) => e.to_string(),
            AppError::Storage(_) => "The image storage is not available.".to_string(),
            AppError::Filesystem(_) => "Error accessing files. Please check permissions.".to_string(),
            AppError::Validation(msg) => msg.clone(),
            AppError::Other(msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_for_bad_credentials() {
        let err = AppError::from(supabase_auth::AuthError::InvalidCredentials(
            "Invalid login credentials".to_string(),
        ));
        assert_eq!(
            err.user_message(),
            "Login failed. Please check your email and password."
        );
    }

    #[test]
    fn test_user_message_for_gallery_errors() {
        let err = AppError::from(photo_gallery::GalleryError::Upload("503".to_string()));
        assert_eq!(err.user_message(), "Upload failed: 503");
    }
}
