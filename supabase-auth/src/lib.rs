//! # Supabase Auth
//!
//! Password authentication against a Supabase project's auth server (GoTrue).
//!
//! This crate provides:
//! - Sign-in with e-mail and password
//! - Sign-up with a display name, with or without e-mail confirmation
//! - Sign-out and lookup of the current session/user
//! - Client-side e-mail, name and password checks
//!
//! ## Separation of Concerns
//!
//! This crate focuses solely on authentication. It does **not**:
//! - Persist sessions (handled by the application)
//! - Talk to storage or the database (handled by `photo-gallery`)
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use supabase_auth::SupabaseAuthService;
//!
//! let auth = SupabaseAuthService::new("https://abc.supabase.co", &anon_key)?;
//! let session = auth.sign_in("ada@example.com", &password).await?;
//! println!("signed in as {}", session.user.id);
//! ```

pub mod models;
pub mod service;
pub mod validation;

pub use models::{AuthState, Session, SignUpOutcome, User};
pub use service::{AuthError, SupabaseAuthService};
