use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account as returned by the auth server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl User {
    /// Display name chosen at sign-up, if any
    pub fn full_name(&self) -> Option<&str> {
        self.user_metadata.get("full_name").and_then(|v| v.as_str())
    }
}

/// Tokens of a signed-in user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: i64,
    /// Expiry as a unix timestamp
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now.timestamp() >= expires_at,
            None => false,
        }
    }
}

/// Body of the password grant and sign-up requests
#[derive(Debug, Serialize)]
pub(crate) struct Credentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct SignUpRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub data: serde_json::Value,
}

/// Sign-up answers with a session when e-mail confirmation is off
/// and with the bare user otherwise
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SignUpResponse {
    Session(Session),
    User(User),
}

/// Error body; the auth server uses several shapes
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    pub error_description: Option<String>,
    pub msg: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
    }
}

/// Result of a sign-up
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    /// Account created and signed in right away
    SignedIn(Session),
    /// Account created; the user must confirm the e-mail address first
    ConfirmationRequired(User),
}

/// State of the authentication
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthState {
    #[default]
    SignedOut,
    SignedIn(Session),
}

impl AuthState {
    pub fn user(&self) -> Option<&User> {
        match self {
            AuthState::SignedIn(session) => Some(&session.user),
            AuthState::SignedOut => None,
        }
    }
}
