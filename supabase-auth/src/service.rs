use std::sync::RwLock;
use std::time::Duration;

use crate::models::{
    AuthState, Credentials, ErrorBody, Session, SignUpOutcome, SignUpRequest, SignUpResponse, User,
};
use crate::validation::{is_valid_email, is_valid_name, missing_password_requirements};

/// Error type for authentication operations
#[derive(Debug)]
pub enum AuthError {
    NetworkError(String),
    JsonError(String),
    ServerError(String),
    /// Wrong e-mail or password, or an unconfirmed account
    InvalidCredentials(String),
    /// Rejected before contacting the server
    ValidationError(String),
    NotSignedIn,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            AuthError::JsonError(msg) => write!(f, "JSON error: {}", msg),
            AuthError::ServerError(msg) => write!(f, "Server error: {}", msg),
            AuthError::InvalidCredentials(msg) => write!(f, "Login failed: {}", msg),
            AuthError::ValidationError(msg) => write!(f, "Invalid input: {}", msg),
            AuthError::NotSignedIn => write!(f, "Not signed in"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Supabase (GoTrue) password authentication
pub struct SupabaseAuthService {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    state: RwLock<AuthState>,
}

impl SupabaseAuthService {
    /// Create a new authentication service for a project URL and its anon key
    pub fn new(project_url: &str, api_key: &str) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .tcp_keepalive(Duration::from_secs(30))
            .user_agent(concat!("supabase-auth/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AuthError::NetworkError(format!("Client build failed: {}", e)))?;

        Ok(Self {
            base_url: format!("{}/auth/v1", project_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            client,
            state: RwLock::new(AuthState::SignedOut),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn set_state(&self, state: AuthState) {
        match self.state.write() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    /// Snapshot of the authentication state
    pub fn state(&self) -> AuthState {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Session of the signed-in user, if it has not expired
    pub fn current_session(&self) -> Option<Session> {
        match self.state() {
            AuthState::SignedIn(session) if !session.is_expired(chrono::Utc::now()) => Some(session),
            _ => None,
        }
    }

    pub fn current_user(&self) -> Option<User> {
        self.current_session().map(|s| s.user)
    }

    /// Sign in with e-mail and password
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        if !is_valid_email(email) {
            return Err(AuthError::ValidationError("A valid email is required".to_string()));
        }
        if password.is_empty() {
            return Err(AuthError::ValidationError("Password is required".to_string()));
        }

        let response = self
            .client
            .post(self.endpoint("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&Credentials {
                email: email.trim(),
                password,
            })
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 400 || status.as_u16() == 401 {
            let message = error_message(response).await;
            return Err(AuthError::InvalidCredentials(message));
        }
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(AuthError::ServerError(format!("{}: {}", status, message)));
        }

        let session = response
            .json::<Session>()
            .await
            .map_err(|e| AuthError::JsonError(format!("Failed to parse session: {}", e)))?;

        log::info!("Signed in as {}", session.user.id);
        self.set_state(AuthState::SignedIn(session.clone()));
        Ok(session)
    }

    /// Create an account; `full_name` is stored in the user metadata
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<SignUpOutcome, AuthError> {
        if !is_valid_name(full_name) {
            return Err(AuthError::ValidationError(
                "Name must be at least 2 characters long".to_string(),
            ));
        }
        if !is_valid_email(email) {
            return Err(AuthError::ValidationError("A valid email is required".to_string()));
        }
        let missing = missing_password_requirements(password);
        if !missing.is_empty() {
            return Err(AuthError::ValidationError(format!(
                "Password must contain {}",
                missing.join(", ")
            )));
        }

        let response = self
            .client
            .post(self.endpoint("signup"))
            .header("apikey", &self.api_key)
            .json(&SignUpRequest {
                email: email.trim(),
                password,
                data: serde_json::json!({ "full_name": full_name.trim() }),
            })
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(AuthError::ServerError(format!("{}: {}", status, message)));
        }

        let parsed = response
            .json::<SignUpResponse>()
            .await
            .map_err(|e| AuthError::JsonError(format!("Failed to parse sign-up response: {}", e)))?;

        match parsed {
            SignUpResponse::Session(session) => {
                log::info!("Signed up and signed in as {}", session.user.id);
                self.set_state(AuthState::SignedIn(session.clone()));
                Ok(SignUpOutcome::SignedIn(session))
            }
            SignUpResponse::User(user) => {
                log::info!("Signed up {}, confirmation pending", user.id);
                Ok(SignUpOutcome::ConfirmationRequired(user))
            }
        }
    }

    /// Revoke the session on the server and forget it locally.
    /// The local state is cleared even when the server call fails.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let session = match self.state() {
            AuthState::SignedIn(session) => session,
            AuthState::SignedOut => return Ok(()),
        };
        self.set_state(AuthState::SignedOut);

        let response = self
            .client
            .post(self.endpoint("logout"))
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = error_message(response).await;
            log::warn!("Logout returned {}: {}", status, message);
            return Err(AuthError::ServerError(message));
        }

        log::info!("Signed out {}", session.user.id);
        Ok(())
    }

    /// Fetch the signed-in user from the server
    pub async fn fetch_user(&self) -> Result<User, AuthError> {
        let session = self.current_session().ok_or(AuthError::NotSignedIn)?;

        let response = self
            .client
            .get(self.endpoint("user"))
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 401 {
            self.set_state(AuthState::SignedOut);
            return Err(AuthError::NotSignedIn);
        }
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(AuthError::ServerError(format!("{}: {}", status, message)));
        }

        response
            .json::<User>()
            .await
            .map_err(|e| AuthError::JsonError(format!("Failed to parse user: {}", e)))
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSION_JSON: &str = r#"{
        "access_token": "jwt",
        "token_type": "bearer",
        "expires_in": 3600,
        "expires_at": 1900000000,
        "refresh_token": "refresh",
        "user": {
            "id": "7f1c",
            "email": "ada@example.com",
            "created_at": "2025-03-01T10:00:00Z",
            "user_metadata": {"full_name": "Ada"}
        }
    }"#;

    #[test]
    fn test_sign_up_response_shapes() {
        let parsed: SignUpResponse = serde_json::from_str(SESSION_JSON).unwrap();
        assert!(matches!(parsed, SignUpResponse::Session(_)));

        let parsed: SignUpResponse =
            serde_json::from_str(r#"{"id": "7f1c", "email": "ada@example.com"}"#).unwrap();
        match parsed {
            SignUpResponse::User(user) => assert_eq!(user.id, "7f1c"),
            SignUpResponse::Session(_) => panic!("expected bare user"),
        }
    }

    #[test]
    fn test_session_expiry() {
        let session: Session = serde_json::from_str(SESSION_JSON).unwrap();
        assert_eq!(session.user.full_name(), Some("Ada"));
        let before = chrono::DateTime::from_timestamp(1_800_000_000, 0).unwrap();
        let after = chrono::DateTime::from_timestamp(1_900_000_001, 0).unwrap();
        assert!(!session.is_expired(before));
        assert!(session.is_expired(after));
    }

    #[test]
    fn test_error_body_message() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"error": "invalid_grant", "error_description": "Invalid login credentials"}"#,
        )
        .unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Invalid login credentials"));

        let body: ErrorBody = serde_json::from_str(r#"{"code": 422, "msg": "User already registered"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("User already registered"));
    }

    #[test]
    fn test_new_service_is_signed_out() {
        let service = SupabaseAuthService::new("https://project.supabase.co/", "anon").unwrap();
        assert_eq!(service.endpoint("token"), "https://project.supabase.co/auth/v1/token");
        assert_eq!(service.state(), AuthState::SignedOut);
        assert!(service.current_session().is_none());
    }
}
