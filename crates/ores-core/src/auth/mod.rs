//! Email/password authentication against Supabase auth (GoTrue).
//!
//! The service owns users and sessions; here we only keep the latest session
//! on disk and broadcast [`AuthEvent`]s whenever it changes.

mod store;

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::{info, warn};

pub use self::store::SessionStore;
use crate::client::{BackendError, SupabaseClient};
use crate::logging::mask_token;

/// Sessions this close to expiry are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

const EVENT_CAPACITY: usize = 16;

pub const MISSING_CREDENTIALS: &str = "Please enter both email and password.";
pub const PASSWORD_TOO_SHORT: &str = "Password must be at least 6 characters.";
pub const MIN_PASSWORD_LEN: usize = 6;

/// Authenticated user as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
}

impl User {
    pub fn display_email(&self) -> &str {
        self.email.as_deref().unwrap_or("(no email)")
    }
}

/// Signed-in session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Expiry as seconds since the unix epoch
    pub expires_at: i64,
    pub user: User,
}

impl Session {
    /// True when the access token expires within `margin_secs`.
    pub fn expires_within(&self, margin_secs: i64) -> bool {
        Utc::now().timestamp() + margin_secs >= self.expires_at
    }
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        let expires_at = token
            .expires_at
            .unwrap_or_else(|| Utc::now().timestamp() + token.expires_in.unwrap_or(3600));
        Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            token_type: token.token_type,
            expires_at,
            user: token.user,
        }
    }
}

/// Result of a sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The project auto-confirms users; a session was issued.
    SignedIn(Session),
    /// A confirmation email was sent; sign in after confirming.
    ConfirmationRequired(User),
}

/// Auth state change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// Fired once when a stored session is first restored (or found absent).
    InitialSession(Option<Session>),
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
}

impl AuthEvent {
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthEvent::InitialSession(session) => session.as_ref(),
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => Some(session),
            AuthEvent::SignedOut => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::InitialSession(_) => "INITIAL_SESSION",
            AuthEvent::SignedIn(_) => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
            AuthEvent::TokenRefreshed(_) => "TOKEN_REFRESHED",
        }
    }
}

/// Email/password pair. The email is trimmed; the password is kept verbatim.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// # Errors
    /// Returns [`MISSING_CREDENTIALS`] when either field is blank.
    pub fn new(email: &str, password: &str) -> Result<Self> {
        let email = email.trim();
        if email.is_empty() || password.trim().is_empty() {
            anyhow::bail!(MISSING_CREDENTIALS);
        }
        Ok(Self {
            email: email.to_string(),
            password: password.to_string(),
        })
    }

    /// Like [`Credentials::new`], additionally enforcing the minimum
    /// password length for new accounts.
    ///
    /// # Errors
    /// Returns a validation message when the input is unusable.
    pub fn for_sign_up(email: &str, password: &str) -> Result<Self> {
        let credentials = Self::new(email, password)?;
        if credentials.password.chars().count() < MIN_PASSWORD_LEN {
            anyhow::bail!(PASSWORD_TOO_SHORT);
        }
        Ok(credentials)
    }

    fn body(&self) -> Value {
        json!({ "email": self.email, "password": self.password })
    }
}

/// Session lifecycle: sign up/in/out, restore, refresh, and change events.
#[derive(Debug)]
pub struct Auth {
    store: SessionStore,
    events: broadcast::Sender<AuthEvent>,
}

impl Auth {
    pub fn new(store: SessionStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { store, events }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Subscribes to auth state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: AuthEvent) {
        info!(event = event.name(), "auth state changed");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Creates an account.
    ///
    /// # Errors
    /// Returns a validation or backend error.
    pub async fn sign_up(
        &self,
        client: &SupabaseClient,
        credentials: &Credentials,
    ) -> Result<SignUpOutcome> {
        let request = client
            .request(Method::POST, &client.url("/auth/v1/signup"), None)
            .json(&credentials.body());
        let body: Value = client.send_json(request).await?;

        if body.get("access_token").is_some() {
            let token: TokenResponse =
                serde_json::from_value(body).context("Failed to parse sign-up session")?;
            let session = Session::from(token);
            self.store.save(&session)?;
            self.emit(AuthEvent::SignedIn(session.clone()));
            return Ok(SignUpOutcome::SignedIn(session));
        }

        let user_value = body.get("user").cloned().unwrap_or(body);
        let user: User =
            serde_json::from_value(user_value).context("Failed to parse sign-up user")?;
        info!(email = user.display_email(), "sign-up awaiting email confirmation");
        Ok(SignUpOutcome::ConfirmationRequired(user))
    }

    /// Signs in with email and password, persisting the session.
    ///
    /// # Errors
    /// Returns a backend error (e.g. invalid credentials) or a storage error.
    pub async fn sign_in(
        &self,
        client: &SupabaseClient,
        credentials: &Credentials,
    ) -> Result<Session> {
        let request = client
            .request(
                Method::POST,
                &client.url("/auth/v1/token?grant_type=password"),
                None,
            )
            .json(&credentials.body());
        let token: TokenResponse = client.send_json(request).await?;
        let session = Session::from(token);
        self.store.save(&session)?;
        info!(
            email = session.user.display_email(),
            token = %mask_token(&session.access_token),
            "signed in"
        );
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    /// Signs out. Local state is cleared even when the remote call fails.
    /// Returns whether a session existed.
    ///
    /// # Errors
    /// Returns an error only if the stored session cannot be removed.
    pub async fn sign_out(&self, client: &SupabaseClient) -> Result<bool> {
        let existing = match self.store.load() {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "discarding unreadable session");
                None
            }
        };

        if let Some(session) = &existing {
            let request = client.request(
                Method::POST,
                &client.url("/auth/v1/logout"),
                Some(&session.access_token),
            );
            if let Err(e) = client.send_empty(request).await {
                warn!(error = %e, "remote sign-out failed; clearing local session anyway");
            }
        }

        let had_file = self.store.clear()?;
        self.emit(AuthEvent::SignedOut);
        Ok(existing.is_some() || had_file)
    }

    /// Returns the current session, refreshing it when it is about to expire.
    ///
    /// A failed refresh signs the user out locally and returns `None`. An
    /// unreadable stored session is removed and treated as no session.
    ///
    /// # Errors
    /// Returns an error if the session store cannot be written or cleared.
    pub async fn get_session(&self, client: &SupabaseClient) -> Result<Option<Session>> {
        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "discarding unreadable session");
                self.store.clear()?;
                None
            }
        };
        let Some(session) = stored else {
            return Ok(None);
        };
        if !session.expires_within(REFRESH_MARGIN_SECS) {
            return Ok(Some(session));
        }

        match self.refresh(client, &session.refresh_token).await {
            Ok(refreshed) => {
                self.store.save(&refreshed)?;
                self.emit(AuthEvent::TokenRefreshed(refreshed.clone()));
                Ok(Some(refreshed))
            }
            Err(e) => {
                warn!(error = %e, "session refresh failed; signing out");
                self.store.clear()?;
                self.emit(AuthEvent::SignedOut);
                Ok(None)
            }
        }
    }

    /// Restores the stored session and fires [`AuthEvent::InitialSession`].
    ///
    /// # Errors
    /// Returns an error if the session store cannot be read or written.
    pub async fn restore(&self, client: &SupabaseClient) -> Result<Option<Session>> {
        let session = self.get_session(client).await?;
        self.emit(AuthEvent::InitialSession(session.clone()));
        Ok(session)
    }

    async fn refresh(
        &self,
        client: &SupabaseClient,
        refresh_token: &str,
    ) -> std::result::Result<Session, BackendError> {
        let request = client
            .request(
                Method::POST,
                &client.url("/auth/v1/token?grant_type=refresh_token"),
                None,
            )
            .json(&json!({ "refresh_token": refresh_token }));
        let token: TokenResponse = client.send_json(request).await?;
        Ok(Session::from(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_expiring_at(expires_at: i64) -> Session {
        Session {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            token_type: "bearer".to_string(),
            expires_at,
            user: User {
                id: "u".to_string(),
                email: Some("a@b.c".to_string()),
                email_confirmed_at: None,
            },
        }
    }

    #[test]
    fn test_credentials_trim_email_only() {
        let creds = Credentials::new("  miner@example.com ", " hunter22 ").unwrap();
        assert_eq!(creds.email, "miner@example.com");
        assert_eq!(creds.password, " hunter22 ");
    }

    #[test]
    fn test_credentials_reject_blank_fields() {
        let err = Credentials::new("  ", "secret").unwrap_err();
        assert_eq!(err.to_string(), MISSING_CREDENTIALS);
        let err = Credentials::new("a@b.c", "").unwrap_err();
        assert_eq!(err.to_string(), MISSING_CREDENTIALS);
    }

    #[test]
    fn test_sign_up_enforces_password_length() {
        let err = Credentials::for_sign_up("a@b.c", "12345").unwrap_err();
        assert_eq!(err.to_string(), PASSWORD_TOO_SHORT);
        assert!(Credentials::for_sign_up("a@b.c", "123456").is_ok());
    }

    #[test]
    fn test_session_expiry_margin() {
        let now = Utc::now().timestamp();
        assert!(session_expiring_at(now - 10).expires_within(0));
        assert!(session_expiring_at(now + 30).expires_within(REFRESH_MARGIN_SECS));
        assert!(!session_expiring_at(now + 3600).expires_within(REFRESH_MARGIN_SECS));
    }

    #[test]
    fn test_token_response_prefers_expires_at() {
        let token: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "expires_at": 1_700_000_000,
            "user": {"id": "u", "email": "a@b.c"}
        }))
        .unwrap();
        let session = Session::from(token);
        assert_eq!(session.expires_at, 1_700_000_000);
        assert_eq!(session.token_type, "bearer");
    }

    #[test]
    fn test_token_response_falls_back_to_expires_in() {
        let token: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "token_type": "bearer",
            "expires_in": 120,
            "user": {"id": "u"}
        }))
        .unwrap();
        let before = Utc::now().timestamp();
        let session = Session::from(token);
        assert!(session.expires_at >= before + 120);
        assert!(session.expires_at <= Utc::now().timestamp() + 120);
    }

    #[test]
    fn test_event_session_accessor() {
        let session = session_expiring_at(0);
        assert_eq!(
            AuthEvent::SignedIn(session.clone()).session(),
            Some(&session)
        );
        assert!(AuthEvent::SignedOut.session().is_none());
        assert!(AuthEvent::InitialSession(None).session().is_none());
        assert_eq!(AuthEvent::TokenRefreshed(session).name(), "TOKEN_REFRESHED");
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let dir = tempfile::tempdir().unwrap();
        let auth = Auth::new(SessionStore::at(dir.path().join("session.json")));
        let mut rx = auth.subscribe();

        auth.emit(AuthEvent::SignedOut);
        assert_eq!(rx.recv().await.unwrap(), AuthEvent::SignedOut);
    }
}
