//! HTTP client for the Supabase backend (GoTrue auth + PostgREST data).
//!
//! The client is created lazily, once per process, through [`ClientHandle`].
//! Creation waits for the backend to answer before handing the client out.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;

/// Standard User-Agent header for ores API requests.
pub const USER_AGENT: &str = concat!("ores/", env!("CARGO_PKG_VERSION"));

/// Shown when the backend never becomes reachable on first load.
pub const CLIENT_LOAD_FAILED: &str = "Failed to load Supabase client. Please check your internet connection and refresh the page.";

/// Error category for backend failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// HTTP status error (4xx, 5xx)
    HttpStatus,
    /// Connection timeout or request timeout
    Timeout,
    /// Could not connect at all
    Connect,
    /// Failed to parse a response body
    Parse,
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendErrorKind::HttpStatus => write!(f, "http_status"),
            BackendErrorKind::Timeout => write!(f, "timeout"),
            BackendErrorKind::Connect => write!(f, "connect"),
            BackendErrorKind::Parse => write!(f, "parse"),
        }
    }
}

/// Structured error returned by the backend.
///
/// Covers both the GoTrue body shapes (`msg`, `error_description`, `error`)
/// and the PostgREST one (`code`, `message`, `details`, `hint`).
#[derive(Debug, Clone)]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub status: Option<u16>,
    pub code: Option<String>,
    /// One-line summary suitable for display
    pub message: String,
    pub details: Option<String>,
    pub hint: Option<String>,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            code: None,
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    /// Builds an error from a non-success response body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let mut error = Self::new(BackendErrorKind::HttpStatus, format!("HTTP {status}"));
        error.status = Some(status);

        let Ok(Value::Object(json)) = serde_json::from_str::<Value>(body) else {
            if !body.trim().is_empty() {
                error.message = format!("HTTP {status}: {}", body.trim());
            }
            return error;
        };

        let text = |key: &str| {
            json.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        if let Some(message) = text("msg")
            .or_else(|| text("error_description"))
            .or_else(|| text("message"))
            .or_else(|| text("error"))
        {
            error.message = message;
        }
        error.code = text("error_code").or_else(|| text("code"));
        error.details = text("details");
        error.hint = text("hint");
        error
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            BackendErrorKind::Timeout
        } else if err.is_connect() {
            BackendErrorKind::Connect
        } else if err.is_decode() {
            BackendErrorKind::Parse
        } else {
            BackendErrorKind::HttpStatus
        };
        let mut error = Self::new(kind, err.to_string());
        error.status = err.status().map(|s| s.as_u16());
        error
    }

    /// True when the error says the queried table does not exist.
    ///
    /// Postgres reports `relation "public.X" does not exist` (42P01); newer
    /// PostgREST versions answer PGRST205 "Could not find the table".
    pub fn is_missing_relation(&self) -> bool {
        self.message.contains("relation")
            || self.message.contains("does not exist")
            || matches!(self.code.as_deref(), Some("42P01" | "PGRST205"))
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BackendError {}

/// Thin wrapper over `reqwest` carrying the project URL and anon key.
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, anon_key: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    /// Builds a client from resolved config values.
    ///
    /// # Errors
    /// Returns an error if the URL or key cannot be resolved.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.resolved_url()?,
            &config.resolved_anon_key()?,
            config.request_timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Starts a request carrying the api key and bearer token.
    ///
    /// Without a user token the anon key is sent as the bearer.
    pub fn request(&self, method: Method, url: &str, bearer: Option<&str>) -> RequestBuilder {
        let token = bearer.unwrap_or(&self.anon_key);
        debug!(%method, url, "backend request");
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    /// Joins `path` onto the project URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends a request and decodes a JSON body, mapping failures to
    /// [`BackendError`].
    ///
    /// # Errors
    /// Returns the structured backend error on transport or HTTP failure.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<T, BackendError> {
        let response = self.send(request).await?;
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::from_reqwest(&e))?;
        serde_json::from_str(&body).map_err(|e| {
            let mut error = BackendError::new(
                BackendErrorKind::Parse,
                format!("Failed to parse backend response: {e}"),
            );
            error.details = Some(body);
            error
        })
    }

    /// Sends a request and discards a successful body.
    ///
    /// # Errors
    /// Returns the structured backend error on transport or HTTP failure.
    pub async fn send_empty(&self, request: RequestBuilder) -> std::result::Result<(), BackendError> {
        self.send(request).await.map(|_| ())
    }

    async fn send(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<reqwest::Response, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(&e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let error = BackendError::from_response(status.as_u16(), &body);
        debug!(status = status.as_u16(), code = ?error.code, message = %error.message, "backend error");
        Err(error)
    }

    /// Selects all columns of `table`, ordered ascending by `order_column`.
    ///
    /// # Errors
    /// Returns the backend error unchanged so callers can inspect it.
    pub async fn select_ordered(
        &self,
        table: &str,
        order_column: &str,
        bearer: Option<&str>,
    ) -> std::result::Result<Vec<Value>, BackendError> {
        let mut url = url::Url::parse(&self.url("/rest/v1/")).map_err(|e| {
            BackendError::new(BackendErrorKind::Parse, format!("Invalid REST URL: {e}"))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                BackendError::new(BackendErrorKind::Parse, "Supabase URL cannot be a base")
            })?
            .pop_if_empty()
            .push(table);
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", &format!("{order_column}.asc"));

        let request = self.request(Method::GET, url.as_str(), bearer);
        self.send_json(request).await
    }

    /// True when the auth health endpoint answers within `timeout` without
    /// a server error.
    pub async fn is_reachable(&self, timeout: Duration) -> bool {
        let request = self
            .request(Method::GET, &self.url("/auth/v1/health"), None)
            .timeout(timeout);
        match request.send().await {
            Ok(response) => !response.status().is_server_error(),
            Err(e) => {
                debug!(error = %e, "backend not reachable yet");
                false
            }
        }
    }

    /// Polls the backend until it answers, `attempts` polls have failed, or
    /// `budget` has elapsed, whichever comes first.
    ///
    /// # Errors
    /// Returns [`CLIENT_LOAD_FAILED`] when the backend never answered.
    pub async fn wait_ready(
        &self,
        attempts: u32,
        interval: Duration,
        budget: Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + budget;
        let polls = async {
            for attempt in 1..=attempts {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if self.is_reachable(remaining).await {
                    return true;
                }
                if attempt < attempts {
                    tokio::time::sleep(interval).await;
                }
            }
            false
        };

        if let Ok(true) = tokio::time::timeout_at(deadline, polls).await {
            return Ok(());
        }
        warn!(attempts, budget_ms = budget.as_millis(), "backend never became reachable");
        anyhow::bail!(CLIENT_LOAD_FAILED)
    }
}

/// Lazily-initialized, shared client handle.
#[derive(Debug, Default)]
pub struct ClientHandle {
    cell: OnceCell<Arc<SupabaseClient>>,
}

impl ClientHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the client if it has already been initialized.
    pub fn get(&self) -> Option<Arc<SupabaseClient>> {
        self.cell.get().map(Arc::clone)
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// Returns the shared client, creating it on first use.
    ///
    /// A failed initialization leaves the handle empty so the next call
    /// tries again.
    ///
    /// # Errors
    /// Returns an error if config resolution fails or the backend never
    /// becomes reachable.
    pub async fn get_or_init(&self, config: &Config) -> Result<Arc<SupabaseClient>> {
        let client = self
            .cell
            .get_or_try_init(|| async {
                let client = SupabaseClient::from_config(config)?;
                client
                    .wait_ready(
                        config.ready_attempts(),
                        config.ready_poll_interval(),
                        config.ready_timeout(),
                    )
                    .await?;
                info!(url = client.base_url(), "Supabase client initialized");
                Ok::<_, anyhow::Error>(Arc::new(client))
            })
            .await?;
        Ok(Arc::clone(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response_postgrest_shape() {
        let body = r#"{"code":"42P01","details":null,"hint":null,"message":"relation \"public.Ores\" does not exist"}"#;
        let error = BackendError::from_response(404, body);
        assert_eq!(error.kind, BackendErrorKind::HttpStatus);
        assert_eq!(error.status, Some(404));
        assert_eq!(error.code.as_deref(), Some("42P01"));
        assert_eq!(error.message, "relation \"public.Ores\" does not exist");
        assert!(error.details.is_none());
        assert!(error.is_missing_relation());
    }

    #[test]
    fn test_from_response_gotrue_msg_shape() {
        let body = r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#;
        let error = BackendError::from_response(400, body);
        assert_eq!(error.message, "Invalid login credentials");
        assert_eq!(error.code.as_deref(), Some("invalid_credentials"));
        assert!(!error.is_missing_relation());
    }

    #[test]
    fn test_from_response_legacy_gotrue_shape() {
        let body = r#"{"error":"invalid_grant","error_description":"Email not confirmed"}"#;
        let error = BackendError::from_response(400, body);
        assert_eq!(error.message, "Email not confirmed");
    }

    #[test]
    fn test_from_response_plain_body() {
        let error = BackendError::from_response(502, "Bad Gateway");
        assert_eq!(error.message, "HTTP 502: Bad Gateway");
        let empty = BackendError::from_response(500, "");
        assert_eq!(empty.message, "HTTP 500");
    }

    #[test]
    fn test_missing_relation_by_code_only() {
        let body = r#"{"code":"PGRST205","message":"Could not find the table 'public.Ores' in the schema cache"}"#;
        assert!(BackendError::from_response(404, body).is_missing_relation());

        let rls = r#"{"code":"42501","message":"permission denied for table Ores"}"#;
        assert!(!BackendError::from_response(401, rls).is_missing_relation());
    }

    #[test]
    fn test_url_strips_trailing_slash() {
        let client = SupabaseClient::new("http://localhost:54321/", "key", None).unwrap();
        assert_eq!(client.base_url(), "http://localhost:54321");
        assert_eq!(
            client.url("/auth/v1/health"),
            "http://localhost:54321/auth/v1/health"
        );
    }

    #[test]
    fn test_handle_starts_empty() {
        let handle = ClientHandle::new();
        assert!(!handle.is_initialized());
        assert!(handle.get().is_none());
    }
}
