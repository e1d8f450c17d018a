//! Page controller: drives the client, auth and data loading, and keeps
//! [`PageState`] in sync.
//!
//! The app is itself a subscriber of [`AuthEvent`]s. Every auth action drains
//! pending events, and the events alone decide which view is shown and
//! whether data must be reloaded.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{info, warn};

use crate::auth::{Auth, AuthEvent, Credentials, Session, SessionStore, SignUpOutcome};
use crate::client::{BackendError, ClientHandle, SupabaseClient};
use crate::config::Config;
use crate::data::{TableQuery, fetch_ores};
use crate::page::{self, AuthView, ErrorView, OresTable, PageState};

type ProgressFn = Box<dyn Fn(&str) + Send + Sync>;

pub struct App {
    config: Config,
    query: TableQuery,
    require_auth: bool,
    client: ClientHandle,
    auth: Auth,
    events: broadcast::Receiver<AuthEvent>,
    current_user: Option<Session>,
    state: PageState,
    progress: Option<ProgressFn>,
}

impl App {
    pub fn new(config: Config, store: SessionStore) -> Self {
        let auth = Auth::new(store);
        let events = auth.subscribe();
        let require_auth = config.require_auth;
        Self {
            query: TableQuery::from_config(&config),
            config,
            require_auth,
            client: ClientHandle::new(),
            auth,
            events,
            current_user: None,
            state: PageState::new(initial_auth_view(require_auth)),
            progress: None,
        }
    }

    /// Overrides `require_auth` from config.
    #[must_use]
    pub fn with_require_auth(mut self, require_auth: bool) -> Self {
        self.require_auth = require_auth;
        self.state.auth = initial_auth_view(require_auth);
        self
    }

    /// Registers a callback invoked with every loading message.
    #[must_use]
    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn current_user(&self) -> Option<&Session> {
        self.current_user.as_ref()
    }

    pub fn requires_auth(&self) -> bool {
        self.require_auth
    }

    /// Subscribes to auth state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth.subscribe()
    }

    /// First load: restores the session (authenticated variant) and loads
    /// data when allowed.
    pub async fn start(&mut self) {
        if !self.require_auth {
            self.load_ores().await;
            return;
        }

        let Some(client) = self.ensure_client().await else {
            return;
        };
        if let Err(e) = self.auth.restore(&client).await {
            warn!(error = %e, "session restore failed");
            self.fail(page::TITLE_ERROR, &e);
            return;
        }
        if self.drain_auth_events() {
            self.load_ores().await;
        }
    }

    /// Loads and displays the table.
    pub async fn load_ores(&mut self) {
        self.state.error = None;
        self.state.table = None;

        if self.require_auth && self.current_user.is_none() {
            self.show_auth_form();
            return;
        }

        self.set_loading(page::LOADING_CONNECTING);
        let Some(client) = self.ensure_client().await else {
            return;
        };

        if self.require_auth {
            if let Err(e) = self.auth.get_session(&client).await {
                warn!(error = %e, "could not check session freshness");
            }
            self.drain_auth_events();
            if self.current_user.is_none() {
                self.show_auth_form();
                return;
            }
        }

        self.set_loading(&page::loading_fetch(&self.query.table));
        let bearer = self.current_user.as_ref().map(|s| s.access_token.clone());
        let result = fetch_ores(&client, bearer.as_deref(), &self.query).await;
        self.state.loading = None;

        match result {
            Ok(rows) => match OresTable::from_rows(&rows) {
                Some(table) => {
                    info!(rows = table.stats.total_count, "table rendered");
                    self.state.table = Some(table);
                }
                None => {
                    self.state.error = Some(ErrorView::plain(page::EMPTY_TABLE));
                }
            },
            Err(e) => {
                warn!(code = ?e.code, details = ?e.details, hint = ?e.hint, "load failed: {e}");
                self.state.error = Some(ErrorView::titled(page::TITLE_LOAD_FAILED, e.message));
            }
        }
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) {
        self.state.notice = None;
        let credentials = match Credentials::new(email, password) {
            Ok(credentials) => credentials,
            Err(e) => {
                self.fail(page::TITLE_SIGN_IN_FAILED, &e);
                return;
            }
        };
        let Some(client) = self.ensure_client().await else {
            return;
        };

        self.set_loading(page::LOADING_SIGN_IN);
        let result = self.auth.sign_in(&client, &credentials).await;
        self.state.loading = None;

        match result {
            Ok(_) => {
                self.state.error = None;
                if self.drain_auth_events() {
                    self.load_ores().await;
                }
            }
            Err(e) => self.fail(page::TITLE_SIGN_IN_FAILED, &e),
        }
    }

    pub async fn sign_up(&mut self, email: &str, password: &str) {
        self.state.notice = None;
        let credentials = match Credentials::for_sign_up(email, password) {
            Ok(credentials) => credentials,
            Err(e) => {
                self.fail(page::TITLE_SIGN_UP_FAILED, &e);
                return;
            }
        };
        let Some(client) = self.ensure_client().await else {
            return;
        };

        self.set_loading(page::LOADING_SIGN_UP);
        let result = self.auth.sign_up(&client, &credentials).await;
        self.state.loading = None;

        match result {
            Ok(SignUpOutcome::SignedIn(_)) => {
                self.state.error = None;
                if self.drain_auth_events() {
                    self.load_ores().await;
                }
            }
            Ok(SignUpOutcome::ConfirmationRequired(_)) => {
                self.state.error = None;
                self.state.notice = Some(page::CONFIRM_EMAIL.to_string());
            }
            Err(e) => self.fail(page::TITLE_SIGN_UP_FAILED, &e),
        }
    }

    pub async fn sign_out(&mut self) {
        self.state.notice = None;
        let Some(client) = self.ensure_client().await else {
            return;
        };

        self.set_loading(page::LOADING_SIGN_OUT);
        let result = self.auth.sign_out(&client).await;
        self.state.loading = None;

        match result {
            Ok(_) => {
                self.state.error = None;
                self.drain_auth_events();
            }
            Err(e) => self.fail(page::TITLE_SIGN_OUT_FAILED, &e),
        }
    }

    /// Applies one auth event. Returns true when data should be (re)loaded.
    pub fn apply_auth_event(&mut self, event: AuthEvent) -> bool {
        match event {
            AuthEvent::InitialSession(Some(session)) | AuthEvent::SignedIn(session) => {
                self.state.auth = AuthView::SignedIn {
                    email: session.user.display_email().to_string(),
                };
                self.current_user = Some(session);
                true
            }
            AuthEvent::TokenRefreshed(session) => {
                self.current_user = Some(session);
                false
            }
            AuthEvent::InitialSession(None) | AuthEvent::SignedOut => {
                self.current_user = None;
                self.state.table = None;
                self.state.auth = if self.require_auth {
                    AuthView::SignedOut
                } else {
                    AuthView::Hidden
                };
                false
            }
        }
    }

    /// Applies every pending auth event. Returns true if any asked for a load.
    fn drain_auth_events(&mut self) -> bool {
        let mut reload = false;
        loop {
            match self.events.try_recv() {
                Ok(event) => reload |= self.apply_auth_event(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "auth events lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        reload
    }

    /// Returns the shared client, initializing it on first use.
    async fn ensure_client(&mut self) -> Option<Arc<SupabaseClient>> {
        if let Some(client) = self.client.get() {
            return Some(client);
        }

        self.set_loading(page::LOADING_CLIENT);
        match self.client.get_or_init(&self.config).await {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "client initialization failed");
                self.fail(page::TITLE_ERROR, &e);
                None
            }
        }
    }

    fn show_auth_form(&mut self) {
        self.state.loading = None;
        self.state.auth = AuthView::SignedOut;
    }

    fn set_loading(&mut self, message: &str) {
        info!(message, "loading");
        if let Some(progress) = &self.progress {
            progress(message);
        }
        self.state.loading = Some(message.to_string());
    }

    fn fail(&mut self, title: &str, error: &anyhow::Error) {
        self.state.loading = None;
        self.state.error = Some(ErrorView::titled(title, error_message(error)));
    }
}

fn initial_auth_view(require_auth: bool) -> AuthView {
    if require_auth {
        AuthView::SignedOut
    } else {
        AuthView::Hidden
    }
}

/// Display text for an error: the backend message when there is one,
/// otherwise the full context chain.
pub fn error_message(error: &anyhow::Error) -> String {
    match error.downcast_ref::<BackendError>() {
        Some(backend) => backend.message.clone(),
        None => format!("{error:#}"),
    }
}
