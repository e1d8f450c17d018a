//! Value-level model of the page: loading text, error region, stats, table
//! and the auth view. Renderers read this; [`crate::app::App`] writes it.

use serde::Serialize;

use crate::data::OreRow;
use crate::hints::Hint;
use crate::logging;
use crate::stats::Stats;

pub const LOADING_CONNECTING: &str = "Connecting to Supabase...";
pub const LOADING_CLIENT: &str = "Loading Supabase client...";
pub const LOADING_SIGN_IN: &str = "Signing in...";
pub const LOADING_SIGN_UP: &str = "Creating account...";
pub const LOADING_SIGN_OUT: &str = "Signing out...";
pub const EMPTY_TABLE: &str = "No ores found in the database. The table exists but is empty.";
pub const CONFIRM_EMAIL: &str = "Check your email to confirm your account, then sign in.";

pub const TITLE_ERROR: &str = "Error:";
pub const TITLE_LOAD_FAILED: &str = "Error loading data:";
pub const TITLE_SIGN_IN_FAILED: &str = "Sign-in failed:";
pub const TITLE_SIGN_UP_FAILED: &str = "Sign-up failed:";
pub const TITLE_SIGN_OUT_FAILED: &str = "Sign-out failed:";

pub fn loading_fetch(table: &str) -> String {
    format!("Fetching data from {table} table...")
}

/// Content of the error region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorView {
    pub title: Option<String>,
    pub message: String,
    pub hint: Option<&'static str>,
    pub footer: Option<String>,
}

impl ErrorView {
    /// Plain message without title, hint or footer.
    pub fn plain(message: impl Into<String>) -> Self {
        Self {
            title: None,
            message: message.into(),
            hint: None,
            footer: None,
        }
    }

    /// Titled error with a hint picked from the message.
    pub fn titled(title: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            title: Some(title.to_string()),
            hint: Hint::for_message(&message).map(Hint::text),
            message,
            footer: Some(format!(
                "Check {} for more details (set ORES_LOG=debug for request logs).",
                logging::log_path().display()
            )),
        }
    }
}

/// Which auth region is visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum AuthView {
    /// Unauthenticated variant: no auth region at all.
    Hidden,
    /// Auth form visible, data hidden.
    SignedOut,
    SignedIn { email: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowView {
    pub id: String,
    pub name: String,
    pub strength: String,
    pub created_at: String,
}

impl From<&OreRow> for RowView {
    fn from(row: &OreRow) -> Self {
        Self {
            id: row.id_display(),
            name: row.name(),
            strength: row.strength_display(),
            created_at: row.created_at_display(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OresTable {
    pub rows: Vec<RowView>,
    pub stats: Stats,
}

impl OresTable {
    /// Builds the table view; `None` for an empty row set.
    pub fn from_rows(rows: &[OreRow]) -> Option<Self> {
        let stats = Stats::compute(rows)?;
        Some(Self {
            rows: rows.iter().map(RowView::from).collect(),
            stats,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageState {
    pub loading: Option<String>,
    pub error: Option<ErrorView>,
    /// Informational message (e.g. "check your email").
    pub notice: Option<String>,
    pub table: Option<OresTable>,
    pub auth: AuthView,
}

impl PageState {
    pub fn new(auth: AuthView) -> Self {
        Self {
            loading: None,
            error: None,
            notice: None,
            table: None,
            auth,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn shows_auth_form(&self) -> bool {
        self.auth == AuthView::SignedOut
    }
}
