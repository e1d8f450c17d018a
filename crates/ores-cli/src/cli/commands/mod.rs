//! CLI command handlers.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use ores_core::app::App;
use ores_core::auth::SessionStore;
use ores_core::config::Config;
use ores_core::render::{html, terminal};

use super::PageFailed;

pub mod auth;
pub mod config;
pub mod load;

const DEFAULT_WIDTH: u16 = 100;

/// Builds the page controller with loading messages going to stderr.
pub fn build_app(config: Config, anon: bool) -> App {
    let app = App::new(config, SessionStore::default()).with_progress(|message| {
        eprintln!("{message}");
    });
    if anon { app.with_require_auth(false) } else { app }
}

/// Prints the page, optionally writes it as HTML, and maps an error region
/// to a failing exit.
pub fn finish(app: &App, html_path: Option<&Path>) -> Result<()> {
    print!("{}", terminal::render(app.state(), terminal_width()));
    if let Some(path) = html_path {
        write_html(app, path)?;
    }
    if app.state().is_error() {
        return Err(PageFailed.into());
    }
    Ok(())
}

pub fn write_html(app: &App, path: &Path) -> Result<()> {
    let page = html::render(app.state())?;
    fs::write(path, page).with_context(|| format!("write page to {}", path.display()))?;
    eprintln!("Wrote {}", path.display());
    Ok(())
}

pub fn terminal_width() -> u16 {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .filter(|width| *width > 0)
        .unwrap_or(DEFAULT_WIDTH)
}
