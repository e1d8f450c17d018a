//! Account command handlers.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use ores_core::auth::SessionStore;
use ores_core::config::Config;
use ores_core::data::format_timestamp;
use ores_core::logging::mask_token;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Returns `password`, or reads one line from stdin when it is absent.
pub async fn password_or_prompt(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint!("Password: ");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

pub async fn sign_in(
    config: Config,
    anon: bool,
    email: &str,
    password: &str,
    html: Option<&Path>,
) -> Result<()> {
    let mut app = super::build_app(config, anon);
    app.sign_in(email, password).await;
    super::finish(&app, html)
}

pub async fn sign_up(
    config: Config,
    anon: bool,
    email: &str,
    password: &str,
    html: Option<&Path>,
) -> Result<()> {
    let mut app = super::build_app(config, anon);
    app.sign_up(email, password).await;
    super::finish(&app, html)
}

pub async fn sign_out(config: Config, anon: bool) -> Result<()> {
    let mut app = super::build_app(config, anon);
    app.sign_out().await;
    if !app.state().is_error() {
        println!("Signed out.");
    }
    super::finish(&app, None)
}

pub fn session() -> Result<()> {
    let store = SessionStore::default();
    let Some(session) = store.load().context("read stored session")? else {
        println!("Not signed in.");
        return Ok(());
    };

    let expires = DateTime::from_timestamp(session.expires_at, 0)
        .map(|at| format_timestamp(&at.to_rfc3339(), &Local))
        .unwrap_or_else(|| session.expires_at.to_string());

    println!("Signed in as {}", session.user.display_email());
    println!("Token: {}", mask_token(&session.access_token));
    if session.expires_within(0) {
        println!("Expired: {expires} (refreshed on next load)");
    } else {
        println!("Expires: {expires}");
    }
    println!("Stored at {}", store.path().display());
    Ok(())
}
