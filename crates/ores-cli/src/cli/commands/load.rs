//! One-shot table load.

use std::path::Path;

use anyhow::Result;
use ores_core::config::Config;

pub async fn run(config: Config, anon: bool, html: Option<&Path>) -> Result<()> {
    let mut app = super::build_app(config, anon);
    app.start().await;
    super::finish(&app, html)
}
