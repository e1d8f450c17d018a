//! Standalone HTML rendering of the page.
//!
//! Element IDs (`loading`, `error`, `stats`, `total-count`, `avg-strength`,
//! `table-container`, `table-body`, `auth-container`, `user-info`,
//! `user-email`) stay stable so existing stylesheets and scripts keep working.

use anyhow::{Context, Result};
use minijinja::{Environment, UndefinedBehavior, context};

use crate::page::PageState;

const PAGE_TEMPLATE_NAME: &str = "page.html";
const PAGE_TEMPLATE: &str = include_str!("../../templates/page.html");
const PAGE_TITLE: &str = "Ores";

/// Renders the page as an HTML document. Row values are escaped.
///
/// # Errors
/// Returns an error if the template fails to render.
pub fn render(state: &PageState) -> Result<String> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    // The `.html` name turns on auto-escaping.
    env.add_template(PAGE_TEMPLATE_NAME, PAGE_TEMPLATE)
        .context("Failed to parse page template")?;

    let output = env
        .get_template(PAGE_TEMPLATE_NAME)
        .context("Failed to load page template")?
        .render(context! { state => state, title => PAGE_TITLE })
        .context("Failed to render page")?;

    Ok(output.replace("\r\n", "\n"))
}
