//! Plain-text rendering of the page using comfy-table.

use std::fmt::Write;

use comfy_table::{ContentArrangement, Table};

use crate::page::{AuthView, ErrorView, OresTable, PageState};

pub const HEADER: [&str; 4] = ["ID", "Name", "Strength", "Created At"];

/// Renders the page into lines of text no wider than `max_width` where the
/// table allows it.
pub fn render(state: &PageState, max_width: u16) -> String {
    let mut out = String::new();

    match &state.auth {
        AuthView::Hidden => {}
        AuthView::SignedOut => {
            out.push_str("Sign in or create an account to view the Ores table.\n");
        }
        AuthView::SignedIn { email } => {
            let _ = writeln!(out, "Signed in as {email}");
        }
    }

    if let Some(loading) = &state.loading {
        let _ = writeln!(out, "{loading}");
    }
    if let Some(notice) = &state.notice {
        let _ = writeln!(out, "{notice}");
    }
    if let Some(error) = &state.error {
        out.push_str(&render_error(error));
    }
    if let Some(table) = &state.table {
        out.push_str(&render_table(table, max_width));
    }

    out
}

pub fn render_error(error: &ErrorView) -> String {
    let mut out = String::new();
    if let Some(title) = &error.title {
        let _ = writeln!(out, "{title}");
    }
    let _ = writeln!(out, "{}", error.message);
    if let Some(hint) = error.hint {
        let _ = writeln!(out, "\nHint: {hint}");
    }
    if let Some(footer) = &error.footer {
        let _ = writeln!(out, "\n{footer}");
    }
    out
}

fn render_table(table: &OresTable, max_width: u16) -> String {
    let mut grid = Table::new();
    grid.set_width(max_width);
    grid.set_content_arrangement(ContentArrangement::Dynamic);
    grid.set_header(HEADER);
    for row in &table.rows {
        grid.add_row([&row.id, &row.name, &row.strength, &row.created_at]);
    }

    format!(
        "Total Ores: {}    Average Strength: {}\n{grid}\n",
        table.stats.total_count, table.stats.avg_strength
    )
}
