//! File logging setup.
//!
//! Logs go to `${ORES_HOME}/logs/ores.log` so stdout stays reserved for the
//! rendered page. The filter is read from `ORES_LOG` (falls back to info).

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::paths;

/// Env var holding the tracing filter directive.
pub const LOG_ENV: &str = "ORES_LOG";

const LOG_FILE: &str = "ores.log";
const DEFAULT_FILTER: &str = "ores=info,ores_core=info";

/// Returns the path of the log file.
pub fn log_path() -> PathBuf {
    paths::log_dir().join(LOG_FILE)
}

/// Installs the global subscriber.
///
/// The returned guard flushes buffered lines on drop; keep it alive for the
/// whole process.
///
/// # Errors
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init() -> Result<WorkerGuard> {
    let dir = paths::log_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(&dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter_from_env())
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))?;

    Ok(guard)
}

fn filter_from_env() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Shortens a token for display (never log or print tokens in full).
pub fn mask_token(token: &str) -> String {
    if token.len() <= 16 {
        return "***".to_string();
    }
    let prefix: String = token.chars().take(12).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token_short_is_fully_hidden() {
        assert_eq!(mask_token("abc"), "***");
        assert_eq!(mask_token("0123456789abcdef"), "***");
    }

    #[test]
    fn test_mask_token_long_keeps_prefix() {
        let masked = mask_token("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.payload");
        assert_eq!(masked, "eyJhbGciOiJI...");
    }

    #[test]
    fn test_log_path_is_under_log_dir() {
        assert!(log_path().ends_with("logs/ores.log"));
    }
}
