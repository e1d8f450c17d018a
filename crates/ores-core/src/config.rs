//! Configuration management for ores.
//!
//! Loads configuration from ${ORES_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Env var overriding `supabase_url`.
pub const URL_ENV: &str = "ORES_SUPABASE_URL";
/// Env var overriding `anon_key`.
pub const ANON_KEY_ENV: &str = "ORES_SUPABASE_ANON_KEY";

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
/// To update, run `cargo xtask update-default-config`.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Recursively merges items from source table into target table.
fn merge_items(target: &mut toml_edit::Table, source: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, value) in source.iter() {
        match value {
            Item::Value(v) => {
                target[key] = Item::Value(v.clone());
            }
            Item::Table(src_table) => {
                if let Some(Item::Table(target_table)) = target.get_mut(key) {
                    merge_items(target_table, src_table);
                } else {
                    target[key] = Item::Table(src_table.clone());
                }
            }
            Item::ArrayOfTables(src_arr) => {
                target[key] = Item::ArrayOfTables(src_arr.clone());
            }
            Item::None => {}
        }
    }
}

pub mod paths {
    //! Path resolution for ores configuration and data directories.
    //!
    //! ORES_HOME resolution order:
    //! 1. ORES_HOME environment variable (if set)
    //! 2. ~/.config/ores (default)

    use std::path::PathBuf;

    /// Returns the ores home directory.
    pub fn ores_home() -> PathBuf {
        if let Ok(home) = std::env::var("ORES_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".ores"),
            |h| h.join(".config").join("ores"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        ores_home().join("config.toml")
    }

    /// Returns the path to the persisted auth session.
    pub fn session_path() -> PathBuf {
        ores_home().join("session.json")
    }

    /// Returns the directory log files are written to.
    pub fn log_dir() -> PathBuf {
        ores_home().join("logs")
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project URL of the Supabase backend
    pub supabase_url: String,
    /// Public (anon) API key
    pub anon_key: String,
    /// Table queried for rows
    pub table: String,
    /// Table queried when `table` does not exist
    pub fallback_table: String,
    /// Column rows are ordered by, ascending
    pub order_column: String,
    /// Gate data loading behind sign-in
    pub require_auth: bool,
    /// Total time to wait for the backend on first load
    pub ready_timeout_ms: u64,
    /// Interval between readiness polls
    pub ready_poll_interval_ms: u64,
    /// Per-request timeout (0 disables)
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            supabase_url: Self::DEFAULT_SUPABASE_URL.to_string(),
            anon_key: Self::DEFAULT_ANON_KEY.to_string(),
            table: "Ores".to_string(),
            fallback_table: "ores".to_string(),
            order_column: "id".to_string(),
            require_auth: true,
            ready_timeout_ms: 5000,
            ready_poll_interval_ms: 100,
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    pub const DEFAULT_SUPABASE_URL: &'static str = "https://ruwltlmovozahgoofmpi.supabase.co";
    pub const DEFAULT_ANON_KEY: &'static str = "sb_publishable_BU6nhQe_YgNuSOOsLO9d3g_vn_aXzRk";

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Resolves the backend URL with precedence: env > config.
    ///
    /// # Errors
    /// Returns an error if the resolved URL is empty or malformed.
    pub fn resolved_url(&self) -> Result<String> {
        let url = resolve_setting(std::env::var(URL_ENV).ok(), &self.supabase_url);
        if url.is_empty() {
            anyhow::bail!("No Supabase URL configured. Set {URL_ENV} or supabase_url in config.");
        }
        url::Url::parse(&url).with_context(|| format!("Invalid Supabase URL: {url}"))?;
        Ok(url.trim_end_matches('/').to_string())
    }

    /// Resolves the anon key with precedence: env > config.
    ///
    /// # Errors
    /// Returns an error if no key is configured.
    pub fn resolved_anon_key(&self) -> Result<String> {
        let key = resolve_setting(std::env::var(ANON_KEY_ENV).ok(), &self.anon_key);
        if key.is_empty() {
            anyhow::bail!(
                "No Supabase anon key configured. Set {ANON_KEY_ENV} or anon_key in config."
            );
        }
        Ok(key)
    }

    /// Number of readiness polls before giving up (at least one).
    pub fn ready_attempts(&self) -> u32 {
        let interval = self.ready_poll_interval_ms.max(1);
        u32::try_from(self.ready_timeout_ms / interval)
            .unwrap_or(u32::MAX)
            .max(1)
    }

    /// Total time allowed for readiness polling, never shorter than one
    /// poll interval.
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms.max(self.ready_poll_interval_ms).max(1))
    }

    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.request_timeout_secs))
        }
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Generates a fresh config TOML from Rust defaults.
    ///
    /// This is used by `xtask update-default-config` to keep
    /// `default_config.toml` in sync with `Config::default()`.
    ///
    /// # Errors
    /// Returns an error if serialization or template parsing fails.
    pub fn generate() -> Result<String> {
        use toml_edit::DocumentMut;

        let generated_toml = toml::to_string(&Config::default())
            .context("Failed to serialize default config to TOML")?;

        let mut doc: DocumentMut = default_config_template()
            .parse()
            .context("Failed to parse default config template")?;
        let generated_doc: DocumentMut = generated_toml
            .parse()
            .context("Failed to parse generated config")?;

        merge_items(doc.as_table_mut(), generated_doc.as_table());

        Ok(doc.to_string())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

/// Picks the env value when it is non-blank, otherwise the config value.
fn resolve_setting(env_value: Option<String>, config_value: &str) -> String {
    if let Some(value) = env_value {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    config_value.trim().to_string()
}
