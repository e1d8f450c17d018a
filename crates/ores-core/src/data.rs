//! Row model and the table query.
//!
//! Rows arrive as loose JSON objects; column names may be capitalized or not
//! (`Name`/`name`, `Strength`/`strength`), so fields are read by lookup.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::client::{BackendError, SupabaseClient};
use crate::config::Config;

pub const MISSING_NAME: &str = "N/A";
pub const INVALID_DATE: &str = "Invalid Date";

/// Display format for `created_at` (en-US style locale string).
const CREATED_AT_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// One row of the table.
#[derive(Debug, Clone, PartialEq)]
pub struct OreRow(Map<String, Value>);

impl OreRow {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Wraps a JSON value; non-objects become empty rows.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self(fields),
            other => {
                warn!(row = %other, "ignoring non-object row");
                Self(Map::new())
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// `id` as displayed; strings are shown without quotes.
    pub fn id_display(&self) -> String {
        match self.0.get("id") {
            None => "undefined".to_string(),
            Some(value) => scalar_display(value),
        }
    }

    /// First non-empty of `Name`, `name`, else [`MISSING_NAME`].
    pub fn name(&self) -> String {
        ["Name", "name"]
            .iter()
            .filter_map(|key| self.0.get(*key))
            .find(|value| is_truthy(value))
            .map_or_else(|| MISSING_NAME.to_string(), scalar_display)
    }

    /// First non-null of `Strength`, `strength`. `None` when both are absent.
    fn strength_value(&self) -> Option<&Value> {
        ["Strength", "strength"]
            .iter()
            .filter_map(|key| self.0.get(*key))
            .find(|value| !value.is_null())
    }

    /// Numeric strength; absent or non-numeric counts as 0.
    pub fn strength(&self) -> f64 {
        match self.strength_value() {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    pub fn strength_display(&self) -> String {
        match self.strength_value() {
            Some(Value::Number(n)) => n.as_f64().map_or_else(|| n.to_string(), format_number),
            Some(value) => scalar_display(value),
            None => "0".to_string(),
        }
    }

    /// `created_at` as a local-time string.
    pub fn created_at_display(&self) -> String {
        self.created_at_display_in(&Local)
    }

    pub fn created_at_display_in<Tz>(&self, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        match self.0.get("created_at") {
            Some(Value::String(raw)) => format_timestamp(raw, tz),
            // Numbers are epoch milliseconds; null and booleans coerce to 0 or 1.
            Some(Value::Number(n)) => match n.as_f64().filter(|ms| ms.is_finite()) {
                Some(ms) => format_epoch_millis(ms as i64, tz),
                None => INVALID_DATE.to_string(),
            },
            Some(Value::Null) => format_epoch_millis(0, tz),
            Some(Value::Bool(b)) => format_epoch_millis(i64::from(*b), tz),
            _ => INVALID_DATE.to_string(),
        }
    }
}

fn format_epoch_millis<Tz>(millis: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    DateTime::from_timestamp_millis(millis).map_or_else(
        || INVALID_DATE.to_string(),
        |at| at.with_timezone(tz).format(CREATED_AT_FORMAT).to_string(),
    )
}

/// Formats an ISO-8601 timestamp in `tz`.
///
/// Timestamps without an offset are read as local to `tz`.
pub fn format_timestamp<Tz>(raw: &str, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(tz).format(CREATED_AT_FORMAT).to_string();
    }
    // Postgres can render `timestamptz` with a space separator and short offset.
    if let Ok(parsed) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return parsed.with_timezone(tz).format(CREATED_AT_FORMAT).to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, pattern)
            && let Some(local) = tz.from_local_datetime(&naive).earliest()
        {
            return local.format(CREATED_AT_FORMAT).to_string();
        }
    }
    INVALID_DATE.to_string()
}

/// Renders whole floats without a fractional part (`5.0` -> `5`).
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn scalar_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.as_f64().map_or_else(|| n.to_string(), format_number),
        other => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Which table to query and how to order it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    pub table: String,
    pub fallback_table: String,
    pub order_column: String,
}

impl TableQuery {
    pub fn from_config(config: &Config) -> Self {
        Self {
            table: config.table.clone(),
            fallback_table: config.fallback_table.clone(),
            order_column: config.order_column.clone(),
        }
    }
}

/// Fetches every row, ordered ascending.
///
/// If the primary table name is reported missing, the query is retried once
/// against the fallback name. Every other error is returned as-is.
///
/// # Errors
/// Returns the last backend error.
pub async fn fetch_ores(
    client: &SupabaseClient,
    bearer: Option<&str>,
    query: &TableQuery,
) -> Result<Vec<OreRow>, BackendError> {
    info!(table = %query.table, "querying table");
    let result = client
        .select_ordered(&query.table, &query.order_column, bearer)
        .await;

    let values = match result {
        Ok(values) => values,
        Err(error) if error.is_missing_relation() && query.fallback_table != query.table => {
            warn!(
                table = %query.table,
                fallback = %query.fallback_table,
                error = %error,
                "table not found; trying fallback name"
            );
            client
                .select_ordered(&query.fallback_table, &query.order_column, bearer)
                .await?
        }
        Err(error) => return Err(error),
    };

    info!(rows = values.len(), "loaded rows");
    Ok(values.into_iter().map(OreRow::from_value).collect())
}
