//! Configuration management for threadscan
//!
//! Configuration is loaded from environment variables, falling back to a
//! `.env` file in the working directory.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use crate::search_types::{SearchRequest, SortMode};

/// Smallest accepted consumer poll interval.
pub const MIN_POLL_INTERVAL_MS: u64 = 5;
/// Largest accepted consumer poll interval.
pub const MAX_POLL_INTERVAL_MS: u64 = 1_000;

/// Main configuration struct for threadscan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// JSON index file backing the mail store.
    pub database_path: PathBuf,
    /// Search expression used when none is given.
    pub default_search: String,
    /// Order in which collection runs produce threads.
    pub sort_mode: SortMode,
    /// Bounded wait interval for consumer-side condition waits.
    pub poll_interval_ms: u64,
    /// Display capacity used when no viewport geometry is known.
    pub view_rows: usize,
    /// Producer yields the processor after each appended record.
    pub yield_between_records: bool,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            default_search: "tag:inbox".to_string(),
            sort_mode: SortMode::NewestFirst,
            poll_interval_ms: 50,
            view_rows: 24,
            yield_between_records: true,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_value("THREADSCAN_DATABASE").filter(|v| !v.trim().is_empty()) {
            config.database_path = expand_home(v.trim());
        }
        if let Some(v) = env_value("THREADSCAN_DEFAULT_SEARCH") {
            config.default_search = v;
        }
        if let Some(v) = env_value("THREADSCAN_SORT") {
            match SortMode::parse(&v) {
                Some(mode) => config.sort_mode = mode,
                None => tracing::warn!("ignoring unknown THREADSCAN_SORT={v:?}"),
            }
        }
        config.poll_interval_ms = env_u64("THREADSCAN_POLL_INTERVAL_MS", config.poll_interval_ms)
            .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS);
        config.view_rows = env_usize("THREADSCAN_VIEW_ROWS", config.view_rows).max(1);
        config.yield_between_records =
            env_bool("THREADSCAN_YIELD_BETWEEN", config.yield_between_records);
        if let Some(v) = env_value("THREADSCAN_LOG_LEVEL").filter(|v| !v.trim().is_empty()) {
            config.log_level = v.trim().to_string();
        }

        config
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Build a collection request, using `default_search` when `expression`
    /// is absent or blank.
    #[must_use]
    pub fn search_request(&self, expression: Option<&str>) -> SearchRequest {
        let expression = expression
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .unwrap_or(&self.default_search);
        SearchRequest::new(expression).with_sort(self.sort_mode)
    }
}

// Helper functions for environment variable parsing

static DOTENV_VALUES: OnceLock<HashMap<String, String>> = OnceLock::new();

#[cfg(test)]
thread_local! {
    static TEST_ENV_OVERRIDES: std::cell::RefCell<HashMap<String, String>> =
        std::cell::RefCell::new(HashMap::new());
}

#[cfg(test)]
fn test_env_override_value(key: &str) -> Option<String> {
    TEST_ENV_OVERRIDES.with(|cell| cell.borrow().get(key).cloned())
}

fn dotenv_values() -> &'static HashMap<String, String> {
    DOTENV_VALUES.get_or_init(|| load_dotenv_file(Path::new(".env")))
}

/// Read a value from the .env file (if present).
#[must_use]
pub fn dotenv_value(key: &str) -> Option<String> {
    dotenv_values().get(key).cloned()
}

/// Read a value from the real environment first, falling back to .env.
#[must_use]
pub fn env_value(key: &str) -> Option<String> {
    #[cfg(test)]
    if let Some(v) = test_env_override_value(key) {
        return Some(v);
    }
    env::var(key).ok().or_else(|| dotenv_value(key))
}

fn load_dotenv_file(path: &Path) -> HashMap<String, String> {
    let Ok(contents) = fs::read_to_string(path) else {
        return HashMap::new();
    };
    parse_dotenv_contents(&contents)
}

/// Parse `KEY=value` lines, skipping comments and an optional `export ` prefix.
#[must_use]
pub fn parse_dotenv_contents(contents: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        map.insert(key.to_string(), parse_dotenv_value(value));
    }
    map
}

fn parse_dotenv_value(raw: &str) -> String {
    let trimmed = raw.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    // Unquoted values end at an inline comment.
    trimmed
        .split_once(" #")
        .map_or(trimmed, |(value, _)| value.trim_end())
        .to_string()
}

fn default_database_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".threadscan")
        .join("index.json")
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(raw)
}

fn parse_bool(value: &str, default: bool) -> bool {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" => true,
        "0" | "false" | "f" | "no" | "n" => false,
        _ => default,
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env_value(key).map_or(default, |v| parse_bool(&v, default))
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_value(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env_value(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
