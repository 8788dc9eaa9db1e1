//! Configuration management
//!
//! `settings.json` in the Clipo directory:
//! ```json
//! {
//!   "api": { "backendUrl": "http://localhost:8080", "frontendUrl": "http://localhost:5173", "timeoutSecs": 30 },
//!   "queries": { "staleTimeMs": 5000 },
//!   "analytics": { "startDate": "2025-01-01", "endDate": "2025-12-31" }
//! }
//! ```
//! Every field is optional. Fields this crate does not know are kept on save.
//! `CLIPO_BACKEND_URL`, `CLIPO_FRONTEND_URL` and `CLIPO_STALE_TIME_MS`
//! override the file without being written back.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::warn;
use url::Url;

use crate::domain::DateRange;

pub const SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_STALE_TIME_MS: u64 = 5000;

/// Clipo directory: `$CLIPO_DIR`, else `~/.clipo`
pub fn default_clipo_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CLIPO_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".clipo")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    api: ApiSettings,
    #[serde(default)]
    queries: QuerySettings,
    #[serde(default)]
    analytics: AnalyticsSettings,
    #[serde(flatten)]
    other: Map<String, JsonValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    backend_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    frontend_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
    #[serde(flatten)]
    other: Map<String, JsonValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuerySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stale_time_ms: Option<u64>,
    #[serde(flatten)]
    other: Map<String, JsonValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyticsSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_date: Option<NaiveDate>,
    #[serde(flatten)]
    other: Map<String, JsonValue>,
}

/// Effective configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    pub frontend_url: String,
    pub timeout: Duration,
    pub stale_time: Duration,
    /// Default range for click queries
    pub date_range: DateRange,
    // What was read from disk, written back by save()
    raw: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_settings(SettingsFile::default(), |_| None)
    }
}

impl Config {
    /// Load config from the Clipo directory, applying env overrides
    pub fn load(clipo_dir: &Path) -> Result<Self> {
        Self::load_with_env(clipo_dir, |key| std::env::var(key).ok())
    }

    /// Load with a custom environment lookup
    pub fn load_with_env(clipo_dir: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw = read_settings(&clipo_dir.join(SETTINGS_FILE))?;
        Ok(Self::from_settings(raw, env))
    }

    fn from_settings(raw: SettingsFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let backend_url = env("CLIPO_BACKEND_URL")
            .or_else(|| raw.api.backend_url.clone())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        let frontend_url = env("CLIPO_FRONTEND_URL")
            .or_else(|| raw.api.frontend_url.clone())
            .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string());
        let stale_ms = env("CLIPO_STALE_TIME_MS")
            .and_then(|v| v.parse().ok())
            .or(raw.queries.stale_time_ms)
            .unwrap_or(DEFAULT_STALE_TIME_MS);
        let timeout_secs = raw.api.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);

        let date_range = match (raw.analytics.start_date, raw.analytics.end_date) {
            (Some(start), Some(end)) => DateRange::new(start, end).unwrap_or_else(|_| {
                warn!(%start, %end, "ignoring inverted analytics range in settings");
                DateRange::current_year()
            }),
            _ => DateRange::current_year(),
        };

        Self {
            backend_url: backend_url.trim_end_matches('/').to_string(),
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_secs),
            stale_time: Duration::from_millis(stale_ms),
            date_range,
            raw,
        }
    }

    /// Save to the Clipo directory. Only file-sourced values and explicit
    /// setter changes are written; env overrides are not.
    pub fn save(&self, clipo_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(clipo_dir)?;
        let settings_path = clipo_dir.join(SETTINGS_FILE);

        // Re-read so keys written by someone else since load() survive
        let mut settings = read_settings(&settings_path)?;
        settings.api.backend_url = self.raw.api.backend_url.clone();
        settings.api.frontend_url = self.raw.api.frontend_url.clone();
        settings.api.timeout_secs = self.raw.api.timeout_secs;
        settings.queries.stale_time_ms = self.raw.queries.stale_time_ms;
        settings.analytics.start_date = self.raw.analytics.start_date;
        settings.analytics.end_date = self.raw.analytics.end_date;

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)
            .with_context(|| format!("Failed to write {}", settings_path.display()))?;
        Ok(())
    }

    pub fn set_backend_url(&mut self, url: &str) -> Result<()> {
        let url = normalize_url(url)?;
        self.raw.api.backend_url = Some(url.clone());
        self.backend_url = url;
        Ok(())
    }

    pub fn set_frontend_url(&mut self, url: &str) -> Result<()> {
        let url = normalize_url(url)?;
        self.raw.api.frontend_url = Some(url.clone());
        self.frontend_url = url;
        Ok(())
    }

    pub fn set_date_range(&mut self, range: DateRange) {
        self.raw.analytics.start_date = Some(range.start);
        self.raw.analytics.end_date = Some(range.end);
        self.date_range = range;
    }
}

fn read_settings(path: &Path) -> Result<SettingsFile> {
    if !path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "malformed settings file, using defaults");
        SettingsFile::default()
    }))
}

fn normalize_url(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw.trim()).with_context(|| format!("'{}' is not a valid URL", raw))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("'{}' must be an http(s) URL", raw);
    }
    Ok(raw.trim().trim_end_matches('/').to_string())
}
