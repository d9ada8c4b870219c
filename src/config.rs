// ABOUTME: TOML configuration for the client and resolution of API base and language
// ABOUTME: Explicit flags win over persisted preferences, which win over the config file

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::i18n::Lang;
use crate::poll::PollSettings;
use crate::session::Preferences;

/// Compiled-in API base, overridable at build time with `VPNW_API_BASE`.
pub const BUILD_API_BASE: &str = match option_env!("VPNW_API_BASE") {
    Some(base) => base,
    None => "http://127.0.0.1:8000",
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 { 30 }

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_interval_ms() -> u64 { 2000 }
fn default_max_retries() -> u32 { 2 }
fn default_retry_backoff_ms() -> u64 { 500 }

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl PollConfig {
    pub fn settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.interval_ms),
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String { "warn".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub api_base: Option<String>,
    pub language: Option<Lang>,
    /// Where configs and QR images are written. Defaults to the current directory.
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads an explicitly requested file, or the default location when it
    /// exists. A missing default file means all defaults.
    pub fn load(explicit: Option<&Path>, default_path: &Path) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_toml_file(path),
            None if default_path.exists() => Self::from_toml_file(default_path),
            None => Ok(Self::default()),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    /// Flag, then persisted preference, then config file, then build default.
    pub fn resolve_api_base(&self, flag: Option<&str>, prefs: &Preferences) -> String {
        flag.map(str::to_string)
            .or_else(|| prefs.api_base.clone())
            .or_else(|| self.api_base.clone())
            .map(|base| base.trim().to_string())
            .filter(|base| !base.is_empty())
            .unwrap_or_else(|| BUILD_API_BASE.to_string())
    }

    pub fn resolve_language(
        &self,
        flag: Option<Lang>,
        prefs: &Preferences,
        locale: Option<&str>,
    ) -> Lang {
        flag.or(prefs.language)
            .or(self.language)
            .or_else(|| locale.and_then(Lang::from_locale))
            .unwrap_or_default()
    }
}
