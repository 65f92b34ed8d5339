//! Bot configuration
//!
//! ## Configuration Sources (in precedence order)
//!
//! 1. `AMOEBOID_*` environment variables
//! 2. YAML file given by `--config` or `AMOEBOID_CONFIG`
//! 3. Built-in defaults
//!
//! ```yaml
//! refresh_interval_hours: 24
//! default_prefix: "a!"
//! default_wrapping: "[[*]]"
//! db_path: bot.db
//! mana_glyphs:
//!   "2": "<:mana2:800118427553267752>"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::query::Wrapping;

/// Environment variable naming an optional YAML config file
pub const CONFIG_PATH_ENV: &str = "AMOEBOID_CONFIG";

const ENV_REFRESH_INTERVAL: &str = "AMOEBOID_REFRESH_INTERVAL";
const ENV_DEFAULT_PREFIX: &str = "AMOEBOID_DEFAULT_PREFIX";
const ENV_DEFAULT_WRAPPING: &str = "AMOEBOID_DEFAULT_WRAPPING";
const ENV_DB_NAME: &str = "AMOEBOID_DB_NAME";
const ENV_API_BASE: &str = "AMOEBOID_API_BASE";
const ENV_REQUEST_TIMEOUT: &str = "AMOEBOID_REQUEST_TIMEOUT";
const ENV_REQUEST_SPACING: &str = "AMOEBOID_REQUEST_SPACING_MS";
const ENV_SERVE_STALE: &str = "AMOEBOID_SERVE_STALE";

/// Remote calls need time; anything shorter is clamped up
const MIN_TIMEOUT_SECONDS: u64 = 5;

/// Top-level configuration for the card service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotConfig {
    /// Cache entries older than this are refetched
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_hours: u64,

    /// Command prefix for servers that never changed it
    #[serde(default = "default_prefix")]
    pub default_prefix: String,

    /// Mention wrapping for servers that never changed it and for direct messages
    #[serde(default = "default_wrapping")]
    pub default_wrapping: String,

    /// SQLite database holding cards, names and settings
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Base URL of the card catalog API
    #[serde(default = "default_api_base")]
    pub api_base_url: String,

    /// Minimum spacing between outbound catalog calls
    #[serde(default = "default_request_spacing")]
    pub request_spacing_ms: u64,

    /// Per-call HTTP timeout
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,

    /// Upper bound on mentions handled in one message
    #[serde(default = "default_max_cards")]
    pub max_cards_per_message: usize,

    /// Serve a stale cache entry when its refresh fails
    #[serde(default = "default_true")]
    pub serve_stale_on_error: bool,

    /// Custom inline glyphs keyed by mana symbol without braces (e.g. `"2"`, `"W/U"`)
    #[serde(default)]
    pub mana_glyphs: BTreeMap<String, String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            refresh_interval_hours: default_refresh_interval(),
            default_prefix: default_prefix(),
            default_wrapping: default_wrapping(),
            db_path: default_db_path(),
            api_base_url: default_api_base(),
            request_spacing_ms: default_request_spacing(),
            request_timeout_seconds: default_timeout(),
            max_cards_per_message: default_max_cards(),
            serve_stale_on_error: true,
            mana_glyphs: BTreeMap::new(),
        }
    }
}

fn default_refresh_interval() -> u64 {
    24
}

fn default_prefix() -> String {
    "a!".to_string()
}

fn default_wrapping() -> String {
    "[[*]]".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("bot.db")
}

fn default_api_base() -> String {
    "https://api.scryfall.com".to_string()
}

fn default_request_spacing() -> u64 {
    250
}

fn default_timeout() -> u64 {
    30
}

fn default_max_cards() -> usize {
    10
}

fn default_true() -> bool {
    true
}

impl BotConfig {
    /// Load configuration with full precedence: defaults, file, environment
    ///
    /// `config_path` wins over `AMOEBOID_CONFIG` when both are present.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let path = config_path.map(Path::to_path_buf).or(env_path);

        let mut config = match path {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, without environment overrides
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: BotConfig = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `AMOEBOID_*` environment variables on top of the current values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(hours) = env_parse::<u64>(ENV_REFRESH_INTERVAL)? {
            self.refresh_interval_hours = hours;
        }
        if let Some(prefix) = env_string(ENV_DEFAULT_PREFIX) {
            self.default_prefix = prefix;
        }
        if let Some(wrapping) = env_string(ENV_DEFAULT_WRAPPING) {
            self.default_wrapping = wrapping;
        }
        if let Some(db) = env_string(ENV_DB_NAME) {
            self.db_path = PathBuf::from(db);
        }
        if let Some(base) = env_string(ENV_API_BASE) {
            self.api_base_url = base;
        }
        if let Some(timeout) = env_parse::<u64>(ENV_REQUEST_TIMEOUT)? {
            self.request_timeout_seconds = timeout;
        }
        if let Some(spacing) = env_parse::<u64>(ENV_REQUEST_SPACING)? {
            self.request_spacing_ms = spacing;
        }
        if let Some(serve_stale) = env_parse::<bool>(ENV_SERVE_STALE)? {
            self.serve_stale_on_error = serve_stale;
        }
        Ok(())
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        Wrapping::parse(&self.default_wrapping)
            .with_context(|| format!("Invalid default wrapping `{}`", self.default_wrapping))?;

        if self.default_prefix.trim().is_empty() {
            anyhow::bail!("Default prefix must not be empty");
        }
        if self.max_cards_per_message == 0 {
            anyhow::bail!("max_cards_per_message must be at least 1");
        }
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://")
        {
            anyhow::bail!("API base URL must start with http:// or https://");
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> chrono::Duration {
        chrono::Duration::hours(self.refresh_interval_hours as i64)
    }

    pub fn request_spacing(&self) -> Duration {
        Duration::from_millis(self.request_spacing_ms)
    }

    /// Request timeout, clamped to a minimum of five seconds
    pub fn request_timeout(&self) -> Duration {
        let seconds = if self.request_timeout_seconds < MIN_TIMEOUT_SECONDS {
            warn!(
                "Configured request_timeout_seconds={} is too low; using minimum of {} seconds",
                self.request_timeout_seconds, MIN_TIMEOUT_SECONDS
            );
            MIN_TIMEOUT_SECONDS
        } else {
            self.request_timeout_seconds
        };
        Duration::from_secs(seconds)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid value `{raw}` for {key}: {e}")),
        None => Ok(None),
    }
}
