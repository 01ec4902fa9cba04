use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use locbot_types::parse_hm;

/// Environment variables consulted for the bot token, in order.
pub const TOKEN_ENV_VARS: [&str; 2] = ["LOCBOT_TOKEN", "TOKEN"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON5 parse error: {0}")]
    Json5(#[from] json5::Error),
    #[error("Config directory not found")]
    NoDirFound,
    #[error("Invalid time `{value}` in {field} (expected HH:MM)")]
    InvalidTime { field: String, value: String },
    #[error("Invalid {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("Bot token is not configured (set bot_token or {})", TOKEN_ENV_VARS.join("/"))]
    MissingToken,
}

/// A recurring report window: counts check-ins between `start` and `end`
/// and is delivered every day at `trigger_at` (all local times, `HH:MM`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub start: String,
    pub end: String,
    pub trigger_at: String,
}

impl WindowConfig {
    pub fn new(start: &str, end: &str, trigger_at: &str) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
            trigger_at: trigger_at.to_string(),
        }
    }
}

/// Top-level locbot configuration. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocBotConfig {
    /// Telegram bot token. Falls back to the environment when absent.
    #[serde(default, skip_serializing)]
    pub bot_token: Option<String>,
    /// Zone all report boundaries are expressed in.
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
    /// SQLite database file. Defaults to `~/.locbot/locations.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    /// Recurring report windows.
    #[serde(default = "default_windows")]
    pub windows: Vec<WindowConfig>,
    /// Local time of the daily full-day summary.
    #[serde(default = "default_daily_summary_at")]
    pub daily_summary_at: String,
    /// Upper bound for a single report delivery.
    #[serde(default = "default_delivery_timeout_secs")]
    pub delivery_timeout_secs: u64,
    /// Long-poll timeout passed to `getUpdates`.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

fn default_timezone() -> Tz {
    chrono_tz::Asia::Tashkent
}

fn default_windows() -> Vec<WindowConfig> {
    vec![
        WindowConfig::new("08:00", "09:30", "09:30"),
        WindowConfig::new("12:00", "14:00", "14:00"),
        WindowConfig::new("15:00", "16:30", "16:30"),
    ]
}

fn default_daily_summary_at() -> String {
    "19:00".to_string()
}

fn default_delivery_timeout_secs() -> u64 {
    30
}

fn default_poll_timeout_secs() -> u64 {
    30
}

impl Default for LocBotConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            timezone: default_timezone(),
            database_path: None,
            windows: default_windows(),
            daily_summary_at: default_daily_summary_at(),
            delivery_timeout_secs: default_delivery_timeout_secs(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

impl LocBotConfig {
    /// Check every configured time of day and the delivery timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delivery_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "delivery_timeout_secs".to_string(),
                reason: "must be at least 1 second".to_string(),
            });
        }
        check_time("daily_summary_at", &self.daily_summary_at)?;
        for (i, window) in self.windows.iter().enumerate() {
            check_time(&format!("windows[{i}].start"), &window.start)?;
            check_time(&format!("windows[{i}].end"), &window.end)?;
            check_time(&format!("windows[{i}].trigger_at"), &window.trigger_at)?;
        }
        Ok(())
    }

    /// Resolve the bot token from the file, then from the process environment.
    pub fn resolve_bot_token(&self) -> Result<String, ConfigError> {
        self.resolve_bot_token_with(|key| std::env::var(key).ok())
    }

    /// Like [`resolve_bot_token`](Self::resolve_bot_token) with an injectable lookup.
    pub fn resolve_bot_token_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<String, ConfigError> {
        self.bot_token
            .clone()
            .or_else(|| TOKEN_ENV_VARS.iter().find_map(|key| lookup(*key)))
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::MissingToken)
    }

    /// Database path, defaulting into the config directory.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(config_dir()?.join("locations.db")),
        }
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }
}

fn check_time(field: &str, value: &str) -> Result<(), ConfigError> {
    match parse_hm(value) {
        Some(_) => Ok(()),
        None => Err(ConfigError::InvalidTime {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Resolve the locbot config directory (~/.locbot/).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".locbot"))
        .ok_or(ConfigError::NoDirFound)
}

/// Resolve the config file path (~/.locbot/config.json5).
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.json5"))
}

/// Load configuration from the default path, falling back to defaults.
pub fn load_config() -> Result<LocBotConfig, ConfigError> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let path = config_file_path()?;
    load_config_from(&path)
}

/// Load configuration from a specific path, falling back to defaults if not found.
pub fn load_config_from(path: &Path) -> Result<LocBotConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("Config file not found at {}, using defaults", path.display());
        return Ok(LocBotConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: LocBotConfig = json5::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Ensure the config directory exists.
pub fn ensure_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = config_dir()?;
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}
