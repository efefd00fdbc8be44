use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// How the session provider signs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginMethod {
    /// Drive the login page in a headless browser (default).
    Browser,
    /// POST the login form directly and parse the JSON response.
    Form,
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Seconds between poll cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Page fetch timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Bound on each login wait (form element present, success title shown).
    #[serde(default = "default_login_timeout")]
    pub login_timeout_secs: u64,

    /// Missing-element login failures tolerated before stopping for good.
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: u32,

    #[serde(default = "default_login_method")]
    pub login_method: LoginMethod,

    /// UTC offset of the site clock used in announcements. The site runs on
    /// US Pacific time; adjust for DST if the hour matters to you.
    #[serde(default = "default_clock_offset")]
    pub clock_utc_offset_hours: i32,

    /// Seconds between operator-command polls in service mode.
    #[serde(default = "default_command_poll")]
    pub command_poll_secs: u64,

    /// Emit a housekeeping log line every this many ticks. Unset picks the
    /// mode default (10 interactive, 3600 service).
    #[serde(default)]
    pub housekeeping_every: Option<u64>,
}

fn default_poll_interval() -> u64 {
    10
}

fn default_fetch_timeout() -> u64 {
    36
}

fn default_login_timeout() -> u64 {
    20
}

fn default_max_login_attempts() -> u32 {
    10
}

fn default_login_method() -> LoginMethod {
    LoginMethod::Browser
}

fn default_clock_offset() -> i32 {
    -8
}

fn default_command_poll() -> u64 {
    2
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            fetch_timeout_secs: default_fetch_timeout(),
            login_timeout_secs: default_login_timeout(),
            max_login_attempts: default_max_login_attempts(),
            login_method: default_login_method(),
            clock_utc_offset_hours: default_clock_offset(),
            command_poll_secs: default_command_poll(),
            housekeeping_every: None,
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Load config from `path`, falling back to defaults when the file does
    /// not exist. A file that exists but fails to parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write config to the given TOML file path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}
