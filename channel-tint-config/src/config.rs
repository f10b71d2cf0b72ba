//! Colorizer tunables: trigger timings, host-page selectors and logging.
//!
//! Covers:
//! - `Config` with per-field serde defaults
//! - `load` / `load_from` (YAML, missing file yields defaults)
//! - XDG-style path helpers (`config_dir`, `config_path`, `settings_path`)
//! - `validate` for values that would make the pipeline misbehave

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::defaults;
use crate::error::ConfigError;

/// Log level configuration.
///
/// Controls the verbosity of log output written to the debug log file.
/// Environment variable `RUST_LOG` and the `--log-level` CLI flag take precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// No logging (log file not created)
    #[default]
    Off,
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Most verbose
    Trace,
}

impl LogLevel {
    /// Convert to `log::LevelFilter`
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Colorizer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // ── Trigger timings ──────────────────────────────────────────────────
    /// How often the navigation address is sampled when the host offers no feed.
    #[serde(default = "defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Wait after an address change before re-evaluating.
    #[serde(default = "defaults::settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Wait after a channel-list click before re-evaluating.
    #[serde(default = "defaults::click_delay_ms")]
    pub click_delay_ms: u64,

    /// Debounce for settings file change events.
    #[serde(default = "defaults::settings_debounce_ms")]
    pub settings_debounce_ms: u64,

    // ── Channel resolution ───────────────────────────────────────────────
    /// Regex over the navigation address; capture group 1 is the channel id.
    #[serde(default = "defaults::address_pattern")]
    pub address_pattern: String,

    /// Page lookups tried in order; the first non-empty text wins.
    #[serde(default = "defaults::label_selectors")]
    pub label_selectors: Vec<String>,

    /// Fall back to the last path segment of the address.
    #[serde(default = "defaults::bool_true")]
    pub trailing_segment_fallback: bool,

    // ── Decoration ───────────────────────────────────────────────────────
    /// The message-composition surface that receives the tint.
    #[serde(default = "defaults::surface_selector")]
    pub surface_selector: String,

    /// Clicks inside these elements schedule a re-evaluation.
    #[serde(default = "defaults::channel_item_selectors")]
    pub channel_item_selectors: Vec<String>,

    /// Drop a settings read when a newer pass started while it was in flight.
    #[serde(default = "defaults::bool_true")]
    pub discard_stale_reads: bool,

    // ── Misc ─────────────────────────────────────────────────────────────
    /// Settings file; `None` means `settings.yaml` next to the config file.
    #[serde(default)]
    pub settings_path: Option<PathBuf>,

    #[serde(default)]
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::poll_interval_ms(),
            settle_delay_ms: defaults::settle_delay_ms(),
            click_delay_ms: defaults::click_delay_ms(),
            settings_debounce_ms: defaults::settings_debounce_ms(),
            address_pattern: defaults::address_pattern(),
            label_selectors: defaults::label_selectors(),
            trailing_segment_fallback: true,
            surface_selector: defaults::surface_selector(),
            channel_item_selectors: defaults::channel_item_selectors(),
            discard_stale_reads: true,
            settings_path: None,
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default path, or defaults if it does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        log::info!("Loading config from {:?}", path);
        let contents = fs::read_to_string(path)
            .map_err(ConfigError::from)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = if contents.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml_ng::from_str(&contents)
                .map_err(ConfigError::from)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pattern = regex::Regex::new(&self.address_pattern).map_err(|e| {
            ConfigError::Validation(format!("address_pattern does not compile: {e}"))
        })?;
        if pattern.captures_len() < 2 {
            return Err(ConfigError::Validation(
                "address_pattern needs a capture group for the channel id".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.surface_selector.trim().is_empty() {
            return Err(ConfigError::Validation(
                "surface_selector must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn click_delay(&self) -> Duration {
        Duration::from_millis(self.click_delay_ms)
    }

    /// Configuration directory: `~/.config/channel-tint` (or the platform config dir on Windows).
    pub fn config_dir() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            if let Some(config_dir) = dirs::config_dir() {
                config_dir.join("channel-tint")
            } else {
                PathBuf::from(".")
            }
        }
        #[cfg(not(target_os = "windows"))]
        {
            if let Some(home_dir) = dirs::home_dir() {
                home_dir.join(".config").join("channel-tint")
            } else {
                PathBuf::from(".")
            }
        }
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    /// Effective settings file path.
    pub fn settings_path(&self) -> PathBuf {
        self.settings_path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("settings.yaml"))
    }
}
