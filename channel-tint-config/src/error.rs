//! Typed error variants for the channel-tint-config crate.
//!
//! Callers at the crate boundary can match on specific failure modes instead
//! of opaque `anyhow` strings. `Config::load` still returns `anyhow::Result`;
//! these errors coerce into it through the blanket `From` impl.

use std::path::PathBuf;
use thiserror::Error;

/// A color string that is not `#rrggbb` or `#rgb`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorParseError {
    #[error("invalid hex digit in color '{0}'")]
    InvalidDigit(String),

    #[error("color '{input}' has {len} hex digits, expected 3 or 6")]
    InvalidLength { input: String, len: usize },
}

/// Errors produced while reading the exclusion settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid YAML or has an unparsable color.
    #[error("failed to parse settings from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// The backing store is gone (e.g. dropped by the host).
    #[error("settings store unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An I/O error occurred reading or writing the config file.
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// The config file contained invalid YAML that could not be parsed.
    #[error("YAML parse error in config: {0}")]
    Parse(#[from] serde_yaml_ng::Error),

    /// A field value failed semantic validation.
    ///
    /// The inner string describes which field is invalid and why.
    #[error("Config validation error: {0}")]
    Validation(String),
}
