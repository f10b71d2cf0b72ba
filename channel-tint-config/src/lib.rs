//! Settings and configuration for channel-tint.
//!
//! This crate provides:
//!
//! - The exclusion settings model (`Settings`, `ExclusionMap`, `HexColor`)
//! - Settings stores (`SettingsStore`, in-memory and YAML-file backed)
//! - Settings file watching for change notifications
//! - Colorizer configuration (`Config`) with defaults and validation

pub mod color;
pub mod config;
pub mod defaults;
pub mod error;
pub mod settings;
pub mod store;
#[cfg(feature = "watcher")]
pub mod watcher;

pub use color::{DARK_LUMA_THRESHOLD, HexColor};
pub use config::{Config, LogLevel};
pub use error::{ColorParseError, ConfigError, SettingsError};
pub use settings::{ExclusionMap, Settings};
pub use store::{FileSettingsStore, MemorySettingsStore, SettingsChange, SettingsStore};
#[cfg(feature = "watcher")]
pub use watcher::SettingsWatcher;
