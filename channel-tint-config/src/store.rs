//! Settings stores: where the colorizer reads exclusions from.
//!
//! The colorizer only ever reads. Writes belong to the settings editor, which
//! is modelled here only as far as tests and the replay harness need it
//! (`MemorySettingsStore::replace`).

use parking_lot::RwLock;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

use crate::error::SettingsError;
use crate::settings::Settings;

/// Capacity of the change-notification channel. Subscribers that lag simply
/// see a `Lagged` error and re-read; no notification carries data.
const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Notification that the stored settings changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsChange {
    /// Settings replaced in memory.
    Replaced,
    /// The settings file on disk was modified.
    FileModified(PathBuf),
}

/// Asynchronous source of colorizer settings.
pub trait SettingsStore: Send + Sync {
    /// Read the current settings. May complete after other work has run.
    fn get(&self) -> impl Future<Output = Result<Settings, SettingsError>> + Send;

    /// Subscribe to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<SettingsChange>;
}

/// In-memory settings, notified on every `replace`.
#[derive(Debug)]
pub struct MemorySettingsStore {
    settings: RwLock<Settings>,
    changes: broadcast::Sender<SettingsChange>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            settings: RwLock::new(settings),
            changes,
        }
    }

    /// Replace the stored settings and notify subscribers.
    pub fn replace(&self, settings: Settings) {
        *self.settings.write() = settings;
        // No subscribers is fine: nothing is watching yet.
        let _ = self.changes.send(SettingsChange::Replaced);
    }

    pub fn snapshot(&self) -> Settings {
        self.settings.read().clone()
    }
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self) -> impl Future<Output = Result<Settings, SettingsError>> + Send {
        let settings = self.snapshot();
        async move { Ok(settings) }
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingsChange> {
        self.changes.subscribe()
    }
}

/// Settings persisted as a YAML file, re-read on every `get`.
pub struct FileSettingsStore {
    path: PathBuf,
    changes: broadcast::Sender<SettingsChange>,
    #[cfg(feature = "watcher")]
    _watcher: Option<crate::watcher::SettingsWatcher>,
}

impl std::fmt::Debug for FileSettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSettingsStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl FileSettingsStore {
    /// A store reading `path`. Without a watcher, changes are never announced.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            path: path.into(),
            changes,
            #[cfg(feature = "watcher")]
            _watcher: None,
        }
    }

    /// A store that also watches `path` and announces modifications.
    ///
    /// # Errors
    /// Returns an error if the file does not exist or cannot be watched.
    #[cfg(feature = "watcher")]
    pub fn watched(path: impl Into<PathBuf>, debounce_delay_ms: u64) -> anyhow::Result<Self> {
        let mut store = Self::new(path);
        let watcher = crate::watcher::SettingsWatcher::new(
            &store.path,
            debounce_delay_ms,
            store.changes.clone(),
        )?;
        store._watcher = Some(watcher);
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(path: PathBuf) -> Result<Settings, SettingsError> {
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("Settings file {:?} not found, using defaults", path);
                return Ok(Settings::default());
            }
            Err(source) => return Err(SettingsError::Io { path, source }),
        };
        Settings::from_yaml(&contents).map_err(|source| SettingsError::Parse { path, source })
    }
}

impl SettingsStore for FileSettingsStore {
    fn get(&self) -> impl Future<Output = Result<Settings, SettingsError>> + Send {
        Self::read(self.path.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingsChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::HexColor;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_store_replace_notifies() {
        let store = MemorySettingsStore::default();
        let mut rx = store.subscribe();

        store.replace(Settings::default().with_exclusion("general", "#ffffff"));

        assert_eq!(rx.recv().await.unwrap(), SettingsChange::Replaced);
        let settings = store.get().await.unwrap();
        assert!(settings.channel_colors.is_excluded("general"));
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let store = FileSettingsStore::new(dir.path().join("settings.yaml"));
        assert_eq!(store.get().await.unwrap(), Settings::default());
    }

    #[tokio::test]
    async fn test_file_store_reads_every_time() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "default_color: '#101010'\n").unwrap();

        let store = FileSettingsStore::new(&path);
        assert_eq!(
            store.get().await.unwrap().default_color,
            HexColor::new(0x10, 0x10, 0x10)
        );

        std::fs::write(&path, "default_color: '#202020'\n").unwrap();
        assert_eq!(
            store.get().await.unwrap().default_color,
            HexColor::new(0x20, 0x20, 0x20)
        );
    }

    #[tokio::test]
    async fn test_file_store_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "default_color: [not, a, color]\n").unwrap();

        let store = FileSettingsStore::new(&path);
        assert!(matches!(
            store.get().await,
            Err(SettingsError::Parse { .. })
        ));
    }
}
