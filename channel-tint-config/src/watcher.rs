//! Settings file watcher for change notifications.
//!
//! Watches the settings file and publishes a `SettingsChange` whenever it is
//! modified. Uses debouncing to avoid a burst of notifications during rapid
//! saves from editors.

use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, Event, PollWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use crate::store::SettingsChange;

/// Watches the settings file and sends change notifications.
pub struct SettingsWatcher {
    /// The file system watcher (kept alive to maintain watching). Behind a
    /// mutex so the owning store stays `Sync`.
    _watcher: Mutex<Box<dyn Watcher + Send>>,
    path: PathBuf,
}

impl std::fmt::Debug for SettingsWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsWatcher")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Build the event-handler closure shared by both watcher backends.
///
/// Filters events to `filename`, applies debouncing, and publishes
/// `SettingsChange::FileModified` on `tx`.
fn make_event_handler(
    filename: std::ffi::OsString,
    canonical_path: PathBuf,
    debounce_delay: Duration,
    tx: broadcast::Sender<SettingsChange>,
    last_event_time: Arc<Mutex<Option<Instant>>>,
) -> impl Fn(std::result::Result<Event, notify::Error>) + Send + 'static {
    move |result: std::result::Result<Event, notify::Error>| {
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                log::warn!("Settings watcher error: {}", e);
                return;
            }
        };

        // Create covers atomic saves (write temp + rename)
        if !matches!(
            event.kind,
            notify::EventKind::Modify(_) | notify::EventKind::Create(_)
        ) {
            return;
        }

        let matches_settings = event
            .paths
            .iter()
            .any(|p| p.file_name().map(|f| f == filename).unwrap_or(false));
        if !matches_settings {
            return;
        }

        let should_send = {
            let now = Instant::now();
            let mut last = last_event_time.lock();
            match *last {
                Some(last_time) if now.duration_since(last_time) < debounce_delay => {
                    log::trace!("Debouncing settings change event");
                    false
                }
                _ => {
                    *last = Some(now);
                    true
                }
            }
        };

        if should_send {
            log::info!("Settings file changed: {}", canonical_path.display());
            // Nobody subscribed yet is not an error.
            let _ = tx.send(SettingsChange::FileModified(canonical_path.clone()));
        }
    }
}

impl SettingsWatcher {
    /// Start watching `settings_path`.
    ///
    /// Tries the platform-native watcher first and falls back to a
    /// `PollWatcher` (500 ms) when the native backend cannot start, e.g. in a
    /// container or on a network filesystem.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or watching fails on both backends.
    pub fn new(
        settings_path: &Path,
        debounce_delay_ms: u64,
        tx: broadcast::Sender<SettingsChange>,
    ) -> Result<Self> {
        if !settings_path.exists() {
            anyhow::bail!("Settings file not found: {}", settings_path.display());
        }

        let canonical = settings_path
            .canonicalize()
            .unwrap_or_else(|_| settings_path.to_path_buf());
        let filename = canonical
            .file_name()
            .context("Settings path has no filename")?
            .to_os_string();
        let parent_dir = canonical
            .parent()
            .context("Settings path has no parent directory")?
            .to_path_buf();

        let debounce_delay = Duration::from_millis(debounce_delay_ms);
        let last_event_time: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));

        let handler = make_event_handler(
            filename.clone(),
            canonical.clone(),
            debounce_delay,
            tx.clone(),
            Arc::clone(&last_event_time),
        );

        let mut watcher: Box<dyn Watcher + Send> = match notify::recommended_watcher(handler) {
            Ok(w) => {
                log::debug!("Settings watcher: using native backend");
                Box::new(w)
            }
            Err(e) => {
                log::warn!(
                    "Settings watcher: native backend unavailable ({}); falling back to PollWatcher",
                    e
                );
                let fallback = make_event_handler(
                    filename,
                    canonical.clone(),
                    debounce_delay,
                    tx,
                    last_event_time,
                );
                let poll_config =
                    NotifyConfig::default().with_poll_interval(Duration::from_millis(500));
                Box::new(
                    PollWatcher::new(fallback, poll_config)
                        .context("Failed to create settings poll watcher")?,
                )
            }
        };

        // Watch the directory: atomic saves replace the file inode.
        watcher
            .watch(&parent_dir, RecursiveMode::NonRecursive)
            .with_context(|| {
                format!(
                    "Failed to watch settings directory: {}",
                    parent_dir.display()
                )
            })?;

        log::info!("Settings hot reload: watching {}", canonical.display());

        Ok(Self {
            _watcher: Mutex::new(watcher),
            path: canonical,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_watcher_requires_existing_file() {
        let dir = TempDir::new().unwrap();
        let (tx, _rx) = broadcast::channel(4);
        let result = SettingsWatcher::new(&dir.path().join("missing.yaml"), 100, tx);
        assert!(result.is_err());
    }

    #[test]
    fn test_watcher_starts_on_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "{}\n").unwrap();

        let (tx, _rx) = broadcast::channel(4);
        let watcher = SettingsWatcher::new(&path, 100, tx).unwrap();
        assert_eq!(watcher.path().file_name(), path.file_name());
    }

    #[test]
    fn test_handler_debounces_and_filters() {
        let (tx, mut rx) = broadcast::channel(8);
        let handler = make_event_handler(
            "settings.yaml".into(),
            PathBuf::from("/cfg/settings.yaml"),
            Duration::from_secs(60),
            tx,
            Arc::new(Mutex::new(None)),
        );

        let modify = |name: &str| {
            Ok(Event::new(notify::EventKind::Modify(notify::event::ModifyKind::Any))
                .add_path(PathBuf::from("/cfg").join(name)))
        };

        handler(modify("other.yaml"));
        assert!(rx.try_recv().is_err());

        handler(modify("settings.yaml"));
        assert_eq!(
            rx.try_recv().unwrap(),
            SettingsChange::FileModified(PathBuf::from("/cfg/settings.yaml"))
        );

        // Second event inside the debounce window is swallowed
        handler(modify("settings.yaml"));
        assert!(rx.try_recv().is_err());
    }
}
