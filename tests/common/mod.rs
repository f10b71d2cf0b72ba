//! Shared integration test helpers for channel-tint.
//!
//! ```ignore
//! mod common;
//! use common::{chat_page, ScriptedStore};
//! ```
//!
//! The `#[allow(dead_code)]` below suppresses warnings when a test file only
//! uses a subset of the helpers.

#![allow(dead_code)]

use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use channel_tint::decorator::{BACKGROUND_PROPERTY, MARKED_SELECTOR};
use channel_tint::page::{ElementId, ElementSpec, HostPage, MemoryPage};
use channel_tint::{Colorizer, Config, Settings};
use channel_tint_config::{SettingsChange, SettingsError, SettingsStore};

pub const SURFACE_SELECTOR: &str = ".p-message_pane_input";

/// A page shaped like the chat client: a sidebar with two channel items and
/// the composition surface.
pub fn chat_page(address: &str) -> MemoryPage {
    let page = MemoryPage::new(address);
    populate(&page);
    page
}

/// Same as [`chat_page`], but the host offers a navigation feed.
pub fn chat_page_with_feed(address: &str) -> MemoryPage {
    let page = MemoryPage::new(address).with_navigation_feed();
    populate(&page);
    page
}

fn populate(page: &MemoryPage) {
    page.append(
        page.root(),
        ElementSpec::new("nav")
            .class("p-channel_sidebar")
            .child(
                ElementSpec::new("div")
                    .class("p-channel_sidebar__channel")
                    .attr("data-qa-channel-sidebar-channel-id", "C100")
                    .child(ElementSpec::new("span").class("p-channel_sidebar__name").text("general")),
            )
            .child(
                ElementSpec::new("div")
                    .class("p-channel_sidebar__channel")
                    .attr("data-qa-channel-sidebar-channel-id", "C200")
                    .child(ElementSpec::new("span").class("p-channel_sidebar__name").text("design")),
            ),
    )
    .expect("append sidebar");
    page.append(page.root(), ElementSpec::new("button").class("c-button").text("Compose"))
        .expect("append button");
    page.append(page.root(), ElementSpec::new("div").class("p-message_pane_input"))
        .expect("append surface");
}

pub fn surface(page: &MemoryPage) -> ElementId {
    page.query_selector(SURFACE_SELECTOR)
        .expect("query surface")
        .expect("surface present")
}

/// Background override on the surface, if any.
pub fn surface_background(page: &MemoryPage) -> Option<String> {
    page.style(surface(page), BACKGROUND_PROPERTY).map(|(v, _)| v)
}

pub fn marked_elements(page: &MemoryPage) -> Vec<ElementId> {
    page.query_selector_all(MARKED_SELECTOR).expect("query marks")
}

pub fn colorizer<S: SettingsStore>(page: MemoryPage, store: S) -> Arc<Colorizer<MemoryPage, S>> {
    Arc::new(
        Colorizer::from_config(&Config::default(), Arc::new(page), Arc::new(store))
            .expect("default config builds"),
    )
}

/// Settings store whose reads take scripted amounts of time.
///
/// Each `get` snapshots the current settings when it is called and completes
/// after the next scripted delay (zero once the script runs out), so reads
/// issued in one order can complete in another.
#[derive(Debug)]
pub struct ScriptedStore {
    settings: RwLock<Settings>,
    delays: Mutex<VecDeque<Duration>>,
    fail_next: Mutex<Option<String>>,
    changes: broadcast::Sender<SettingsChange>,
}

impl ScriptedStore {
    pub fn new(settings: Settings, delays_ms: &[u64]) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            settings: RwLock::new(settings),
            delays: Mutex::new(delays_ms.iter().map(|ms| Duration::from_millis(*ms)).collect()),
            fail_next: Mutex::new(None),
            changes,
        }
    }

    /// Replace the settings without announcing it.
    pub fn set(&self, settings: Settings) {
        *self.settings.write() = settings;
    }

    /// Replace the settings and announce the change.
    pub fn replace(&self, settings: Settings) {
        self.set(settings);
        let _ = self.changes.send(SettingsChange::Replaced);
    }

    pub fn fail_next_read(&self, reason: &str) {
        *self.fail_next.lock() = Some(reason.to_string());
    }
}

impl SettingsStore for ScriptedStore {
    fn get(&self) -> impl Future<Output = Result<Settings, SettingsError>> + Send {
        let settings = self.settings.read().clone();
        let delay = self.delays.lock().pop_front().unwrap_or_default();
        let failure = self.fail_next.lock().take();
        async move {
            tokio::time::sleep(delay).await;
            match failure {
                Some(reason) => Err(SettingsError::Unavailable(reason)),
                None => Ok(settings),
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingsChange> {
        self.changes.subscribe()
    }
}
