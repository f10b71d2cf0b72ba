// Library exports for testing and the replay binary
//
// # Lock Usage
//
// Pipeline state (the tracked channel, the in-memory page tree, settings
// snapshots) is guarded with `parking_lot` locks. They are never held across
// an `.await`; a pass only awaits the settings read, after every page lookup
// for that step has released its guard.

/// Application version (root crate version).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[macro_use]
pub mod debug;

pub mod cli;
pub mod decorator;
pub mod page;
pub mod pipeline;
pub mod policy;
pub mod resolver;
pub mod scenario;
pub mod tracker;
pub mod watcher;

pub use channel_tint_config::{
    Config, ExclusionMap, HexColor, MemorySettingsStore, Settings, SettingsStore,
};
pub use decorator::{DecorationMark, Decorator, ThemeClass};
pub use page::{ElementId, HostPage, MemoryPage, PageError};
pub use pipeline::{Colorizer, PassError, PassOutcome, Trigger};
pub use policy::{ColorPolicy, Decision};
pub use resolver::{ChannelId, ChannelResolver, ResolveStrategy};
pub use tracker::ColorizationTracker;
pub use watcher::{ChangeWatcher, PassReport, WatchOptions, WatcherHandle};
