//! Trigger layer: decides when a pass runs.
//!
//! Four sources feed [`Colorizer::run_pass`]:
//! - the initial load (immediately),
//! - navigation changes, either observed through the host's feed or sampled by
//!   a polling loop, re-evaluated after the settle delay,
//! - clicks on channel-list items, re-evaluated after the click delay,
//! - settings-change notifications (immediately).
//!
//! Every scheduled pass runs as its own task. Passes are not coalesced: two
//! triggers inside the same delay window each run the full pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use channel_tint_config::{Config, SettingsStore};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::page::{ElementId, HostPage};
use crate::pipeline::{Colorizer, PassOutcome, Trigger};

/// A finished pass, as reported to an optional listener.
#[derive(Debug)]
pub struct PassReport {
    pub trigger: Trigger,
    pub outcome: PassOutcome,
}

/// Watcher timings and the selectors that mark a channel-list item.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub poll_interval: Duration,
    pub settle_delay: Duration,
    pub click_delay: Duration,
    pub channel_item_selectors: Vec<String>,
}

impl WatchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            settle_delay: config.settle_delay(),
            click_delay: config.click_delay(),
            channel_item_selectors: config.channel_item_selectors.clone(),
        }
    }
}

/// Runs scheduled passes; cloned into every watcher task.
struct Scheduler<P, S> {
    colorizer: Arc<Colorizer<P, S>>,
    reports: Option<mpsc::UnboundedSender<PassReport>>,
    stopped: Arc<AtomicBool>,
}

impl<P, S> Clone for Scheduler<P, S> {
    fn clone(&self) -> Self {
        Self {
            colorizer: Arc::clone(&self.colorizer),
            reports: self.reports.clone(),
            stopped: Arc::clone(&self.stopped),
        }
    }
}

impl<P, S> Scheduler<P, S>
where
    P: HostPage + 'static,
    S: SettingsStore + 'static,
{
    /// Run a pass after `delay`. Nothing cancels it except watcher shutdown.
    fn schedule(&self, trigger: Trigger, delay: Duration) {
        let this = self.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if this.stopped.load(Ordering::SeqCst) {
                return;
            }
            let outcome = this.colorizer.run_pass(trigger).await;
            if let Some(reports) = &this.reports {
                // A dropped listener only loses reports
                let _ = reports.send(PassReport { trigger, outcome });
            }
        });
    }
}

/// Wires a [`Colorizer`] to its trigger sources.
pub struct ChangeWatcher<P, S> {
    colorizer: Arc<Colorizer<P, S>>,
    options: WatchOptions,
    reports: Option<mpsc::UnboundedSender<PassReport>>,
}

impl<P, S> std::fmt::Debug for ChangeWatcher<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeWatcher")
            .field("options", &self.options)
            .field("reports", &self.reports.is_some())
            .finish_non_exhaustive()
    }
}

impl<P, S> ChangeWatcher<P, S>
where
    P: HostPage + 'static,
    S: SettingsStore + 'static,
{
    pub fn new(colorizer: Arc<Colorizer<P, S>>, options: WatchOptions) -> Self {
        Self {
            colorizer,
            options,
            reports: None,
        }
    }

    /// Send every finished pass to `reports`.
    pub fn with_reports(mut self, reports: mpsc::UnboundedSender<PassReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Start watching. Must be called from within a current-thread tokio
    /// runtime (or a `LocalSet`): passes rely on running one at a time, with no
    /// other pass between their staleness check and their page update.
    ///
    /// Subscriptions are taken before this returns, so host events raised
    /// right after `spawn` are not missed. The initial load pass is scheduled
    /// immediately.
    pub fn spawn(self) -> WatcherHandle {
        let scheduler = Scheduler {
            colorizer: Arc::clone(&self.colorizer),
            reports: self.reports,
            stopped: Arc::new(AtomicBool::new(false)),
        };
        let page = Arc::clone(self.colorizer.page());
        let options = self.options;
        let mut tasks = Vec::new();

        scheduler.schedule(Trigger::Load, Duration::ZERO);

        match page.navigation_feed() {
            Some(mut feed) => {
                debug_info!("WATCHER", "Observing navigation feed");
                let last = feed.borrow_and_update().clone();
                tasks.push(tokio::spawn(observe_navigation(
                    feed,
                    last,
                    options.settle_delay,
                    scheduler.clone(),
                )));
            }
            None => {
                debug_info!(
                    "WATCHER",
                    "Polling navigation every {:?}",
                    options.poll_interval
                );
                let last = page.location().ok();
                tasks.push(tokio::spawn(poll_navigation(
                    Arc::clone(&page),
                    last,
                    options.poll_interval,
                    options.settle_delay,
                    scheduler.clone(),
                )));
            }
        }

        if let Some(activations) = page.activations() {
            tasks.push(tokio::spawn(watch_clicks(
                Arc::clone(&page),
                activations,
                options.channel_item_selectors.clone(),
                options.click_delay,
                scheduler.clone(),
            )));
        } else {
            debug_info!("WATCHER", "Host reports no clicks; click hints disabled");
        }

        let changes = self.colorizer.settings().subscribe();
        tasks.push(tokio::spawn(watch_settings(changes, scheduler.clone())));

        log::info!("Change watcher started with {} tasks", tasks.len());
        WatcherHandle {
            tasks,
            stopped: scheduler.stopped,
        }
    }
}

async fn poll_navigation<P, S>(
    page: Arc<P>,
    mut last: Option<String>,
    poll_interval: Duration,
    settle_delay: Duration,
    scheduler: Scheduler<P, S>,
) where
    P: HostPage + 'static,
    S: SettingsStore + 'static,
{
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let current = match page.location() {
            Ok(address) => address,
            Err(e) => {
                debug_error!("WATCHER", "Could not sample address: {}", e);
                continue;
            }
        };
        if last.as_deref() != Some(current.as_str()) {
            debug_info!("WATCHER", "Address changed: {:?} -> {}", last, current);
            last = Some(current);
            scheduler.schedule(Trigger::Navigation, settle_delay);
        }
    }
}

async fn observe_navigation<P, S>(
    mut feed: watch::Receiver<String>,
    mut last: String,
    settle_delay: Duration,
    scheduler: Scheduler<P, S>,
) where
    P: HostPage + 'static,
    S: SettingsStore + 'static,
{
    while feed.changed().await.is_ok() {
        let current = feed.borrow_and_update().clone();
        if current != last {
            debug_info!("WATCHER", "Address changed: {} -> {}", last, current);
            last = current;
            scheduler.schedule(Trigger::Navigation, settle_delay);
        }
    }
    debug_info!("WATCHER", "Navigation feed closed");
}

async fn watch_clicks<P, S>(
    page: Arc<P>,
    mut activations: broadcast::Receiver<ElementId>,
    item_selectors: Vec<String>,
    click_delay: Duration,
    scheduler: Scheduler<P, S>,
) where
    P: HostPage + 'static,
    S: SettingsStore + 'static,
{
    loop {
        match activations.recv().await {
            Ok(element) => {
                if is_channel_item(page.as_ref(), element, &item_selectors) {
                    debug_log!("WATCHER", "Channel item {} clicked", element);
                    scheduler.schedule(Trigger::ChannelClick, click_delay);
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                // Some clicks were lost; one pass covers them all
                debug_log!("WATCHER", "Missed {} click events", missed);
                scheduler.schedule(Trigger::ChannelClick, click_delay);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn watch_settings<P, S>(
    mut changes: broadcast::Receiver<channel_tint_config::SettingsChange>,
    scheduler: Scheduler<P, S>,
) where
    P: HostPage + 'static,
    S: SettingsStore + 'static,
{
    loop {
        match changes.recv().await {
            Ok(change) => {
                debug_info!("WATCHER", "Settings changed: {:?}", change);
                scheduler.schedule(Trigger::SettingsChanged, Duration::ZERO);
            }
            Err(broadcast::error::RecvError::Lagged(_)) => {
                scheduler.schedule(Trigger::SettingsChanged, Duration::ZERO);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Whether the click on `element` landed inside a channel-list item.
fn is_channel_item(page: &dyn HostPage, element: ElementId, selectors: &[String]) -> bool {
    selectors.iter().any(|selector| match page.closest(element, selector) {
        Ok(found) => found.is_some(),
        Err(e) => {
            debug_trace!("WATCHER", "closest({}, {}) failed: {}", element, selector, e);
            false
        }
    })
}

/// Running watcher. Dropping it stops every loop and any pass still waiting out its delay.
#[derive(Debug)]
pub struct WatcherHandle {
    tasks: Vec<JoinHandle<()>>,
    stopped: Arc<AtomicBool>,
}

impl WatcherHandle {
    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }

    pub fn shutdown(&mut self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        log::info!("Change watcher stopped");
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
