//! Tracked-channel state and the channel-change reconciliation.
//!
//! Groups the single piece of per-page-load state the colorizer keeps: the
//! channel it last evaluated. On a channel change every element still marked
//! for another channel is stripped before the new channel is evaluated, so the
//! old tint is never visible while the new decision is pending.

use parking_lot::Mutex;

use crate::decorator::{CHANNEL_ATTR, Decorator, MARKED_SELECTOR};
use crate::page::{ElementId, HostPage, PageError};
use crate::resolver::ChannelId;

#[derive(Debug, Default)]
pub struct ColorizationTracker {
    /// Channel of the most recent pass; `None` until something resolves.
    tracked: Mutex<Option<ChannelId>>,
}

impl ColorizationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracked(&self) -> Option<ChannelId> {
        self.tracked.lock().clone()
    }

    /// Strip marks owned by other channels if the channel changed, then track `current`.
    ///
    /// Returns the elements that were stripped. The tracked channel is updated
    /// even when `current` is `None`, and even when stripping fails part way.
    pub fn reconcile(
        &self,
        page: &dyn HostPage,
        current: Option<&ChannelId>,
    ) -> Result<Vec<ElementId>, PageError> {
        let mut tracked = self.tracked.lock();
        let previous = std::mem::replace(&mut *tracked, current.cloned());
        drop(tracked);

        let Some(previous) = previous else {
            return Ok(Vec::new());
        };
        if Some(&previous) == current {
            return Ok(Vec::new());
        }

        debug_info!(
            "TRACKER",
            "Channel changed: {} -> {}",
            previous,
            current.map(ChannelId::as_str).unwrap_or("<none>")
        );

        let mut stripped = Vec::new();
        for element in page.query_selector_all(MARKED_SELECTOR)? {
            let owner = page.attribute(element, CHANNEL_ATTR)?;
            if owner.as_deref() != current.map(ChannelId::as_str) {
                Decorator::strip(page, element)?;
                stripped.push(element);
            }
        }
        if !stripped.is_empty() {
            debug_log!("TRACKER", "Removed decoration of '{}' from {:?}", previous, stripped);
        }
        Ok(stripped)
    }

    /// Forget the tracked channel, as a fresh page load would.
    pub fn reset(&self) {
        *self.tracked.lock() = None;
    }
}
