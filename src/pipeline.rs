//! The re-evaluation pass: resolve, reconcile, decide, apply.
//!
//! Every trigger funnels into [`Colorizer::run_pass`]. A pass never fails
//! outward; what happened is reported as a [`PassOutcome`] so callers (and
//! tests) can tell a detection miss from a missing surface from a host fault.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use channel_tint_config::{Config, HexColor, SettingsError, SettingsStore};
use thiserror::Error;

use crate::decorator::{Decorator, ThemeClass};
use crate::page::{HostPage, PageError};
use crate::policy::{ClearReason, ColorPolicy, Decision};
use crate::resolver::{ChannelId, ChannelResolver, ResolveFault};
use crate::tracker::ColorizationTracker;

/// What caused a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Initial page load.
    Load,
    /// The navigation address changed and settled.
    Navigation,
    /// A channel-list item was clicked.
    ChannelClick,
    /// The settings store announced a change.
    SettingsChanged,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Trigger::Load => "load",
            Trigger::Navigation => "navigation",
            Trigger::ChannelClick => "channel-click",
            Trigger::SettingsChanged => "settings-changed",
        };
        f.write_str(name)
    }
}

/// Unexpected failure that aborted a pass.
#[derive(Debug, Error)]
pub enum PassError {
    #[error("page update failed: {0}")]
    Page(#[from] PageError),

    #[error("settings read failed: {0}")]
    Settings(#[from] SettingsError),
}

/// Result of one pass.
#[derive(Debug)]
pub enum PassOutcome {
    /// The surface carries the tint for `channel`.
    Decorated {
        channel: ChannelId,
        color: HexColor,
        theme: ThemeClass,
    },
    /// `channel` is excluded; the surface has no tint.
    Cleared { channel: ChannelId },
    /// No channel could be detected; any tint was removed. `fault` is set when
    /// a strategy failed rather than found nothing.
    Unresolved { fault: Option<ResolveFault> },
    /// The surface is not on the page; nothing was changed.
    SurfaceAbsent { channel: ChannelId },
    /// A newer pass started while this one read settings; its result was dropped.
    Superseded { pass: u64 },
    /// The pass was aborted.
    Fault(PassError),
}

impl PassOutcome {
    pub fn channel(&self) -> Option<&ChannelId> {
        match self {
            PassOutcome::Decorated { channel, .. }
            | PassOutcome::Cleared { channel }
            | PassOutcome::SurfaceAbsent { channel } => Some(channel),
            _ => None,
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, PassOutcome::Fault(_))
    }
}

impl fmt::Display for PassOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassOutcome::Decorated {
                channel,
                color,
                theme,
            } => write!(f, "decorated '{channel}' with {color} ({theme})"),
            PassOutcome::Cleared { channel } => write!(f, "cleared '{channel}' (excluded)"),
            PassOutcome::Unresolved { fault: None } => f.write_str("no channel detected"),
            PassOutcome::Unresolved { fault: Some(fault) } => {
                write!(f, "no channel detected ({fault})")
            }
            PassOutcome::SurfaceAbsent { channel } => {
                write!(f, "surface absent for '{channel}'")
            }
            PassOutcome::Superseded { pass } => write!(f, "pass {pass} superseded"),
            PassOutcome::Fault(e) => write!(f, "fault: {e}"),
        }
    }
}

/// Owns the pipeline components and the tracked channel for one page.
pub struct Colorizer<P, S> {
    page: Arc<P>,
    settings: Arc<S>,
    resolver: ChannelResolver,
    tracker: ColorizationTracker,
    policy: ColorPolicy,
    decorator: Decorator,
    /// Number of the most recently started pass.
    latest_pass: AtomicU64,
    discard_stale_reads: bool,
}

impl<P, S> fmt::Debug for Colorizer<P, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Colorizer")
            .field("resolver", &self.resolver)
            .field("tracker", &self.tracker)
            .field("decorator", &self.decorator)
            .field("latest_pass", &self.latest_pass)
            .field("discard_stale_reads", &self.discard_stale_reads)
            .finish_non_exhaustive()
    }
}

impl<P, S> Colorizer<P, S>
where
    P: HostPage,
    S: SettingsStore,
{
    pub fn new(
        page: Arc<P>,
        settings: Arc<S>,
        resolver: ChannelResolver,
        decorator: Decorator,
    ) -> Self {
        Self {
            page,
            settings,
            resolver,
            tracker: ColorizationTracker::new(),
            policy: ColorPolicy,
            decorator,
            latest_pass: AtomicU64::new(0),
            discard_stale_reads: true,
        }
    }

    /// Build the pipeline from configured selectors and address pattern.
    pub fn from_config(
        config: &Config,
        page: Arc<P>,
        settings: Arc<S>,
    ) -> Result<Self, regex::Error> {
        let resolver = ChannelResolver::from_config(config)?;
        let decorator = Decorator::new(config.surface_selector.clone());
        Ok(Self::new(page, settings, resolver, decorator)
            .with_stale_read_discard(config.discard_stale_reads))
    }

    /// Whether a pass drops its settings read once a newer pass has started.
    pub fn with_stale_read_discard(mut self, enabled: bool) -> Self {
        self.discard_stale_reads = enabled;
        self
    }

    pub fn with_resolver(mut self, resolver: ChannelResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn page(&self) -> &Arc<P> {
        &self.page
    }

    pub fn settings(&self) -> &Arc<S> {
        &self.settings
    }

    pub fn resolver(&self) -> &ChannelResolver {
        &self.resolver
    }

    pub fn tracker(&self) -> &ColorizationTracker {
        &self.tracker
    }

    pub fn decorator(&self) -> &Decorator {
        &self.decorator
    }

    pub fn latest_pass(&self) -> u64 {
        self.latest_pass.load(Ordering::SeqCst)
    }

    /// Run one full pass. Faults are logged here and returned, never raised.
    pub async fn run_pass(&self, trigger: Trigger) -> PassOutcome {
        let pass = self.latest_pass.fetch_add(1, Ordering::SeqCst) + 1;
        debug_log!("PIPELINE", "Pass {} started by {}", pass, trigger);

        let outcome = self.evaluate(pass).await;
        match &outcome {
            PassOutcome::Fault(e) => {
                log::warn!("Pass {} ({}) aborted: {}", pass, trigger, e);
                debug_error!("PIPELINE", "Pass {} aborted: {}", pass, e);
            }
            PassOutcome::Superseded { .. } => {
                debug_info!("PIPELINE", "Pass {} dropped its settings read", pass);
            }
            other => {
                debug_info!("PIPELINE", "Pass {} ({}): {}", pass, trigger, other);
            }
        }
        outcome
    }

    async fn evaluate(&self, pass: u64) -> PassOutcome {
        let page: &P = &self.page;

        // A failing strategy counts as no channel; the page still gets reconciled
        let (channel, fault) = match self.resolver.try_resolve(page) {
            Ok(channel) => (channel, None),
            Err(fault) => {
                log::warn!("Channel detection failed: {}", fault);
                debug_error!("PIPELINE", "Pass {} detection fault: {}", pass, fault);
                (None, Some(fault))
            }
        };

        // Old marks go before anything else is decided
        if let Err(e) = self.tracker.reconcile(page, channel.as_ref()) {
            return PassOutcome::Fault(e.into());
        }

        let Some(channel) = channel else {
            return match self.decorator.clear(page) {
                Ok(_) => PassOutcome::Unresolved { fault },
                Err(e) => PassOutcome::Fault(e.into()),
            };
        };

        let settings = match self.settings.get().await {
            Ok(settings) => settings,
            Err(e) => return PassOutcome::Fault(e.into()),
        };

        if self.discard_stale_reads && self.latest_pass() != pass {
            return PassOutcome::Superseded { pass };
        }

        if let Some(ClearReason::Excluded(label)) =
            self.policy.explain(Some(&channel), &settings.channel_colors)
        {
            debug_trace!("PIPELINE", "'{}' excluded by '{}'", channel, label);
        }

        let applied = match self.policy.decide_with(Some(&channel), &settings) {
            Decision::Decorate(color) => self
                .decorator
                .apply(page, &channel, color)
                .map(|surface| (surface, Some(color))),
            Decision::Clear => self.decorator.clear(page).map(|surface| (surface, None)),
        };

        match applied {
            Ok((None, _)) => PassOutcome::SurfaceAbsent { channel },
            Ok((Some(_), Some(color))) => PassOutcome::Decorated {
                channel,
                color,
                theme: ThemeClass::for_color(color),
            },
            Ok((Some(_), None)) => PassOutcome::Cleared { channel },
            Err(e) => PassOutcome::Fault(e.into()),
        }
    }
}
