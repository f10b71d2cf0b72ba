//! Scripted replays against an in-memory page.
//!
//! A scenario is a YAML document describing the initial page, the stored
//! settings and a list of host-side steps. `replay` runs it through the real
//! [`ChangeWatcher`] and reports every pass plus the final surface state.
//!
//! ```yaml
//! address: https://app.slack.com/client/T1/C1
//! settings:
//!   default_color: "#f2f2f2"
//!   channel_colors: { general: "#ffffff" }
//! page:
//!   - { tag: div, classes: [p-message_pane_input] }
//! steps:
//!   - navigate: https://app.slack.com/client/T1/C2
//!   - wait_ms: 1600
//! ```

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use channel_tint_config::{Config, MemorySettingsStore, Settings};
use tokio::sync::mpsc;

use crate::decorator::{BACKGROUND_PROPERTY, DecorationMark, Decorator};
use crate::page::{ElementId, ElementSpec, HostPage, MemoryPage};
use crate::pipeline::Colorizer;
use crate::watcher::{ChangeWatcher, PassReport, WatchOptions};

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Navigation address at load.
    pub address: String,
    /// Offer a navigation feed instead of requiring polling.
    #[serde(default)]
    pub navigation_feed: bool,
    #[serde(default)]
    pub settings: Settings,
    /// Top-level elements of the initial page.
    #[serde(default)]
    pub page: Vec<ElementSpec>,
    #[serde(default, with = "serde_yaml_ng::with::singleton_map_recursive")]
    pub steps: Vec<Step>,
}

/// One host-side action.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Navigate(String),
    /// Click the first element matching the selector.
    Click(String),
    SetText { selector: String, text: String },
    Remove(String),
    Append {
        #[serde(default)]
        parent: Option<String>,
        element: ElementSpec,
    },
    /// Replace the stored settings (announces a change).
    Settings(Settings),
    WaitMs(u64),
}

impl Scenario {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml_ng::Error> {
        serde_yaml_ng::from_str(yaml)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_yaml(&contents)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))
    }

    fn build_page(&self) -> Result<MemoryPage> {
        let mut page = MemoryPage::new(&self.address);
        if self.navigation_feed {
            page = page.with_navigation_feed();
        }
        for spec in &self.page {
            page.append(page.root(), spec.clone())?;
        }
        Ok(page)
    }
}

impl Step {
    async fn perform(&self, page: &MemoryPage, store: &MemorySettingsStore) -> Result<()> {
        match self {
            Step::Navigate(address) => page.navigate(address),
            Step::Click(selector) => page.click(find(page, selector)?)?,
            Step::SetText { selector, text } => page.set_text(find(page, selector)?, text)?,
            Step::Remove(selector) => page.remove(find(page, selector)?)?,
            Step::Append { parent, element } => {
                let parent = match parent {
                    Some(selector) => find(page, selector)?,
                    None => page.root(),
                };
                page.append(parent, element.clone())?;
            }
            Step::Settings(settings) => store.replace(settings.clone()),
            Step::WaitMs(ms) => tokio::time::sleep(Duration::from_millis(*ms)).await,
        }
        Ok(())
    }
}

fn find(page: &MemoryPage, selector: &str) -> Result<ElementId> {
    page.query_selector(selector)?
        .ok_or_else(|| anyhow!("No element matches '{}'", selector))
}

/// Composition surface as left by the last pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceState {
    pub element: ElementId,
    pub background: Option<String>,
    pub mark: DecorationMark,
}

#[derive(Debug)]
pub struct ReplayReport {
    pub passes: Vec<PassReport>,
    /// `None` when the page has no composition surface at the end.
    pub surface: Option<SurfaceState>,
}

/// Run `scenario` with the watcher configured by `config`.
///
/// After the last step the replay waits one poll interval plus both delays so
/// that passes triggered by the final steps land before the report is taken.
pub async fn replay(scenario: &Scenario, config: &Config) -> Result<ReplayReport> {
    let page = Arc::new(scenario.build_page()?);
    let store = Arc::new(MemorySettingsStore::new(scenario.settings.clone()));
    let colorizer = Arc::new(
        Colorizer::from_config(config, Arc::clone(&page), Arc::clone(&store))
            .context("Invalid address pattern")?,
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut handle = ChangeWatcher::new(Arc::clone(&colorizer), WatchOptions::from_config(config))
        .with_reports(tx)
        .spawn();

    for (index, step) in scenario.steps.iter().enumerate() {
        log::debug!("Replay step {}: {:?}", index + 1, step);
        step.perform(&page, &store)
            .await
            .with_context(|| format!("Step {} failed", index + 1))?;
    }
    tokio::time::sleep(config.poll_interval() + config.settle_delay() + config.click_delay()).await;
    handle.shutdown();

    let mut passes = Vec::new();
    while let Ok(report) = rx.try_recv() {
        passes.push(report);
    }

    let surface = match colorizer.decorator().surface(page.as_ref())? {
        Some(element) => Some(SurfaceState {
            element,
            background: page.style(element, BACKGROUND_PROPERTY).map(|(value, _)| value),
            mark: Decorator::mark(page.as_ref(), element)?,
        }),
        None => None,
    };

    Ok(ReplayReport { passes, surface })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{PassOutcome, Trigger};

    const SWITCH: &str = r##"
address: https://app.slack.com/client/T1/C100
settings:
  defaultColor: "#000000"
  channelColors:
    C200: "#ffffff"
page:
  - tag: div
    classes: [p-message_pane_input]
steps:
  - wait_ms: 100
  - navigate: https://app.slack.com/client/T1/C200
"##;

    #[test]
    fn test_parse_steps() {
        let scenario = Scenario::from_yaml(SWITCH).unwrap();
        assert_eq!(scenario.page.len(), 1);
        assert!(matches!(scenario.steps[0], Step::WaitMs(100)));
        assert!(matches!(&scenario.steps[1], Step::Navigate(a) if a.ends_with("C200")));
        assert!(scenario.settings.channel_colors.is_excluded("C200"));
    }

    #[test]
    fn test_parse_structured_steps() {
        let yaml = r#"
address: about:blank
steps:
  - set_text: { selector: ".title", text: "random" }
  - append: { element: { tag: span, classes: [c-channel_name], text: design } }
  - click: ".p-channel_sidebar__channel"
  - remove: ".p-message_pane_input"
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert_eq!(scenario.steps.len(), 4);
        assert!(matches!(&scenario.steps[1], Step::Append { parent: None, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_switch_to_excluded_channel() {
        let scenario = Scenario::from_yaml(SWITCH).unwrap();
        let report = replay(&scenario, &Config::default()).await.unwrap();

        let triggers: Vec<Trigger> = report.passes.iter().map(|p| p.trigger).collect();
        assert_eq!(triggers, vec![Trigger::Load, Trigger::Navigation]);
        assert!(matches!(report.passes[0].outcome, PassOutcome::Decorated { .. }));
        assert!(matches!(report.passes[1].outcome, PassOutcome::Cleared { .. }));

        let surface = report.surface.unwrap();
        assert_eq!(surface.background, None);
        assert!(!surface.mark.colorized);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_missing_element_fails_step() {
        let scenario = Scenario::from_yaml(
            "address: about:blank\nsteps:\n  - click: \".p-channel_sidebar__channel\"\n",
        )
        .unwrap();
        let err = replay(&scenario, &Config::default()).await.unwrap_err();
        assert!(format!("{err:#}").contains("Step 1 failed"));
    }
}
