//! Channel resolution: which channel is the page showing right now?
//!
//! The host application's markup is unreliable and changes constantly, so the
//! answer comes from an ordered list of strategies. The first strategy that
//! produces a non-empty label wins. Labels from different strategies live in
//! different namespaces (an address token vs. a display name) and are only
//! compared for equality with each other.

use regex::Regex;
use std::fmt;
use std::sync::Arc;

use crate::page::{HostPage, PageError};

/// Best-effort label of the displayed channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(String);

impl ChannelId {
    /// `None` for labels that are empty after trimming.
    pub fn new(label: impl AsRef<str>) -> Option<Self> {
        let trimmed = label.as_ref().trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One way of extracting a channel label from the current page state.
pub trait ResolveStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// `Ok(None)` when this strategy does not apply to the current page.
    fn attempt(&self, page: &dyn HostPage) -> Result<Option<ChannelId>, PageError>;
}

/// Channel token captured from the navigation address.
#[derive(Debug, Clone)]
pub struct AddressPattern {
    name: String,
    pattern: Regex,
}

impl AddressPattern {
    /// `pattern` must have a capture group; group 1 is the channel id.
    pub fn new(name: &str, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.to_string(),
            pattern: Regex::new(pattern)?,
        })
    }

    /// Final path segment of the address, used as the last resort.
    pub fn trailing_segment() -> Self {
        Self {
            name: "trailing-segment".to_string(),
            pattern: Regex::new(r"/([^/]+)$").expect("trailing segment pattern is valid"),
        }
    }

    fn extract(&self, address: &str) -> Option<ChannelId> {
        self.pattern
            .captures(address)
            .and_then(|caps| caps.get(1))
            .and_then(|m| ChannelId::new(m.as_str()))
    }
}

impl ResolveStrategy for AddressPattern {
    fn name(&self) -> &str {
        &self.name
    }

    fn attempt(&self, page: &dyn HostPage) -> Result<Option<ChannelId>, PageError> {
        Ok(self.extract(&page.location()?))
    }
}

/// Text of the first element found by an ordered list of page lookups.
#[derive(Debug, Clone)]
pub struct LabelLookup {
    selectors: Vec<String>,
}

impl LabelLookup {
    pub fn new(selectors: Vec<String>) -> Self {
        Self { selectors }
    }

    pub fn selectors(&self) -> &[String] {
        &self.selectors
    }
}

impl ResolveStrategy for LabelLookup {
    fn name(&self) -> &str {
        "label-lookup"
    }

    fn attempt(&self, page: &dyn HostPage) -> Result<Option<ChannelId>, PageError> {
        for selector in &self.selectors {
            let Some(element) = page.query_selector(selector)? else {
                debug_trace!("RESOLVER", "No element for {}", selector);
                continue;
            };
            let text = page.text_content(element)?;
            if text.is_empty() {
                continue;
            }
            // The first element with any text ends the lookup, even if it is only whitespace
            let id = ChannelId::new(&text);
            match &id {
                Some(id) => debug_trace!("RESOLVER", "Label '{}' from {}", id, selector),
                None => debug_trace!("RESOLVER", "Blank label from {}", selector),
            }
            return Ok(id);
        }
        Ok(None)
    }
}

/// Result of a resolution attempt that kept the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveFault {
    pub strategy: String,
    pub error: PageError,
}

impl fmt::Display for ResolveFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "strategy '{}' failed: {}", self.strategy, self.error)
    }
}

impl std::error::Error for ResolveFault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Ordered, replaceable list of resolution strategies.
#[derive(Clone)]
pub struct ChannelResolver {
    strategies: Vec<Arc<dyn ResolveStrategy>>,
}

impl fmt::Debug for ChannelResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.name()))
            .finish()
    }
}

impl ChannelResolver {
    pub fn new(strategies: Vec<Arc<dyn ResolveStrategy>>) -> Self {
        Self { strategies }
    }

    /// Address pattern, then label lookups, then (optionally) the trailing path segment.
    pub fn from_config(config: &channel_tint_config::Config) -> Result<Self, regex::Error> {
        let mut strategies: Vec<Arc<dyn ResolveStrategy>> = vec![
            Arc::new(AddressPattern::new("address-pattern", &config.address_pattern)?),
            Arc::new(LabelLookup::new(config.label_selectors.clone())),
        ];
        if config.trailing_segment_fallback {
            strategies.push(Arc::new(AddressPattern::trailing_segment()));
        }
        Ok(Self::new(strategies))
    }

    /// Add a strategy with the lowest priority.
    pub fn push(&mut self, strategy: Arc<dyn ResolveStrategy>) {
        self.strategies.push(strategy);
    }

    /// Add a strategy with the highest priority.
    pub fn prepend(&mut self, strategy: Arc<dyn ResolveStrategy>) {
        self.strategies.insert(0, strategy);
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// First label any strategy yields, keeping a host failure as an error.
    ///
    /// A failing strategy ends the attempt; later strategies are not consulted
    /// against a page that is misbehaving.
    pub fn try_resolve(&self, page: &dyn HostPage) -> Result<Option<ChannelId>, ResolveFault> {
        for strategy in &self.strategies {
            match strategy.attempt(page) {
                Ok(Some(id)) => {
                    debug_log!("RESOLVER", "Channel '{}' from {}", id, strategy.name());
                    return Ok(Some(id));
                }
                Ok(None) => {}
                Err(error) => {
                    return Err(ResolveFault {
                        strategy: strategy.name().to_string(),
                        error,
                    });
                }
            }
        }
        debug_log!("RESOLVER", "No channel detected");
        Ok(None)
    }

    /// First label any strategy yields. Never fails: host faults resolve to `None`.
    pub fn resolve(&self, page: &dyn HostPage) -> Option<ChannelId> {
        match self.try_resolve(page) {
            Ok(id) => id,
            Err(fault) => {
                log::warn!("Channel detection failed: {}", fault);
                debug_error!("RESOLVER", "{}", fault);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{ElementSpec, MemoryPage};
    use channel_tint_config::Config;

    fn resolver() -> ChannelResolver {
        ChannelResolver::from_config(&Config::default()).unwrap()
    }

    #[test]
    fn test_channel_id_trims_and_rejects_blank() {
        assert_eq!(ChannelId::new("  general \n").unwrap().as_str(), "general");
        assert!(ChannelId::new("   ").is_none());
        assert!(ChannelId::new("").is_none());
    }

    #[test]
    fn test_address_pattern_wins_over_page_labels() {
        let page = MemoryPage::new("https://app.slack.com/client/T123/C456ABC");
        page.append(
            page.root(),
            ElementSpec::new("span").attr("data-qa", "channel_name").text("general"),
        )
        .unwrap();
        assert_eq!(resolver().resolve(&page), ChannelId::new("C456ABC"));
    }

    #[test]
    fn test_address_pattern_requires_channel_shape() {
        // D-prefixed direct-message ids are not channel ids; trailing segment applies
        let page = MemoryPage::new("https://app.slack.com/client/T123/D999");
        assert_eq!(resolver().resolve(&page), ChannelId::new("D999"));
    }

    #[test]
    fn test_label_lookup_in_priority_order() {
        let page = MemoryPage::new("https://chat.example.com/");
        page.append(
            page.root(),
            ElementSpec::new("h1").class("p-view_header__channel_title").text("header-title"),
        )
        .unwrap();
        page.append(
            page.root(),
            ElementSpec::new("span").class("c-channel_name").text(" sidebar-name "),
        )
        .unwrap();
        // .c-channel_name is listed before the header title
        assert_eq!(resolver().resolve(&page), ChannelId::new("sidebar-name"));
    }

    #[test]
    fn test_whitespace_label_ends_lookup() {
        let page = MemoryPage::new("https://chat.example.com/archives/random");
        page.append(
            page.root(),
            ElementSpec::new("span").attr("data-qa", "channel_name").text("   "),
        )
        .unwrap();
        page.append(
            page.root(),
            ElementSpec::new("span").class("c-channel_name").text("design"),
        )
        .unwrap();

        let lookup = LabelLookup::new(Config::default().label_selectors);
        assert_eq!(lookup.attempt(&page).unwrap(), None);
        // Later page labels are not consulted; the trailing segment still is
        assert_eq!(resolver().resolve(&page), ChannelId::new("random"));
    }

    #[test]
    fn test_empty_label_element_is_skipped() {
        let page = MemoryPage::new("https://chat.example.com/");
        page.append(page.root(), ElementSpec::new("span").attr("data-qa", "channel_name"))
            .unwrap();
        page.append(
            page.root(),
            ElementSpec::new("span").class("c-channel_name").text("design"),
        )
        .unwrap();
        assert_eq!(resolver().resolve(&page), ChannelId::new("design"));
    }

    #[test]
    fn test_selected_sidebar_descendant_selector() {
        let page = MemoryPage::new("https://chat.example.com/");
        page.append(
            page.root(),
            ElementSpec::new("div")
                .class("p-channel_sidebar__channel--selected")
                .child(
                    ElementSpec::new("span")
                        .class("p-channel_sidebar__name")
                        .text("design"),
                ),
        )
        .unwrap();
        assert_eq!(resolver().resolve(&page), ChannelId::new("design"));
    }

    #[test]
    fn test_trailing_segment_fallback() {
        let page = MemoryPage::new("https://chat.example.com/archives/random");
        assert_eq!(resolver().resolve(&page), ChannelId::new("random"));

        let config = Config {
            trailing_segment_fallback: false,
            ..Config::default()
        };
        let strict = ChannelResolver::from_config(&config).unwrap();
        assert_eq!(strict.resolve(&page), None);
    }

    #[test]
    fn test_nothing_matches() {
        let page = MemoryPage::new("https://chat.example.com/");
        assert_eq!(resolver().resolve(&page), None);
    }

    #[test]
    fn test_host_fault_degrades_to_none() {
        let page = MemoryPage::new("https://app.slack.com/client/T1/C1");
        page.inject_fault(Some("page torn down"));

        let resolver = resolver();
        assert_eq!(resolver.resolve(&page), None);
        let fault = resolver.try_resolve(&page).unwrap_err();
        assert_eq!(fault.strategy, "address-pattern");
        assert_eq!(fault.error, PageError::Host("page torn down".to_string()));
    }

    struct Fixed(&'static str);

    impl ResolveStrategy for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn attempt(&self, _page: &dyn HostPage) -> Result<Option<ChannelId>, PageError> {
            Ok(ChannelId::new(self.0))
        }
    }

    #[test]
    fn test_strategies_are_replaceable() {
        let page = MemoryPage::new("https://app.slack.com/client/T1/C1");
        let mut resolver = resolver();
        resolver.prepend(Arc::new(Fixed("pinned")));
        assert_eq!(resolver.resolve(&page), ChannelId::new("pinned"));
        assert_eq!(resolver.strategy_names()[0], "fixed");

        let only_fixed = ChannelResolver::new(vec![Arc::new(Fixed("solo"))]);
        assert_eq!(only_fixed.resolve(&page), ChannelId::new("solo"));
    }
}
