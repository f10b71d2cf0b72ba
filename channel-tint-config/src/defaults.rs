//! Default value functions for configuration and settings.
//!
//! Used as `#[serde(default = "crate::defaults::...")]` attributes.

use crate::color::HexColor;

// ── Settings ───────────────────────────────────────────────────────────────

/// Tint used when the settings store has no default color.
pub fn default_color() -> HexColor {
    HexColor::new(0xf2, 0xf2, 0xf2)
}

// ── Trigger timings ────────────────────────────────────────────────────────

pub fn poll_interval_ms() -> u64 {
    1000
}

pub fn settle_delay_ms() -> u64 {
    500
}

pub fn click_delay_ms() -> u64 {
    300
}

pub fn settings_debounce_ms() -> u64 {
    100
}

// ── Host page contract ─────────────────────────────────────────────────────

pub fn address_pattern() -> String {
    r"app\.slack\.com/client/[^/]+/(C[A-Z0-9]+)".to_string()
}

pub fn label_selectors() -> Vec<String> {
    [
        r#"[data-qa="channel_name"]"#,
        ".p-channel_sidebar__channel--selected .p-channel_sidebar__name",
        ".p-ia__nav__user__title",
        ".c-channel_name",
        ".p-view_header__channel_title",
        ".c-breadcrumbs__item span",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

pub fn surface_selector() -> String {
    ".p-message_pane_input".to_string()
}

pub fn channel_item_selectors() -> Vec<String> {
    vec![".p-channel_sidebar__channel".to_string(), ".c-link".to_string()]
}

pub fn bool_true() -> bool {
    true
}
