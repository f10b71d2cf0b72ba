//! Applies and removes the tint on the message-composition surface.
//!
//! A decoration mark is a `!important` background color plus
//! `data-colorized="true"`, `data-channel-id=<channel>` and, for dark tints,
//! the `dark-theme` class so the host's text stays readable.

use channel_tint_config::HexColor;

use crate::page::{ElementId, HostPage, PageError, StylePriority};
use crate::resolver::ChannelId;

pub const BACKGROUND_PROPERTY: &str = "background-color";
pub const COLORIZED_ATTR: &str = "data-colorized";
pub const CHANNEL_ATTR: &str = "data-channel-id";
pub const DARK_THEME_CLASS: &str = "dark-theme";
/// Every element currently carrying an active mark.
pub const MARKED_SELECTOR: &str = r#"[data-colorized="true"]"#;

/// Light/dark classification of a tint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeClass {
    Light,
    Dark,
}

impl ThemeClass {
    pub fn for_color(color: HexColor) -> Self {
        if color.is_dark() {
            ThemeClass::Dark
        } else {
            ThemeClass::Light
        }
    }
}

impl std::fmt::Display for ThemeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThemeClass::Light => f.write_str("light"),
            ThemeClass::Dark => f.write_str("dark"),
        }
    }
}

/// Decoration state read back from an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecorationMark {
    pub colorized: bool,
    pub owner: Option<ChannelId>,
    pub theme: ThemeClass,
}

#[derive(Debug, Clone)]
pub struct Decorator {
    surface_selector: String,
}

impl Decorator {
    pub fn new(surface_selector: impl Into<String>) -> Self {
        Self {
            surface_selector: surface_selector.into(),
        }
    }

    pub fn surface_selector(&self) -> &str {
        &self.surface_selector
    }

    /// The composition surface, if the host has rendered it.
    pub fn surface(&self, page: &dyn HostPage) -> Result<Option<ElementId>, PageError> {
        page.query_selector(&self.surface_selector)
    }

    /// Tint the surface for `channel`. Returns the decorated element, or
    /// `None` (and changes nothing) when the surface is not on the page.
    pub fn apply(
        &self,
        page: &dyn HostPage,
        channel: &ChannelId,
        color: HexColor,
    ) -> Result<Option<ElementId>, PageError> {
        let Some(surface) = self.surface(page)? else {
            debug_log!("DECORATOR", "Surface {} not rendered yet", self.surface_selector);
            return Ok(None);
        };

        // At most one live mark: a re-rendered surface leaves its old element marked
        for stale in page.query_selector_all(MARKED_SELECTOR)? {
            if stale != surface {
                debug_log!("DECORATOR", "Stripping stale mark from {}", stale);
                Self::strip(page, stale)?;
            }
        }

        page.set_style_property(
            surface,
            BACKGROUND_PROPERTY,
            &color.to_string(),
            StylePriority::Important,
        )?;
        page.set_attribute(surface, COLORIZED_ATTR, "true")?;
        page.set_attribute(surface, CHANNEL_ATTR, channel.as_str())?;
        match ThemeClass::for_color(color) {
            ThemeClass::Dark => page.add_class(surface, DARK_THEME_CLASS)?,
            ThemeClass::Light => page.remove_class(surface, DARK_THEME_CLASS)?,
        }

        debug_info!("DECORATOR", "Applied {} to {} for '{}'", color, surface, channel);
        Ok(Some(surface))
    }

    /// Remove our tint from the surface. `None` when the surface is not on the page.
    ///
    /// A surface without an active mark is left alone, including any
    /// background the host set on it.
    pub fn clear(&self, page: &dyn HostPage) -> Result<Option<ElementId>, PageError> {
        let Some(surface) = self.surface(page)? else {
            return Ok(None);
        };
        if Self::mark(page, surface)?.colorized {
            debug_log!("DECORATOR", "Clearing tint from {}", surface);
            Self::strip(page, surface)?;
        }
        Ok(Some(surface))
    }

    /// Remove the style override and every marker from `element`.
    pub fn strip(page: &dyn HostPage, element: ElementId) -> Result<(), PageError> {
        page.remove_style_property(element, BACKGROUND_PROPERTY)?;
        page.remove_attribute(element, COLORIZED_ATTR)?;
        page.remove_attribute(element, CHANNEL_ATTR)?;
        page.remove_class(element, DARK_THEME_CLASS)?;
        Ok(())
    }

    /// Read the decoration state of `element`.
    pub fn mark(page: &dyn HostPage, element: ElementId) -> Result<DecorationMark, PageError> {
        let colorized = page.attribute(element, COLORIZED_ATTR)?.as_deref() == Some("true");
        let owner = page
            .attribute(element, CHANNEL_ATTR)?
            .and_then(ChannelId::new);
        let theme = if page.has_class(element, DARK_THEME_CLASS)? {
            ThemeClass::Dark
        } else {
            ThemeClass::Light
        };
        Ok(DecorationMark {
            colorized,
            owner,
            theme,
        })
    }
}
