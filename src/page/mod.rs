//! Host page abstraction.
//!
//! The chat application's rendered page is an external collaborator. The
//! colorizer reads its navigation address and structure through `HostPage`
//! and writes only inline styles, attributes and classes on elements it has
//! found. `MemoryPage` is the in-process implementation used by tests and the
//! replay command.

pub mod memory;
pub mod selector;

use thiserror::Error;
use tokio::sync::{broadcast, watch};

pub use memory::{ElementSpec, MemoryPage};
pub use selector::Selector;

/// Opaque handle to an element of the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

impl ElementId {
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Priority of an inline style declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StylePriority {
    #[default]
    Normal,
    /// Wins over the host application's own stylesheets.
    Important,
}

/// Failures reported by the host page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// The element was removed from the page after it was looked up.
    #[error("element {0} is no longer attached to the page")]
    Detached(ElementId),

    #[error("host page fault: {0}")]
    Host(String),
}

/// Read and limited write access to the host application's page.
pub trait HostPage: Send + Sync {
    /// Current navigation address.
    fn location(&self) -> Result<String, PageError>;

    fn query_selector(&self, selector: &str) -> Result<Option<ElementId>, PageError>;

    fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementId>, PageError>;

    /// `element` itself or its nearest ancestor matching `selector`.
    fn closest(&self, element: ElementId, selector: &str) -> Result<Option<ElementId>, PageError>;

    /// Text of the element and all of its descendants, in document order.
    fn text_content(&self, element: ElementId) -> Result<String, PageError>;

    fn attribute(&self, element: ElementId, name: &str) -> Result<Option<String>, PageError>;

    fn set_attribute(&self, element: ElementId, name: &str, value: &str) -> Result<(), PageError>;

    fn remove_attribute(&self, element: ElementId, name: &str) -> Result<(), PageError>;

    fn has_class(&self, element: ElementId, class: &str) -> Result<bool, PageError>;

    fn add_class(&self, element: ElementId, class: &str) -> Result<(), PageError>;

    fn remove_class(&self, element: ElementId, class: &str) -> Result<(), PageError>;

    fn set_style_property(
        &self,
        element: ElementId,
        property: &str,
        value: &str,
        priority: StylePriority,
    ) -> Result<(), PageError>;

    fn remove_style_property(&self, element: ElementId, property: &str) -> Result<(), PageError>;

    /// Navigation address changes, when the host can report them.
    ///
    /// When this returns `None` the watcher falls back to polling `location`.
    fn navigation_feed(&self) -> Option<watch::Receiver<String>> {
        None
    }

    /// Elements the user activated (clicked), when the host can report them.
    fn activations(&self) -> Option<broadcast::Receiver<ElementId>> {
        None
    }
}
