//! In-memory host page.
//!
//! An arena of element nodes under a single document root. Used by the
//! integration tests and by `channel-tint replay` to drive the real pipeline
//! without a browser.

use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use std::collections::BTreeMap;
use tokio::sync::{broadcast, watch};

use super::selector::{ElementView, Selector};
use super::{ElementId, HostPage, PageError, StylePriority};

const ACTIVATION_CHANNEL_CAPACITY: usize = 64;

/// Declarative description of an element subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ElementSpec {
    pub tag: String,
    pub classes: Vec<String>,
    pub attrs: BTreeMap<String, String>,
    pub text: String,
    pub children: Vec<ElementSpec>,
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    classes: Vec<String>,
    attrs: BTreeMap<String, String>,
    styles: BTreeMap<String, (String, StylePriority)>,
    text: String,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    attached: bool,
}

impl Node {
    fn from_spec(spec: &ElementSpec, parent: Option<ElementId>) -> Self {
        Self {
            tag: if spec.tag.is_empty() {
                "div".to_string()
            } else {
                spec.tag.to_ascii_lowercase()
            },
            classes: spec.classes.clone(),
            attrs: spec.attrs.clone(),
            styles: BTreeMap::new(),
            text: spec.text.clone(),
            parent,
            children: Vec::new(),
            attached: true,
        }
    }
}

/// Arena of nodes indexed by `ElementId`. Removed nodes are only marked
/// detached and their slots are never reused, so ids stay unambiguous but the
/// arena grows with every append for the life of the page.
#[derive(Debug)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    const ROOT: ElementId = ElementId::new(0);

    fn new() -> Self {
        Self {
            nodes: vec![Node::from_spec(&ElementSpec::new("body"), None)],
        }
    }

    fn node(&self, element: ElementId) -> Result<&Node, PageError> {
        self.nodes
            .get(element.index())
            .filter(|n| n.attached)
            .ok_or(PageError::Detached(element))
    }

    fn node_mut(&mut self, element: ElementId) -> Result<&mut Node, PageError> {
        self.nodes
            .get_mut(element.index())
            .filter(|n| n.attached)
            .ok_or(PageError::Detached(element))
    }

    fn insert(&mut self, parent: ElementId, spec: &ElementSpec) -> ElementId {
        let id = ElementId::new(self.nodes.len());
        self.nodes.push(Node::from_spec(spec, Some(parent)));
        self.nodes[parent.index()].children.push(id);
        for child in &spec.children {
            self.insert(id, child);
        }
        id
    }

    /// Attached elements in document order, excluding the root.
    fn document_order(&self) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack: Vec<ElementId> = self.nodes[Self::ROOT.index()]
            .children
            .iter()
            .rev()
            .copied()
            .collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.index()];
            if !node.attached {
                continue;
            }
            out.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    fn collect_text(&self, element: ElementId, out: &mut String) {
        let node = &self.nodes[element.index()];
        out.push_str(&node.text);
        for child in &node.children {
            if self.nodes[child.index()].attached {
                self.collect_text(*child, out);
            }
        }
    }

    fn detach(&mut self, element: ElementId) {
        let children = std::mem::take(&mut self.nodes[element.index()].children);
        self.nodes[element.index()].attached = false;
        for child in &children {
            self.detach(*child);
        }
        self.nodes[element.index()].children = children;
    }
}

impl ElementView for Tree {
    fn tag(&self, element: ElementId) -> Option<&str> {
        self.nodes.get(element.index()).map(|n| n.tag.as_str())
    }

    fn has_class(&self, element: ElementId, class: &str) -> bool {
        self.nodes
            .get(element.index())
            .is_some_and(|n| n.classes.iter().any(|c| c == class))
    }

    fn attribute(&self, element: ElementId, name: &str) -> Option<&str> {
        self.nodes
            .get(element.index())
            .and_then(|n| n.attrs.get(name))
            .map(String::as_str)
    }

    fn parent(&self, element: ElementId) -> Option<ElementId> {
        self.nodes
            .get(element.index())
            .and_then(|n| n.parent)
            .filter(|p| *p != Tree::ROOT)
    }
}

/// A host page held entirely in memory.
pub struct MemoryPage {
    tree: RwLock<Tree>,
    location: watch::Sender<String>,
    feed_navigation: bool,
    activations: broadcast::Sender<ElementId>,
    fault: Mutex<Option<String>>,
}

impl std::fmt::Debug for MemoryPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPage")
            .field("location", &*self.location.borrow())
            .field("elements", &self.tree.read().nodes.len())
            .finish_non_exhaustive()
    }
}

impl MemoryPage {
    /// An empty page at `address`. Navigation is only observable by polling.
    pub fn new(address: &str) -> Self {
        let (location, _) = watch::channel(address.to_string());
        let (activations, _) = broadcast::channel(ACTIVATION_CHANNEL_CAPACITY);
        Self {
            tree: RwLock::new(Tree::new()),
            location,
            feed_navigation: false,
            activations,
            fault: Mutex::new(None),
        }
    }

    /// Also offer a navigation feed so watchers can observe instead of poll.
    pub fn with_navigation_feed(mut self) -> Self {
        self.feed_navigation = true;
        self
    }

    /// The document root; top-level elements are appended under it.
    pub fn root(&self) -> ElementId {
        Tree::ROOT
    }

    /// Append `spec` (and its children) under `parent`.
    pub fn append(&self, parent: ElementId, spec: ElementSpec) -> Result<ElementId, PageError> {
        let mut tree = self.tree.write();
        tree.node(parent)?;
        Ok(tree.insert(parent, &spec))
    }

    /// Host-side navigation: change the address.
    pub fn navigate(&self, address: &str) {
        self.location.send_replace(address.to_string());
    }

    /// Host-side re-render of an element's own text.
    pub fn set_text(&self, element: ElementId, text: &str) -> Result<(), PageError> {
        self.tree.write().node_mut(element)?.text = text.to_string();
        Ok(())
    }

    /// Detach `element` and its subtree from the page.
    pub fn remove(&self, element: ElementId) -> Result<(), PageError> {
        let mut tree = self.tree.write();
        tree.node(element)?;
        if element == Tree::ROOT {
            return Err(PageError::Host("cannot remove the document root".to_string()));
        }
        tree.detach(element);
        Ok(())
    }

    /// User click on `element`; published on the activations feed.
    pub fn click(&self, element: ElementId) -> Result<(), PageError> {
        self.tree.read().node(element)?;
        // Nobody listening is fine
        let _ = self.activations.send(element);
        Ok(())
    }

    /// Inline style of `element`, if set.
    pub fn style(&self, element: ElementId, property: &str) -> Option<(String, StylePriority)> {
        self.tree
            .read()
            .node(element)
            .ok()
            .and_then(|n| n.styles.get(property).cloned())
    }

    /// Make every subsequent page call fail with a host fault (or stop doing so).
    pub fn inject_fault(&self, fault: Option<&str>) {
        *self.fault.lock() = fault.map(String::from);
    }

    fn check_fault(&self) -> Result<(), PageError> {
        match &*self.fault.lock() {
            Some(message) => Err(PageError::Host(message.clone())),
            None => Ok(()),
        }
    }

    fn parse(selector: &str) -> Result<Selector, PageError> {
        Selector::parse(selector).map_err(|reason| PageError::InvalidSelector {
            selector: selector.to_string(),
            reason,
        })
    }
}

impl HostPage for MemoryPage {
    fn location(&self) -> Result<String, PageError> {
        self.check_fault()?;
        Ok(self.location.borrow().clone())
    }

    fn query_selector(&self, selector: &str) -> Result<Option<ElementId>, PageError> {
        self.check_fault()?;
        let selector = Self::parse(selector)?;
        let tree = self.tree.read();
        Ok(tree
            .document_order()
            .into_iter()
            .find(|id| selector.matches(&*tree, *id)))
    }

    fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementId>, PageError> {
        self.check_fault()?;
        let selector = Self::parse(selector)?;
        let tree = self.tree.read();
        Ok(tree
            .document_order()
            .into_iter()
            .filter(|id| selector.matches(&*tree, *id))
            .collect())
    }

    fn closest(&self, element: ElementId, selector: &str) -> Result<Option<ElementId>, PageError> {
        self.check_fault()?;
        let selector = Self::parse(selector)?;
        let tree = self.tree.read();
        tree.node(element)?;
        let mut cursor = Some(element).filter(|e| *e != Tree::ROOT);
        while let Some(candidate) = cursor {
            if selector.matches(&*tree, candidate) {
                return Ok(Some(candidate));
            }
            cursor = tree.parent(candidate);
        }
        Ok(None)
    }

    fn text_content(&self, element: ElementId) -> Result<String, PageError> {
        self.check_fault()?;
        let tree = self.tree.read();
        tree.node(element)?;
        let mut text = String::new();
        tree.collect_text(element, &mut text);
        Ok(text)
    }

    fn attribute(&self, element: ElementId, name: &str) -> Result<Option<String>, PageError> {
        self.check_fault()?;
        Ok(self.tree.read().node(element)?.attrs.get(name).cloned())
    }

    fn set_attribute(&self, element: ElementId, name: &str, value: &str) -> Result<(), PageError> {
        self.check_fault()?;
        self.tree
            .write()
            .node_mut(element)?
            .attrs
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove_attribute(&self, element: ElementId, name: &str) -> Result<(), PageError> {
        self.check_fault()?;
        self.tree.write().node_mut(element)?.attrs.remove(name);
        Ok(())
    }

    fn has_class(&self, element: ElementId, class: &str) -> Result<bool, PageError> {
        self.check_fault()?;
        Ok(self
            .tree
            .read()
            .node(element)?
            .classes
            .iter()
            .any(|c| c == class))
    }

    fn add_class(&self, element: ElementId, class: &str) -> Result<(), PageError> {
        self.check_fault()?;
        let mut tree = self.tree.write();
        let node = tree.node_mut(element)?;
        if !node.classes.iter().any(|c| c == class) {
            node.classes.push(class.to_string());
        }
        Ok(())
    }

    fn remove_class(&self, element: ElementId, class: &str) -> Result<(), PageError> {
        self.check_fault()?;
        self.tree
            .write()
            .node_mut(element)?
            .classes
            .retain(|c| c != class);
        Ok(())
    }

    fn set_style_property(
        &self,
        element: ElementId,
        property: &str,
        value: &str,
        priority: StylePriority,
    ) -> Result<(), PageError> {
        self.check_fault()?;
        self.tree
            .write()
            .node_mut(element)?
            .styles
            .insert(property.to_string(), (value.to_string(), priority));
        Ok(())
    }

    fn remove_style_property(&self, element: ElementId, property: &str) -> Result<(), PageError> {
        self.check_fault()?;
        self.tree.write().node_mut(element)?.styles.remove(property);
        Ok(())
    }

    fn navigation_feed(&self) -> Option<watch::Receiver<String>> {
        self.feed_navigation.then(|| self.location.subscribe())
    }

    fn activations(&self) -> Option<broadcast::Receiver<ElementId>> {
        Some(self.activations.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sidebar_page() -> (MemoryPage, ElementId, ElementId) {
        let page = MemoryPage::new("https://app.slack.com/client/T1/C1");
        let nav = page
            .append(
                page.root(),
                ElementSpec::new("nav").class("sidebar").child(
                    ElementSpec::new("div")
                        .class("p-channel_sidebar__channel")
                        .child(
                            ElementSpec::new("span")
                                .text("gen")
                                .child(ElementSpec::new("b").text("eral")),
                        ),
                ),
            )
            .unwrap();
        let span = page.query_selector(".sidebar span").unwrap().unwrap();
        (page, nav, span)
    }

    #[test]
    fn test_query_in_document_order() {
        let page = MemoryPage::new("about:blank");
        let first = page.append(page.root(), ElementSpec::new("p").class("x")).unwrap();
        let second = page.append(page.root(), ElementSpec::new("p").class("x")).unwrap();
        assert_eq!(page.query_selector(".x").unwrap(), Some(first));
        assert_eq!(page.query_selector_all(".x").unwrap(), vec![first, second]);
    }

    #[test]
    fn test_text_content_includes_descendants() {
        let (page, _, span) = sidebar_page();
        assert_eq!(page.text_content(span).unwrap(), "general");
    }

    #[test]
    fn test_closest_walks_ancestors() {
        let (page, _, span) = sidebar_page();
        let item = page.closest(span, ".p-channel_sidebar__channel").unwrap();
        assert!(item.is_some());
        assert_eq!(page.closest(span, "span").unwrap(), Some(span));
        assert_eq!(page.closest(span, ".missing").unwrap(), None);
    }

    #[test]
    fn test_removed_subtree_is_gone() {
        let (page, nav, span) = sidebar_page();
        page.remove(nav).unwrap();
        assert_eq!(page.query_selector("span").unwrap(), None);
        assert_eq!(page.text_content(span), Err(PageError::Detached(span)));
        assert_eq!(
            page.set_attribute(span, "data-x", "1"),
            Err(PageError::Detached(span))
        );
    }

    #[test]
    fn test_rerender_never_reuses_removed_ids() {
        let page = MemoryPage::new("about:blank");
        let first = page
            .append(page.root(), ElementSpec::new("div").class("composer"))
            .unwrap();
        page.remove(first).unwrap();
        let second = page
            .append(page.root(), ElementSpec::new("div").class("composer"))
            .unwrap();

        assert_ne!(first, second);
        assert!(second.index() > first.index());
        assert_eq!(page.text_content(first), Err(PageError::Detached(first)));
        assert_eq!(page.query_selector(".composer").unwrap(), Some(second));
    }

    #[test]
    fn test_style_and_class_mutation() {
        let (page, nav, _) = sidebar_page();
        page.set_style_property(nav, "background-color", "#000000", StylePriority::Important)
            .unwrap();
        assert_eq!(
            page.style(nav, "background-color"),
            Some(("#000000".to_string(), StylePriority::Important))
        );
        page.remove_style_property(nav, "background-color").unwrap();
        assert_eq!(page.style(nav, "background-color"), None);

        page.add_class(nav, "dark-theme").unwrap();
        page.add_class(nav, "dark-theme").unwrap();
        assert!(page.has_class(nav, "dark-theme").unwrap());
        page.remove_class(nav, "dark-theme").unwrap();
        assert!(!page.has_class(nav, "dark-theme").unwrap());
    }

    #[test]
    fn test_invalid_selector_is_reported() {
        let page = MemoryPage::new("about:blank");
        assert!(matches!(
            page.query_selector("a > b"),
            Err(PageError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_injected_fault() {
        let page = MemoryPage::new("about:blank");
        page.inject_fault(Some("boom"));
        assert_eq!(page.location(), Err(PageError::Host("boom".to_string())));
        page.inject_fault(None);
        assert_eq!(page.location().unwrap(), "about:blank");
    }

    #[test]
    fn test_navigation_feed_is_opt_in() {
        let page = MemoryPage::new("about:blank");
        assert!(page.navigation_feed().is_none());

        let page = MemoryPage::new("about:blank").with_navigation_feed();
        let mut feed = page.navigation_feed().unwrap();
        page.navigate("https://example.com/a");
        assert!(feed.has_changed().unwrap());
        assert_eq!(*feed.borrow_and_update(), "https://example.com/a");
    }

    #[test]
    fn test_click_publishes_activation() {
        let (page, _, span) = sidebar_page();
        let mut rx = page.activations().unwrap();
        page.click(span).unwrap();
        assert_eq!(rx.try_recv().unwrap(), span);
    }
}
