//! The selector subset the colorizer needs from a host page.
//!
//! Supported: type selectors (`span`, `*`), `.class`, `#id`, `[attr]`,
//! `[attr="value"]` (single, double or no quotes), compounds of those, and the
//! descendant combinator (whitespace). Child/sibling combinators, selector
//! lists and pseudo-classes are rejected.

use super::ElementId;

/// Read-only view of an element tree that selectors can be matched against.
pub trait ElementView {
    fn tag(&self, element: ElementId) -> Option<&str>;
    fn has_class(&self, element: ElementId, class: &str) -> bool;
    fn attribute(&self, element: ElementId, name: &str) -> Option<&str>;
    fn parent(&self, element: ElementId) -> Option<ElementId>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrMatch {
    name: String,
    value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Compound {
    tag: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
}

impl Compound {
    fn matches(&self, view: &impl ElementView, element: ElementId) -> bool {
        if let Some(tag) = &self.tag
            && !view
                .tag(element)
                .is_some_and(|t| t.eq_ignore_ascii_case(tag))
        {
            return false;
        }
        if !self.classes.iter().all(|c| view.has_class(element, c)) {
            return false;
        }
        self.attrs.iter().all(|a| match (&a.value, view.attribute(element, &a.name)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(expected), Some(actual)) => expected == actual,
        })
    }
}

/// A parsed selector: compounds joined by descendant combinators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    /// Outermost ancestor first, subject last.
    chain: Vec<Compound>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, String> {
        let chain = split_descendants(source)?
            .into_iter()
            .map(parse_compound)
            .collect::<Result<Vec<_>, _>>()?;
        if chain.is_empty() {
            return Err("empty selector".to_string());
        }
        Ok(Self {
            source: source.to_string(),
            chain,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `element` is matched, considering its ancestors for descendant parts.
    pub fn matches(&self, view: &impl ElementView, element: ElementId) -> bool {
        let Some((subject, ancestors)) = self.chain.split_last() else {
            return false;
        };
        if !subject.matches(view, element) {
            return false;
        }

        // Greedy nearest-ancestor matching is exact for descendant-only chains
        let mut cursor = view.parent(element);
        for compound in ancestors.iter().rev() {
            loop {
                match cursor {
                    None => return false,
                    Some(candidate) => {
                        cursor = view.parent(candidate);
                        if compound.matches(view, candidate) {
                            break;
                        }
                    }
                }
            }
        }
        true
    }
}

fn split_descendants(source: &str) -> Result<Vec<&str>, String> {
    let mut parts = Vec::new();
    let mut start: Option<usize> = None;
    let mut in_brackets = false;
    let mut quote: Option<char> = None;

    for (i, c) in source.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') if in_brackets => quote = Some(c),
            (None, '[') => in_brackets = true,
            (None, ']') => in_brackets = false,
            (None, c) if c.is_whitespace() && !in_brackets => {
                if let Some(s) = start.take() {
                    parts.push(&source[s..i]);
                }
                continue;
            }
            (None, ',' | '>' | '+' | '~' | ':') if !in_brackets => {
                return Err(format!("unsupported selector syntax '{c}'"));
            }
            _ => {}
        }
        if start.is_none() {
            start = Some(i);
        }
    }
    if quote.is_some() || in_brackets {
        return Err("unterminated attribute selector".to_string());
    }
    if let Some(s) = start {
        parts.push(&source[s..]);
    }
    Ok(parts)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn take_ident(rest: &str) -> (&str, &str) {
    let end = rest
        .char_indices()
        .find(|(_, c)| !is_ident_char(*c))
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    rest.split_at(end)
}

fn parse_compound(source: &str) -> Result<Compound, String> {
    let mut compound = Compound::default();
    let mut rest = source;

    if let Some(after) = rest.strip_prefix('*') {
        rest = after;
    } else {
        let (tag, after) = take_ident(rest);
        if !tag.is_empty() {
            compound.tag = Some(tag.to_ascii_lowercase());
            rest = after;
        }
    }

    while let Some(c) = rest.chars().next() {
        match c {
            '.' | '#' => {
                let (ident, after) = take_ident(&rest[1..]);
                if ident.is_empty() {
                    return Err(format!("expected a name after '{c}' in '{source}'"));
                }
                if c == '.' {
                    compound.classes.push(ident.to_string());
                } else {
                    compound.attrs.push(AttrMatch {
                        name: "id".to_string(),
                        value: Some(ident.to_string()),
                    });
                }
                rest = after;
            }
            '[' => {
                let close = closing_bracket(rest)
                    .ok_or_else(|| format!("unterminated attribute selector in '{source}'"))?;
                compound.attrs.push(parse_attr(&rest[1..close], source)?);
                rest = &rest[close + 1..];
            }
            other => return Err(format!("unexpected '{other}' in '{source}'")),
        }
    }
    Ok(compound)
}

/// Index of the `]` that closes the attribute selector opening `rest`. Brackets
/// inside quoted values do not count.
fn closing_bracket(rest: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in rest.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, ']') => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_attr(body: &str, source: &str) -> Result<AttrMatch, String> {
    let (name, value) = match body.split_once('=') {
        None => (body.trim(), None),
        Some((name, raw)) => {
            let raw = raw.trim();
            let unquoted = raw
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| raw.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(raw);
            (name.trim(), Some(unquoted.to_string()))
        }
    };
    if name.is_empty() || !name.chars().all(is_ident_char) {
        return Err(format!("invalid attribute name in '{source}'"));
    }
    Ok(AttrMatch {
        name: name.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Tiny fixed tree: 0 <nav class="sidebar"> > 1 <div class="item selected"> > 2 <span data-qa="name">
    struct Fixture {
        tags: Vec<&'static str>,
        classes: Vec<Vec<&'static str>>,
        attrs: Vec<HashMap<&'static str, &'static str>>,
        parents: Vec<Option<usize>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tags: vec!["nav", "div", "span"],
                classes: vec![vec!["sidebar"], vec!["item", "selected"], vec![]],
                attrs: vec![
                    HashMap::new(),
                    HashMap::from([("id", "row")]),
                    HashMap::from([("data-qa", "name")]),
                ],
                parents: vec![None, Some(0), Some(1)],
            }
        }
    }

    impl ElementView for Fixture {
        fn tag(&self, element: ElementId) -> Option<&str> {
            self.tags.get(element.index()).copied()
        }
        fn has_class(&self, element: ElementId, class: &str) -> bool {
            self.classes[element.index()].iter().any(|c| *c == class)
        }
        fn attribute(&self, element: ElementId, name: &str) -> Option<&str> {
            self.attrs[element.index()].get(name).copied()
        }
        fn parent(&self, element: ElementId) -> Option<ElementId> {
            self.parents[element.index()].map(ElementId::new)
        }
    }

    fn matches(selector: &str, element: usize) -> bool {
        Selector::parse(selector)
            .unwrap()
            .matches(&Fixture::new(), ElementId::new(element))
    }

    #[test]
    fn test_simple_parts() {
        assert!(matches("span", 2));
        assert!(matches("SPAN", 2));
        assert!(matches(".item", 1));
        assert!(matches(".item.selected", 1));
        assert!(!matches(".item.missing", 1));
        assert!(matches("#row", 1));
        assert!(matches("*", 0));
    }

    #[test]
    fn test_attribute_forms() {
        assert!(matches(r#"[data-qa="name"]"#, 2));
        assert!(matches("[data-qa='name']", 2));
        assert!(matches("[data-qa=name]", 2));
        assert!(matches("[data-qa]", 2));
        assert!(!matches(r#"[data-qa="other"]"#, 2));
        assert!(!matches("[data-qa]", 1));
    }

    #[test]
    fn test_descendant_chain() {
        assert!(matches(".sidebar span", 2));
        assert!(matches(".sidebar .selected [data-qa=\"name\"]", 2));
        assert!(matches("  .selected   span ", 2));
        assert!(!matches(".selected .sidebar span", 2));
        assert!(!matches(".sidebar span", 1));
    }

    #[test]
    fn test_attribute_value_with_spaces_stays_one_part() {
        let selector = Selector::parse(r#"[aria-label="general chat"]"#).unwrap();
        assert_eq!(selector.chain.len(), 1);
    }

    #[test]
    fn test_bracket_inside_quoted_value() {
        let selector = Selector::parse(r#"[aria-label="a]b"].item"#).unwrap();
        assert_eq!(selector.chain.len(), 1);
        let compound = &selector.chain[0];
        assert_eq!(compound.attrs[0].value.as_deref(), Some("a]b"));
        assert_eq!(compound.classes, vec!["item".to_string()]);

        assert_eq!(Selector::parse("[title='x]y'] span").unwrap().chain.len(), 2);
        assert!(Selector::parse(r#"[aria-label="a]b"#).is_err());
    }

    #[test]
    fn test_rejects_unsupported_syntax() {
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("   ").is_err());
        assert!(Selector::parse("div > span").is_err());
        assert!(Selector::parse("a, b").is_err());
        assert!(Selector::parse("a:hover").is_err());
        assert!(Selector::parse("[data-qa=\"x\"").is_err());
        assert!(Selector::parse(".").is_err());
    }
}
