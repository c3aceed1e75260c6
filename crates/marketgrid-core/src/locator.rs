//! Locator expressions and ordered fallback sets.

use std::fmt;

/// A single element-finding expression, tagged by syntax.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// CSS selector, e.g. `input#gh-ac`.
    Css(String),
    /// XPath expression, e.g. `//input[@id='gh-ac']`.
    XPath(String),
    /// Visible-text match; backends lower this to an XPath `contains`.
    Text(String),
}

impl Locator {
    pub fn css(expr: impl Into<String>) -> Self {
        Locator::Css(expr.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }

    pub fn text(needle: impl Into<String>) -> Self {
        Locator::Text(needle.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(expr) => write!(f, "css={expr}"),
            Locator::XPath(expr) => write!(f, "xpath={expr}"),
            Locator::Text(needle) => write!(f, "text={needle}"),
        }
    }
}

/// An ordered sequence of locators that all denote the same logical UI
/// element across anticipated markup variants.
///
/// Order encodes preference: the first candidate that resolves to a visible
/// element wins and later candidates are never attempted. Immutable once
/// built. An empty set is representable so the resolver can reject it as a
/// malformed call.
#[derive(Debug, Clone)]
pub struct LocatorSet {
    candidates: Vec<Locator>,
}

impl LocatorSet {
    pub fn new(candidates: Vec<Locator>) -> Self {
        Self { candidates }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Locator> {
        self.candidates.iter()
    }
}

impl From<Vec<Locator>> for LocatorSet {
    fn from(candidates: Vec<Locator>) -> Self {
        Self::new(candidates)
    }
}

impl<'a> IntoIterator for &'a LocatorSet {
    type Item = &'a Locator;
    type IntoIter = std::slice::Iter<'a, Locator>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}
