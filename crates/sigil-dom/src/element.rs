//! Head element model.

use std::collections::{BTreeMap, BTreeSet};

/// Identifier of a node attached to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Element kinds the engine cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagName {
    /// `<link>`
    Link,
    /// `<meta>`
    Meta,
    /// `<style>`
    Style,
}

/// A head element snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Node identity within its document.
    pub id: NodeId,
    /// Element kind.
    pub tag: TagName,
    /// Attribute map.
    pub attributes: BTreeMap<String, String>,
    /// Class list.
    pub classes: BTreeSet<String>,
    /// Text content (style rules).
    pub text: Option<String>,
}

impl Element {
    /// Construct an element of the given kind.
    #[must_use]
    pub const fn new(id: NodeId, tag: TagName) -> Self {
        Self {
            id,
            tag,
            attributes: BTreeMap::new(),
            classes: BTreeSet::new(),
            text: None,
        }
    }

    /// Read an attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Whether the element carries the given class.
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }
}

/// Description of a `<link>` to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInit {
    /// `rel` attribute.
    pub rel: String,
    /// `type` attribute, when set.
    pub link_type: Option<String>,
    /// `href` attribute.
    pub href: String,
    /// Classes applied to the element.
    pub classes: Vec<String>,
}

impl LinkInit {
    /// Start a link description from its `rel` and `href`.
    #[must_use]
    pub fn new(rel: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            link_type: None,
            href: href.into(),
            classes: Vec::new(),
        }
    }

    /// Set the `type` attribute.
    #[must_use]
    pub fn with_type(mut self, link_type: impl Into<String>) -> Self {
        self.link_type = Some(link_type.into());
        self
    }

    /// Add a class.
    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// The same link under a different `rel`.
    #[must_use]
    pub fn clone_with_rel(&self, rel: impl Into<String>) -> Self {
        let mut clone = self.clone();
        clone.rel = rel.into();
        clone
    }
}
