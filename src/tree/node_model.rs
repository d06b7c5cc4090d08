use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inline style properties, keyed by property name (camelCase, as authored).
pub type StyleMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Container,
    Text,
    Button,
    Link,
    Card,
}

/// A node in the content tree. Callers build trees once; the engine only
/// ever produces new trees from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub kind: ElementKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub class_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub style: StyleMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Child>,
}

/// Children are either structural nodes or plain text that passes through
/// the walker untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Child {
    Text(String),
    Element(ElementNode),
}

impl ElementNode {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            identifier: None,
            class_names: vec![],
            text: None,
            href: None,
            style: StyleMap::new(),
            children: vec![],
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.identifier = Some(id.into());
        self
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_names.push(class_name.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    pub fn with_style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.style.insert(property.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: ElementNode) -> Self {
        self.children.push(Child::Element(child));
        self
    }

    pub fn with_text_child(mut self, text: impl Into<String>) -> Self {
        self.children.push(Child::Text(text.into()));
        self
    }

    pub fn first_class(&self) -> Option<&str> {
        self.class_names.first().map(String::as_str)
    }

    /// Depth-first search by element key.
    pub fn find(&self, key: &str) -> Option<&ElementNode> {
        if crate::tree::identity::element_key(self).as_str() == Some(key) {
            return Some(self);
        }
        self.children.iter().find_map(|child| match child {
            Child::Element(node) => node.find(key),
            Child::Text(_) => None,
        })
    }
}

/// Lookup identity of a node: its identifier, else its first class name.
/// Unkeyed nodes are traversed but never individually targeted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementKey {
    Keyed(String),
    Unkeyed,
}

impl ElementKey {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ElementKey::Keyed(key) => Some(key),
            ElementKey::Unkeyed => None,
        }
    }
}

impl std::fmt::Display for ElementKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementKey::Keyed(key) => write!(f, "{}", key),
            ElementKey::Unkeyed => write!(f, "unkeyed"),
        }
    }
}
