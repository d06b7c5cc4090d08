use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::SystemTime;

use crate::tree::node_model::{ElementNode, StyleMap};

/// Field overrides for one matched node. Absent fields leave the node as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hover: Option<StyleMap>,
}

/// All patches for one transformation pass, keyed by element key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransformationMap {
    entries: BTreeMap<String, Patch>,
}

impl TransformationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, patch: Patch) {
        self.entries.insert(key.into(), patch);
    }

    pub fn with(mut self, key: impl Into<String>, patch: Patch) -> Self {
        self.insert(key, patch);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Patch> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Campaign attribution plus an optional free-text instruction.
/// `None` means unspecified, which is distinct from an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub campaign: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub instruction: Option<String>,
}

impl Context {
    /// Attribution fields in prompt order, paired with their display label.
    pub fn fields(&self) -> [(&'static str, Option<&str>); 5] {
        [
            ("Source", self.source.as_deref()),
            ("Campaign", self.campaign.as_deref()),
            ("Medium", self.medium.as_deref()),
            ("Term", self.term.as_deref()),
            ("Content", self.content.as_deref()),
        ]
    }

    /// Serialized form used in cache keys. JSON keeps `null` and `""` apart.
    pub fn flatten(&self) -> String {
        serde_json::json!([
            self.source,
            self.campaign,
            self.medium,
            self.term,
            self.content,
            self.instruction,
        ])
        .to_string()
    }
}

/// Composite identity of one transformation request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Pure function of context, effective instruction and content fingerprint.
    pub fn derive(context: &Context, instruction: &str, fingerprint: &str) -> Self {
        CacheKey(format!(
            "{}|{}|{}",
            context.flatten(),
            serde_json::Value::from(instruction),
            fingerprint
        ))
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub map: TransformationMap,
    pub created_at: SystemTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformationResult {
    pub tree: ElementNode,
    pub map: TransformationMap,
}

impl TransformationResult {
    /// The fallback result: the caller's tree untouched, no patches.
    pub fn unchanged(tree: &ElementNode) -> Self {
        Self {
            tree: tree.clone(),
            map: TransformationMap::new(),
        }
    }
}
