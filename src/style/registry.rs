use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::tree::node_model::StyleMap;

pub const TRANSITION: &str = "all 0.3s ease";

/// A single global pseudo-state rule, addressable by its synthetic id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    pub id: String,
    pub css: String,
}

// ============================================================================
// StyleRegistry — where synthesized rules end up
// ============================================================================

/// Global stylesheet the host renders outside the content tree.
pub trait StyleRegistry: Send + Sync {
    /// Replace any rule with the same id, then insert `css`.
    fn upsert(&self, id: &str, css: String);

    fn rules(&self) -> Vec<StyleRule>;

    /// All rules concatenated in insertion order, ready for one `<style>` block.
    fn stylesheet(&self) -> String {
        self.rules().into_iter().map(|r| r.css).collect()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStyleRegistry {
    rules: Mutex<Vec<StyleRule>>,
}

impl InMemoryStyleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<StyleRule> {
        self.lock().iter().find(|r| r.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StyleRule>> {
        self.rules.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StyleRegistry for InMemoryStyleRegistry {
    fn upsert(&self, id: &str, css: String) {
        let mut rules = self.lock();
        rules.retain(|r| r.id != id);
        rules.push(StyleRule {
            id: id.to_string(),
            css,
        });
    }

    fn rules(&self) -> Vec<StyleRule> {
        self.lock().clone()
    }
}

/// Registry for non-interactive targets where hover has no meaning.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStyleRegistry;

impl StyleRegistry for NoopStyleRegistry {
    fn upsert(&self, _id: &str, _css: String) {}

    fn rules(&self) -> Vec<StyleRule> {
        vec![]
    }
}

static GLOBAL_REGISTRY: Lazy<Arc<InMemoryStyleRegistry>> =
    Lazy::new(|| Arc::new(InMemoryStyleRegistry::new()));

/// Process-wide registry, created on first use and never torn down.
pub fn global_registry() -> Arc<InMemoryStyleRegistry> {
    Arc::clone(&GLOBAL_REGISTRY)
}

// ============================================================================
// HoverStyleInjector — builds rules from patch hover maps
// ============================================================================

#[derive(Clone)]
pub struct HoverStyleInjector {
    registry: Arc<dyn StyleRegistry>,
}

impl HoverStyleInjector {
    pub fn new(registry: Arc<dyn StyleRegistry>) -> Self {
        Self { registry }
    }

    pub fn noop() -> Self {
        Self::new(Arc::new(NoopStyleRegistry))
    }

    pub fn registry(&self) -> &Arc<dyn StyleRegistry> {
        &self.registry
    }

    /// Register (or replace) the hover rule for one element key.
    pub fn upsert(
        &self,
        key: &str,
        identifier: Option<&str>,
        class_name: Option<&str>,
        hover: &StyleMap,
    ) {
        let Some(css) = hover_rule(identifier, class_name, hover) else {
            return;
        };
        let id = rule_id(key);
        debug!(rule = %id, "upserting hover rule");
        self.registry.upsert(&id, css);
    }
}

pub fn rule_id(key: &str) -> String {
    format!("hover-{}", key)
}

/// Render `selector:hover { prop: value !important; ... }`. Returns `None`
/// when there is nothing to select.
pub fn hover_rule(
    identifier: Option<&str>,
    class_name: Option<&str>,
    hover: &StyleMap,
) -> Option<String> {
    let mut selectors = Vec::new();
    if let Some(id) = identifier.filter(|id| !id.is_empty()) {
        selectors.push(format!("#{}:hover", id));
    }
    if let Some(class) = class_name.filter(|c| !c.is_empty()) {
        selectors.push(format!(".{}:hover", class));
    }
    if selectors.is_empty() {
        return None;
    }

    let mut body = String::new();
    for (property, value) in hover {
        if property == "transition" {
            continue;
        }
        body.push_str(&format!("{}: {} !important; ", css_property(property), value));
    }
    body.push_str(&format!("transition: {} !important; ", TRANSITION));

    Some(format!("{} {{ {}}} ", selectors.join(", "), body))
}

/// `backgroundColor` -> `background-color`; already-kebab names pass through.
pub fn css_property(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

