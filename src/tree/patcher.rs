use tracing::trace;

use crate::style::registry::{HoverStyleInjector, TRANSITION};
use crate::transform::transform_model::{Patch, TransformationMap};
use crate::tree::identity::element_key;
use crate::tree::node_model::{Child, ElementNode};

/// Produce a new tree with every node whose key appears in `map` patched.
///
/// Children are transformed before their parent. A patch carrying `text`
/// replaces the node's whole children subtree, discarding whatever the
/// recursion already produced below it. Keys in `map` that match nothing
/// are ignored.
pub fn apply(tree: &ElementNode, map: &TransformationMap, hover: &HoverStyleInjector) -> ElementNode {
    if map.is_empty() {
        return tree.clone();
    }
    patch_node(tree, map, hover, 0)
}

fn patch_node(
    node: &ElementNode,
    map: &TransformationMap,
    hover: &HoverStyleInjector,
    depth: usize,
) -> ElementNode {
    let children: Vec<Child> = node
        .children
        .iter()
        .map(|child| match child {
            Child::Element(el) => Child::Element(patch_node(el, map, hover, depth + 1)),
            Child::Text(text) => Child::Text(text.clone()),
        })
        .collect();

    let key = element_key(node);
    let Some(patch) = key.as_str().and_then(|k| map.get(k)) else {
        return ElementNode {
            children,
            ..node.clone_without_children()
        };
    };

    trace!(key = %key, depth, "patching element");
    let patched = patch_fields(node, children, patch);

    if let (Some(hover_map), Some(k)) = (&patch.hover, key.as_str()) {
        hover.upsert(k, node.identifier.as_deref(), node.first_class(), hover_map);
    }

    patched
}

fn patch_fields(node: &ElementNode, children: Vec<Child>, patch: &Patch) -> ElementNode {
    let mut patched = ElementNode {
        children,
        ..node.clone_without_children()
    };

    // Replace wins over merge: literal text drops the transformed subtree.
    if let Some(text) = &patch.text {
        patched.text = Some(text.clone());
        patched.children.clear();
    }

    if let Some(href) = &patch.href {
        patched.href = Some(href.clone());
    }

    if let Some(style) = &patch.style {
        for (property, value) in style {
            patched.style.insert(property.clone(), value.clone());
        }
    }
    patched
        .style
        .insert("transition".to_string(), TRANSITION.to_string());

    patched
}

impl ElementNode {
    /// Shallow copy of every attribute except `children`.
    fn clone_without_children(&self) -> ElementNode {
        ElementNode {
            kind: self.kind,
            identifier: self.identifier.clone(),
            class_names: self.class_names.clone(),
            text: self.text.clone(),
            href: self.href.clone(),
            style: self.style.clone(),
            children: vec![],
        }
    }
}
