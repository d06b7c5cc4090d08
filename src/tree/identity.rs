use crate::tree::node_model::{Child, ElementKey, ElementNode};

pub fn element_key(node: &ElementNode) -> ElementKey {
    node.identifier
        .as_deref()
        .filter(|id| !id.is_empty())
        .or_else(|| node.first_class().filter(|c| !c.is_empty()))
        .map(|key| ElementKey::Keyed(key.to_string()))
        .unwrap_or(ElementKey::Unkeyed)
}

/// Flatten all literal text in the tree, depth-first, space separated.
pub fn extract_text(node: &ElementNode) -> String {
    let mut parts = Vec::new();
    collect_text(node, &mut parts);
    parts.join(" ")
}

fn collect_text<'a>(node: &'a ElementNode, parts: &mut Vec<&'a str>) {
    if let Some(text) = node.text.as_deref() {
        parts.push(text);
    }
    for child in &node.children {
        match child {
            Child::Text(text) => parts.push(text),
            Child::Element(el) => collect_text(el, parts),
        }
    }
}

/// Describe the tree for the classifier: every keyed node with its kind and
/// text, so the model can reference keys that actually exist.
pub fn describe_tree(node: &ElementNode) -> String {
    let mut lines = Vec::new();
    describe(node, 0, &mut lines);
    lines.join("\n")
}

fn describe(node: &ElementNode, depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    let mut line = format!("{}<{:?}", indent, node.kind);
    if let Some(id) = &node.identifier {
        line.push_str(&format!(" id=\"{}\"", id));
    }
    if !node.class_names.is_empty() {
        line.push_str(&format!(" className=\"{}\"", node.class_names.join(" ")));
    }
    if let Some(href) = &node.href {
        line.push_str(&format!(" href=\"{}\"", href));
    }
    line.push('>');
    if let Some(text) = &node.text {
        line.push_str(text);
    }
    lines.push(line);

    for child in &node.children {
        match child {
            Child::Text(text) => lines.push(format!("{}  {}", indent, text)),
            Child::Element(el) => describe(el, depth + 1, lines),
        }
    }
}

/// Stable content identity: an explicit override when the caller has one,
/// otherwise a SHA-1 of the extracted text.
pub fn content_fingerprint(node: &ElementNode, override_id: Option<&str>) -> String {
    match override_id {
        Some(id) => format!("id:{}", id),
        None => format!("sha1:{}", text_fingerprint(&extract_text(node))),
    }
}

pub fn text_fingerprint(text: &str) -> String {
    use sha1::{Digest, Sha1};

    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
