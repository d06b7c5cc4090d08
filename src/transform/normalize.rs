use serde_json::{Map, Value};
use tracing::warn;

use crate::transform::error::TransformError;
use crate::transform::transform_model::{Patch, TransformationMap};
use crate::tree::node_model::StyleMap;

/// Key used for the single entry produced from a flat style-only response
/// when the caller does not name the implicit target.
pub const IMPLICIT_TARGET: &str = "root";

/// Style properties copied from a flat style-only response.
const FLAT_STYLE_PROPERTIES: [&str; 7] = [
    "color",
    "textDecoration",
    "fontWeight",
    "fontStyle",
    "textAlign",
    "borderColor",
    "borderStyle",
];

const FLAT_SHAPE_FIELDS: [&str; 5] = ["text", "style", "headings", "paragraphs", "buttons"];

pub fn normalize(raw: &str) -> Result<TransformationMap, TransformError> {
    normalize_for_target(raw, IMPLICIT_TARGET)
}

/// Parse a raw classifier answer into a canonical `TransformationMap`.
/// A flat style-only answer becomes a single entry keyed by `implicit_target`.
pub fn normalize_for_target(
    raw: &str,
    implicit_target: &str,
) -> Result<TransformationMap, TransformError> {
    let cleaned = strip_code_fence(raw);
    let value: Value =
        serde_json::from_str(cleaned).map_err(|source| TransformError::Malformed { source })?;

    let object = match value {
        Value::Object(object) => object,
        other => {
            return Err(TransformError::SchemaMismatch(format!(
                "expected a JSON object, got {}",
                json_type(&other)
            )));
        }
    };

    if let Some(elements) = object.get("elements") {
        // A null `elements` is an answer with nothing to change.
        if elements.is_null() {
            return Ok(TransformationMap::new());
        }
        return normalize_elements(elements);
    }

    if FLAT_SHAPE_FIELDS.iter().any(|f| object.contains_key(*f)) {
        let patch = normalize_flat(&object);
        return Ok(TransformationMap::new().with(implicit_target, patch));
    }

    Err(TransformError::SchemaMismatch(
        "object has neither `elements` nor any style-only field".to_string(),
    ))
}

/// Remove a surrounding markdown code fence (```json ... ``` or ``` ... ```).
pub fn strip_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

fn normalize_elements(elements: &Value) -> Result<TransformationMap, TransformError> {
    let Value::Object(entries) = elements else {
        return Err(TransformError::SchemaMismatch(format!(
            "`elements` must be an object, got {}",
            json_type(elements)
        )));
    };

    let mut map = TransformationMap::new();
    for (key, entry) in entries {
        let Value::Object(fields) = entry else {
            warn!(key = %key, "skipping element entry that is not an object");
            continue;
        };
        if key.is_empty() {
            continue;
        }
        map.insert(key.clone(), patch_from_fields(fields));
    }
    Ok(map)
}

fn patch_from_fields(fields: &Map<String, Value>) -> Patch {
    let (style, nested_hover) = match fields.get("style") {
        Some(Value::Object(style)) => split_style(style),
        _ => (None, None),
    };
    let hover = nested_hover.or_else(|| match fields.get("hover") {
        Some(Value::Object(hover)) => non_empty(scalar_properties(hover)),
        _ => None,
    });

    Patch {
        text: string_field(fields, "text"),
        href: string_field(fields, "href"),
        style,
        hover,
    }
}

/// Split a style object into plain properties and its lifted `hover` sub-map.
fn split_style(style: &Map<String, Value>) -> (Option<StyleMap>, Option<StyleMap>) {
    let hover = match style.get("hover") {
        Some(Value::Object(hover)) => non_empty(scalar_properties(hover)),
        _ => None,
    };
    (non_empty(scalar_properties(style)), hover)
}

fn normalize_flat(object: &Map<String, Value>) -> Patch {
    let mut patch = Patch {
        text: string_field(object, "text")
            .or_else(|| nested_string(object, "headings", "h1"))
            .or_else(|| paragraph_text(object))
            .or_else(|| button_field(object, "text")),
        href: button_field(object, "href"),
        ..Patch::default()
    };

    if let Some(Value::Object(style)) = object.get("style") {
        let mut filtered = StyleMap::new();
        if let Some(background) = scalar(style.get("background")) {
            filtered.insert("background".to_string(), background);
        } else if let Some(color) = scalar(style.get("backgroundColor")) {
            filtered.insert("backgroundColor".to_string(), color);
        }
        for property in FLAT_STYLE_PROPERTIES {
            if let Some(value) = scalar(style.get(property)) {
                filtered.insert(property.to_string(), value);
            }
        }
        patch.style = non_empty(filtered);
        patch.hover = match style.get("hover") {
            Some(Value::Object(hover)) => non_empty(scalar_properties(hover)),
            _ => None,
        };
    }

    patch
}

fn paragraph_text(object: &Map<String, Value>) -> Option<String> {
    match object.get("paragraphs")?.get("p")? {
        Value::String(text) => Some(text.clone()),
        Value::Object(p) => string_field(p, "text"),
        _ => None,
    }
}

fn button_field(object: &Map<String, Value>, field: &str) -> Option<String> {
    let button = object.get("buttons")?.get("button")?.as_object()?;
    string_field(button, field)
}

fn nested_string(object: &Map<String, Value>, outer: &str, inner: &str) -> Option<String> {
    object.get(outer)?.get(inner)?.as_str().map(str::to_string)
}

fn string_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    fields.get(name).and_then(Value::as_str).map(str::to_string)
}

/// Copy string/number/bool properties; nested objects and nulls are dropped.
fn scalar_properties(object: &Map<String, Value>) -> StyleMap {
    object
        .iter()
        .filter_map(|(k, v)| scalar(Some(v)).map(|v| (k.clone(), v)))
        .collect()
}

fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn non_empty(map: StyleMap) -> Option<StyleMap> {
    if map.is_empty() { None } else { Some(map) }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
