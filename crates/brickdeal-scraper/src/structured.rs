//! Embedded structured-data extraction (JSON-LD style blocks).

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static LD_SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid regex")
});

/// Pulls every structured-data node out of a raw HTML document.
///
/// Each `<script type="application/ld+json">` block is parsed permissively:
/// malformed JSON is skipped, never fatal. Top-level arrays are spliced and
/// `@graph` containers are flattened recursively, because retailer pages
/// routinely nest the real `Product` node several levels inside a graph
/// wrapper. Every container node is also kept itself, so callers see a flat
/// candidate list.
#[must_use]
pub fn extract_structured_blocks(html: &str) -> Vec<Value> {
    let mut nodes = Vec::new();

    for cap in LD_SCRIPT_RE.captures_iter(html) {
        let Some(text) = cap.get(1).map(|m| m.as_str().trim()) else {
            continue;
        };
        if text.is_empty() {
            continue;
        }
        let Ok(parsed) = serde_json::from_str::<Value>(text) else {
            continue;
        };
        flatten_into(parsed, &mut nodes);
    }

    nodes
}

fn flatten_into(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
        Value::Object(map) => {
            let graph = map.get("@graph").cloned();
            out.push(Value::Object(map));
            if let Some(graph) = graph {
                flatten_into(graph, out);
            }
        }
        _ => {}
    }
}

/// Defensive string accessor: `node[key]` when it is a non-empty string.
pub(crate) fn str_field<'a>(node: &'a Value, key: &str) -> Option<&'a str> {
    node.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
