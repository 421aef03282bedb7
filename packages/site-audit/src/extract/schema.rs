//! JSON-LD structured data extraction, including `@graph` expansion.

use scraper::{Html, Selector};

use crate::types::snapshot::SchemaBlock;

/// Pull every JSON-LD block from the document. Parse failures are recorded
/// as invalid blocks, never dropped, so audits can flag them.
pub fn extract_schema_blocks(document: &Html) -> Vec<SchemaBlock> {
    let sel = Selector::parse("script[type=\"application/ld+json\"]")
        .expect("static selector parses");

    let mut blocks = Vec::new();

    for el in document.select(&sel) {
        let raw: String = el.text().collect();
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) => expand(value, &mut blocks),
            Err(e) => blocks.push(SchemaBlock {
                schema_type: "unknown".to_string(),
                json_ld: serde_json::Value::String(truncate(raw, 512)),
                valid: false,
                errors: vec![format!("JSON parse error: {}", e)],
            }),
        }
    }

    blocks
}

/// Expand a parsed JSON-LD value into blocks: arrays and `@graph` nodes
/// each become their own block.
fn expand(value: serde_json::Value, blocks: &mut Vec<SchemaBlock>) {
    match value {
        serde_json::Value::Array(items) => {
            for item in items {
                expand(item, blocks);
            }
        }
        serde_json::Value::Object(ref object) => {
            if let Some(serde_json::Value::Array(graph)) = object.get("@graph") {
                for node in graph.clone() {
                    expand(node, blocks);
                }
                return;
            }
            blocks.push(to_block(value));
        }
        other => blocks.push(SchemaBlock {
            schema_type: "unknown".to_string(),
            json_ld: other,
            valid: false,
            errors: vec!["JSON-LD root is not an object".to_string()],
        }),
    }
}

fn to_block(value: serde_json::Value) -> SchemaBlock {
    let schema_type = value
        .get("@type")
        .map(type_name)
        .unwrap_or_else(|| "unknown".to_string());

    let mut errors = Vec::new();
    if value.get("@type").is_none() {
        errors.push("missing @type".to_string());
    }
    if value.get("@context").is_none() {
        errors.push("missing @context".to_string());
    }

    SchemaBlock {
        schema_type,
        json_ld: value,
        valid: errors.is_empty(),
        errors,
    }
}

/// `@type` can be a string or an array of strings.
fn type_name(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(","),
        _ => "unknown".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
