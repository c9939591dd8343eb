//! Literal-text extraction for rich-text descriptors.

use serde_json::Value;

/// Extracted literal text beyond this many characters is spilled to an
/// uploaded file instead of being sent as a rich-text block.
pub const RICH_TEXT_SPILL_THRESHOLD: usize = 4_000;

/// Collect every literal `text` string across the nested element tree, in
/// document order. Non-text leaves (emoji, links without labels, user or
/// channel references) contribute nothing.
pub fn extract_literal_text(elements: &[Value]) -> String {
    let mut collected = String::new();
    for element in elements {
        walk(element, &mut collected);
    }
    collected
}

fn walk(node: &Value, collected: &mut String) {
    let Some(object) = node.as_object() else {
        return;
    };
    if let Some(text) = object.get("text").and_then(Value::as_str) {
        collected.push_str(text);
    }
    if let Some(children) = object.get("elements").and_then(Value::as_array) {
        for child in children {
            walk(child, collected);
        }
    }
}
