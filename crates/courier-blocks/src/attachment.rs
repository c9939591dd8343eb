use serde_json::{json, Value};

use crate::block::Block;

/// Legacy colored side-bar wrapper around a run of blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub color: Option<String>,
    pub blocks: Vec<Block>,
}

impl Attachment {
    pub fn single(block: Block, color: Option<String>) -> Self {
        Self {
            color: color.map(|raw| resolve_color(&raw)),
            blocks: vec![block],
        }
    }

    pub fn to_wire(&self) -> Value {
        let mut value = json!({
            "blocks": self.blocks.iter().map(Block::to_wire).collect::<Vec<_>>(),
        });
        if let Some(color) = &self.color {
            value["color"] = Value::String(color.clone());
        }
        value
    }
}

/// Map the named palette onto hex values; anything else passes through.
pub fn resolve_color(raw: &str) -> String {
    match raw.trim() {
        "danger" => "#F44336".to_string(),
        "success" => "#4CAF50".to_string(),
        "warn" => "#FFC107".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve_color, Attachment};
    use crate::block::Block;

    #[test]
    fn unit_resolve_color_maps_palette_names_and_passes_hex_through() {
        assert_eq!(resolve_color("danger"), "#F44336");
        assert_eq!(resolve_color("success"), "#4CAF50");
        assert_eq!(resolve_color("warn"), "#FFC107");
        assert_eq!(resolve_color("#123ABC"), "#123ABC");
    }

    #[test]
    fn unit_attachment_wire_omits_color_when_absent() {
        let attachment = Attachment::single(Block::Divider { block_id: None }, None);
        let wire = attachment.to_wire();
        assert!(wire.get("color").is_none());
        assert_eq!(wire["blocks"][0]["type"], "divider");
    }
}
