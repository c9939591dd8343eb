//! Wire-level block variants and their JSON rendering.

use serde_json::{json, Value};

/// A text object as the message API expects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextObject {
    Plain(String),
    Mrkdwn(String),
}

impl TextObject {
    pub fn text(&self) -> &str {
        match self {
            Self::Plain(text) | Self::Mrkdwn(text) => text,
        }
    }

    pub fn to_wire(&self) -> Value {
        match self {
            Self::Plain(text) => json!({ "type": "plain_text", "text": text }),
            Self::Mrkdwn(text) => json!({ "type": "mrkdwn", "text": text }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextElement {
    Text(TextObject),
    Image { image_url: String, alt_text: String },
}

impl ContextElement {
    fn to_wire(&self) -> Value {
        match self {
            Self::Text(text) => text.to_wire(),
            Self::Image {
                image_url,
                alt_text,
            } => json!({ "type": "image", "image_url": image_url, "alt_text": alt_text }),
        }
    }
}

/// One formatted unit of a message body.
///
/// `FileLink` is the reference block produced by a completed upload; it
/// renders as a link-styled section rather than carrying its own wire type.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Section {
        text: Option<TextObject>,
        fields: Vec<TextObject>,
        block_id: Option<String>,
    },
    Header {
        text: String,
        block_id: Option<String>,
    },
    Divider {
        block_id: Option<String>,
    },
    Context {
        elements: Vec<ContextElement>,
        block_id: Option<String>,
    },
    Markdown {
        text: String,
        block_id: Option<String>,
    },
    Actions {
        elements: Vec<Value>,
        block_id: Option<String>,
    },
    Image {
        image_url: String,
        alt_text: String,
        title: Option<String>,
        block_id: Option<String>,
    },
    Video {
        title: String,
        video_url: String,
        thumbnail_url: String,
        alt_text: String,
        description: Option<String>,
        block_id: Option<String>,
    },
    RichText {
        elements: Vec<Value>,
        block_id: Option<String>,
    },
    Table {
        rows: Vec<Vec<String>>,
        block_id: Option<String>,
    },
    FileLink {
        title: String,
        permalink: String,
    },
}

impl Block {
    /// A link-styled block pointing at an already-hosted resource.
    pub fn link(title: impl Into<String>, permalink: impl Into<String>) -> Self {
        Self::FileLink {
            title: title.into(),
            permalink: permalink.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Section { .. } => "section",
            Self::Header { .. } => "header",
            Self::Divider { .. } => "divider",
            Self::Context { .. } => "context",
            Self::Markdown { .. } => "markdown",
            Self::Actions { .. } => "actions",
            Self::Image { .. } => "image",
            Self::Video { .. } => "video",
            Self::RichText { .. } => "rich_text",
            Self::Table { .. } => "table",
            Self::FileLink { .. } => "file_link",
        }
    }

    pub fn to_wire(&self) -> Value {
        let mut wire = match self {
            Self::Section { text, fields, .. } => {
                let mut value = json!({ "type": "section" });
                if let Some(text) = text {
                    value["text"] = text.to_wire();
                }
                if !fields.is_empty() {
                    value["fields"] =
                        Value::Array(fields.iter().map(TextObject::to_wire).collect());
                }
                value
            }
            Self::Header { text, .. } => {
                json!({ "type": "header", "text": { "type": "plain_text", "text": text } })
            }
            Self::Divider { .. } => json!({ "type": "divider" }),
            Self::Context { elements, .. } => json!({
                "type": "context",
                "elements": elements.iter().map(ContextElement::to_wire).collect::<Vec<_>>(),
            }),
            Self::Markdown { text, .. } => json!({ "type": "markdown", "text": text }),
            Self::Actions { elements, .. } => {
                json!({ "type": "actions", "elements": elements })
            }
            Self::Image {
                image_url,
                alt_text,
                title,
                ..
            } => {
                let mut value = json!({
                    "type": "image",
                    "image_url": image_url,
                    "alt_text": alt_text,
                });
                if let Some(title) = title {
                    value["title"] = json!({ "type": "plain_text", "text": title });
                }
                value
            }
            Self::Video {
                title,
                video_url,
                thumbnail_url,
                alt_text,
                description,
                ..
            } => {
                let mut value = json!({
                    "type": "video",
                    "title": { "type": "plain_text", "text": title },
                    "video_url": video_url,
                    "thumbnail_url": thumbnail_url,
                    "alt_text": alt_text,
                });
                if let Some(description) = description {
                    value["description"] = json!({ "type": "plain_text", "text": description });
                }
                value
            }
            Self::RichText { elements, .. } => {
                json!({ "type": "rich_text", "elements": elements })
            }
            Self::Table { rows, .. } => json!({
                "type": "table",
                "rows": rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|cell| json!({ "type": "raw_text", "text": cell }))
                            .collect::<Vec<_>>()
                    })
                    .collect::<Vec<_>>(),
            }),
            Self::FileLink { title, permalink } => json!({
                "type": "section",
                "text": { "type": "mrkdwn", "text": format!("<{permalink}|{title}>") },
            }),
        };

        if let Some(block_id) = self.block_id() {
            wire["block_id"] = Value::String(block_id.to_string());
        }
        wire
    }

    fn block_id(&self) -> Option<&str> {
        match self {
            Self::Section { block_id, .. }
            | Self::Header { block_id, .. }
            | Self::Divider { block_id }
            | Self::Context { block_id, .. }
            | Self::Markdown { block_id, .. }
            | Self::Actions { block_id, .. }
            | Self::Image { block_id, .. }
            | Self::Video { block_id, .. }
            | Self::RichText { block_id, .. }
            | Self::Table { block_id, .. } => block_id.as_deref(),
            Self::FileLink { .. } => None,
        }
    }
}
