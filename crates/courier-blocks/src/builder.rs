//! Per-type block builders.
//!
//! A descriptor entry such as `{"section": {...}}` deserializes straight into
//! the matching [`BlockDescriptor`] variant, so the catalog of builders is
//! fixed at compile time. Each variant enforces its own field constraints.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;

use crate::block::{Block, ContextElement, TextObject};
use crate::error::ValidationError;
use crate::rich_text::{extract_literal_text, RICH_TEXT_SPILL_THRESHOLD};

const SECTION_TEXT_LIMIT: usize = 3_000;
const SECTION_FIELD_LIMIT: usize = 10;
const SECTION_FIELD_TEXT_LIMIT: usize = 2_000;
const HEADER_TEXT_LIMIT: usize = 150;
const CONTEXT_ELEMENT_LIMIT: usize = 10;
const CONTEXT_TEXT_LIMIT: usize = 2_000;
const MARKDOWN_TEXT_LIMIT: usize = 12_000;
const ACTIONS_ELEMENT_LIMIT: usize = 25;
const IMAGE_URL_LIMIT: usize = 3_000;
const ALT_TEXT_LIMIT: usize = 2_000;
const TITLE_LIMIT: usize = 2_000;
const VIDEO_TITLE_LIMIT: usize = 200;
const TABLE_ROW_LIMIT: usize = 100;
const TABLE_COLUMN_LIMIT: usize = 20;
const TABLE_CELL_TEXT_LIMIT: usize = 2_000;
const BLOCK_ID_LIMIT: usize = 255;

/// Text supplied either as a bare string or as a `{type, text}` object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextInput {
    Object {
        #[serde(rename = "type")]
        kind: Option<String>,
        text: String,
    },
    Plain(String),
}

impl TextInput {
    fn value(&self) -> &str {
        match self {
            Self::Object { text, .. } => text,
            Self::Plain(text) => text,
        }
    }

    fn resolve(&self, default_mrkdwn: bool) -> Result<TextObject, String> {
        let text = self.value().to_string();
        let kind = match self {
            Self::Object { kind, .. } => kind.as_deref(),
            Self::Plain(_) => None,
        };
        match kind {
            Some("plain_text") => Ok(TextObject::Plain(text)),
            Some("mrkdwn") => Ok(TextObject::Mrkdwn(text)),
            None => Ok(if default_mrkdwn {
                TextObject::Mrkdwn(text)
            } else {
                TextObject::Plain(text)
            }),
            Some(other) => Err(format!("unsupported text type {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContextElementInput {
    Image { image_url: String, alt_text: String },
    Text(TextInput),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionDescriptor {
    pub text: Option<TextInput>,
    #[serde(default)]
    pub fields: Vec<TextInput>,
    pub color: Option<String>,
    pub block_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeaderDescriptor {
    pub text: TextInput,
    pub color: Option<String>,
    pub block_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DividerDescriptor {
    pub color: Option<String>,
    pub block_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContextDescriptor {
    pub elements: Vec<ContextElementInput>,
    pub color: Option<String>,
    pub block_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkdownDescriptor {
    pub text: String,
    pub color: Option<String>,
    pub block_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionsDescriptor {
    pub elements: Vec<Value>,
    pub color: Option<String>,
    pub block_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageDescriptor {
    pub image_url: String,
    pub alt_text: String,
    pub title: Option<String>,
    pub color: Option<String>,
    pub block_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoDescriptor {
    pub title: String,
    pub video_url: String,
    pub thumbnail_url: String,
    pub alt_text: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub block_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RichTextDescriptor {
    pub elements: Vec<Value>,
    pub color: Option<String>,
    pub block_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableDescriptor {
    pub rows: Vec<Vec<String>>,
    pub color: Option<String>,
    pub block_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileDescriptor {
    pub path: PathBuf,
    pub title: Option<String>,
    pub color: Option<String>,
}

/// One entry of the descriptor's `blocks` array.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockDescriptor {
    Section(SectionDescriptor),
    Header(HeaderDescriptor),
    Divider(DividerDescriptor),
    Context(ContextDescriptor),
    Markdown(MarkdownDescriptor),
    Actions(ActionsDescriptor),
    Image(ImageDescriptor),
    Video(VideoDescriptor),
    RichText(RichTextDescriptor),
    Table(TableDescriptor),
    File(FileDescriptor),
}

impl BlockDescriptor {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Section(_) => "section",
            Self::Header(_) => "header",
            Self::Divider(_) => "divider",
            Self::Context(_) => "context",
            Self::Markdown(_) => "markdown",
            Self::Actions(_) => "actions",
            Self::Image(_) => "image",
            Self::Video(_) => "video",
            Self::RichText(_) => "rich_text",
            Self::Table(_) => "table",
            Self::File(_) => "file",
        }
    }
}

/// What a builder hands back to the assembler.
#[derive(Debug, Clone)]
pub enum Built {
    /// Goes into the top-level block sequence.
    Plain(Block),
    /// Routed into its own single-block attachment with an optional color.
    Attached(Block, Option<String>),
    /// A local file that must be uploaded; the resulting link block takes
    /// this entry's place.
    Upload {
        path: PathBuf,
        title: String,
        color: Option<String>,
    },
    /// Rich text whose literal content is too large for the wire; the
    /// extracted text must be staged and uploaded instead.
    Spill {
        text: String,
        color: Option<String>,
    },
}

pub fn build(index: usize, descriptor: &BlockDescriptor) -> Result<Built, ValidationError> {
    build_inner(descriptor).map_err(|reason| ValidationError::Block {
        index,
        kind: descriptor.kind(),
        reason,
    })
}

fn build_inner(descriptor: &BlockDescriptor) -> Result<Built, String> {
    match descriptor {
        BlockDescriptor::Section(section) => build_section(section),
        BlockDescriptor::Header(header) => build_header(header),
        BlockDescriptor::Divider(divider) => {
            check_block_id(&divider.block_id)?;
            Ok(route(
                Block::Divider {
                    block_id: divider.block_id.clone(),
                },
                &divider.color,
            ))
        }
        BlockDescriptor::Context(context) => build_context(context),
        BlockDescriptor::Markdown(markdown) => build_markdown(markdown),
        BlockDescriptor::Actions(actions) => build_actions(actions),
        BlockDescriptor::Image(image) => build_image(image),
        BlockDescriptor::Video(video) => build_video(video),
        BlockDescriptor::RichText(rich_text) => build_rich_text(rich_text),
        BlockDescriptor::Table(table) => build_table(table),
        BlockDescriptor::File(file) => build_file(file),
    }
}

fn build_section(section: &SectionDescriptor) -> Result<Built, String> {
    check_block_id(&section.block_id)?;
    if section.text.is_none() && section.fields.is_empty() {
        return Err("requires text or at least one field".to_string());
    }
    let text = section
        .text
        .as_ref()
        .map(|input| {
            check_len("text", input.value(), SECTION_TEXT_LIMIT)?;
            input.resolve(true)
        })
        .transpose()?;
    if section.fields.len() > SECTION_FIELD_LIMIT {
        return Err(format!(
            "holds {} fields; the limit is {SECTION_FIELD_LIMIT}",
            section.fields.len()
        ));
    }
    let fields = section
        .fields
        .iter()
        .map(|input| {
            check_len("field text", input.value(), SECTION_FIELD_TEXT_LIMIT)?;
            input.resolve(true)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(route(
        Block::Section {
            text,
            fields,
            block_id: section.block_id.clone(),
        },
        &section.color,
    ))
}

fn build_header(header: &HeaderDescriptor) -> Result<Built, String> {
    check_block_id(&header.block_id)?;
    let text = header.text.value();
    check_non_empty("text", text)?;
    check_len("text", text, HEADER_TEXT_LIMIT)?;
    // Headers are plain text on the wire regardless of the declared type.
    Ok(route(
        Block::Header {
            text: text.to_string(),
            block_id: header.block_id.clone(),
        },
        &header.color,
    ))
}

fn build_context(context: &ContextDescriptor) -> Result<Built, String> {
    check_block_id(&context.block_id)?;
    if context.elements.is_empty() || context.elements.len() > CONTEXT_ELEMENT_LIMIT {
        return Err(format!(
            "holds {} elements; expected between 1 and {CONTEXT_ELEMENT_LIMIT}",
            context.elements.len()
        ));
    }
    let elements = context
        .elements
        .iter()
        .map(|element| match element {
            ContextElementInput::Image {
                image_url,
                alt_text,
            } => {
                check_non_empty("image_url", image_url)?;
                check_non_empty("alt_text", alt_text)?;
                Ok(ContextElement::Image {
                    image_url: image_url.clone(),
                    alt_text: alt_text.clone(),
                })
            }
            ContextElementInput::Text(input) => {
                check_len("element text", input.value(), CONTEXT_TEXT_LIMIT)?;
                Ok(ContextElement::Text(input.resolve(true)?))
            }
        })
        .collect::<Result<Vec<_>, String>>()?;
    Ok(route(
        Block::Context {
            elements,
            block_id: context.block_id.clone(),
        },
        &context.color,
    ))
}

fn build_markdown(markdown: &MarkdownDescriptor) -> Result<Built, String> {
    check_block_id(&markdown.block_id)?;
    check_non_empty("text", &markdown.text)?;
    check_len("text", &markdown.text, MARKDOWN_TEXT_LIMIT)?;
    Ok(route(
        Block::Markdown {
            text: markdown.text.clone(),
            block_id: markdown.block_id.clone(),
        },
        &markdown.color,
    ))
}

fn build_actions(actions: &ActionsDescriptor) -> Result<Built, String> {
    check_block_id(&actions.block_id)?;
    if actions.elements.is_empty() || actions.elements.len() > ACTIONS_ELEMENT_LIMIT {
        return Err(format!(
            "holds {} elements; expected between 1 and {ACTIONS_ELEMENT_LIMIT}",
            actions.elements.len()
        ));
    }
    for (position, element) in actions.elements.iter().enumerate() {
        let has_type = element
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|kind| !kind.trim().is_empty());
        if !has_type {
            return Err(format!("element {position} is missing a type"));
        }
    }
    Ok(route(
        Block::Actions {
            elements: actions.elements.clone(),
            block_id: actions.block_id.clone(),
        },
        &actions.color,
    ))
}

fn build_image(image: &ImageDescriptor) -> Result<Built, String> {
    check_block_id(&image.block_id)?;
    check_non_empty("image_url", &image.image_url)?;
    check_len("image_url", &image.image_url, IMAGE_URL_LIMIT)?;
    check_non_empty("alt_text", &image.alt_text)?;
    check_len("alt_text", &image.alt_text, ALT_TEXT_LIMIT)?;
    if let Some(title) = &image.title {
        check_len("title", title, TITLE_LIMIT)?;
    }
    Ok(route(
        Block::Image {
            image_url: image.image_url.clone(),
            alt_text: image.alt_text.clone(),
            title: image.title.clone(),
            block_id: image.block_id.clone(),
        },
        &image.color,
    ))
}

fn build_video(video: &VideoDescriptor) -> Result<Built, String> {
    check_block_id(&video.block_id)?;
    check_non_empty("title", &video.title)?;
    check_len("title", &video.title, VIDEO_TITLE_LIMIT)?;
    check_non_empty("video_url", &video.video_url)?;
    check_non_empty("thumbnail_url", &video.thumbnail_url)?;
    check_non_empty("alt_text", &video.alt_text)?;
    check_len("alt_text", &video.alt_text, ALT_TEXT_LIMIT)?;
    if let Some(description) = &video.description {
        check_len("description", description, ALT_TEXT_LIMIT)?;
    }
    Ok(route(
        Block::Video {
            title: video.title.clone(),
            video_url: video.video_url.clone(),
            thumbnail_url: video.thumbnail_url.clone(),
            alt_text: video.alt_text.clone(),
            description: video.description.clone(),
            block_id: video.block_id.clone(),
        },
        &video.color,
    ))
}

fn build_rich_text(rich_text: &RichTextDescriptor) -> Result<Built, String> {
    check_block_id(&rich_text.block_id)?;
    if rich_text.elements.is_empty() {
        return Err("requires at least one element".to_string());
    }
    for (position, element) in rich_text.elements.iter().enumerate() {
        if element.get("type").and_then(Value::as_str).is_none() {
            return Err(format!("element {position} is missing a type"));
        }
    }
    let literal = extract_literal_text(&rich_text.elements);
    if literal.chars().count() > RICH_TEXT_SPILL_THRESHOLD {
        return Ok(Built::Spill {
            text: literal,
            color: clean_color(&rich_text.color),
        });
    }
    Ok(route(
        Block::RichText {
            elements: rich_text.elements.clone(),
            block_id: rich_text.block_id.clone(),
        },
        &rich_text.color,
    ))
}

fn build_table(table: &TableDescriptor) -> Result<Built, String> {
    check_block_id(&table.block_id)?;
    if table.rows.is_empty() || table.rows.len() > TABLE_ROW_LIMIT {
        return Err(format!(
            "holds {} rows; expected between 1 and {TABLE_ROW_LIMIT}",
            table.rows.len()
        ));
    }
    let width = table.rows[0].len();
    if width == 0 || width > TABLE_COLUMN_LIMIT {
        return Err(format!(
            "holds {width} columns; expected between 1 and {TABLE_COLUMN_LIMIT}"
        ));
    }
    for (row_index, row) in table.rows.iter().enumerate() {
        if row.len() != width {
            return Err(format!(
                "row {row_index} holds {} cells; every row must hold {width}",
                row.len()
            ));
        }
        for cell in row {
            check_len("cell text", cell, TABLE_CELL_TEXT_LIMIT)?;
        }
    }
    // Tables always render as an attachment, colored or not.
    Ok(Built::Attached(
        Block::Table {
            rows: table.rows.clone(),
            block_id: table.block_id.clone(),
        },
        clean_color(&table.color),
    ))
}

fn build_file(file: &FileDescriptor) -> Result<Built, String> {
    if file.path.as_os_str().is_empty() {
        return Err("path must not be empty".to_string());
    }
    let title = match &file.title {
        Some(title) if !title.trim().is_empty() => title.clone(),
        _ => file
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| "path has no file name".to_string())?,
    };
    Ok(Built::Upload {
        path: file.path.clone(),
        title,
        color: clean_color(&file.color),
    })
}

fn route(block: Block, color: &Option<String>) -> Built {
    match clean_color(color) {
        Some(color) => Built::Attached(block, Some(color)),
        None => Built::Plain(block),
    }
}

fn clean_color(color: &Option<String>) -> Option<String> {
    color
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn check_len(field: &str, value: &str, limit: usize) -> Result<(), String> {
    let length = value.chars().count();
    if length > limit {
        return Err(format!(
            "{field} is {length} characters; the limit is {limit}"
        ));
    }
    Ok(())
}

fn check_non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    Ok(())
}

fn check_block_id(block_id: &Option<String>) -> Result<(), String> {
    if let Some(block_id) = block_id {
        check_non_empty("block_id", block_id)?;
        check_len("block_id", block_id, BLOCK_ID_LIMIT)?;
    }
    Ok(())
}
