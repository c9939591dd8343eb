//! Payload assembly: descriptor entries in, a validated wire payload out.

use std::io::Write;
use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::attachment::Attachment;
use crate::block::Block;
use crate::builder::{build, BlockDescriptor, Built};
use crate::error::ValidationError;
use crate::thread_ref::normalize_thread_ts;

/// Combined ceiling across top-level and attachment-embedded blocks.
pub const COMBINED_BLOCK_LIMIT: usize = 50;
pub const MAX_ATTACHMENTS: usize = 20;
pub const MAX_SUMMARY_TEXT_CHARS: usize = 40_000;

const SPILLOVER_FILENAME: &str = "message-text.txt";

/// Seam between assembly and the remote upload protocol, so oversized
/// rich text and `file` entries can be exercised in tests with a fake.
#[async_trait]
pub trait FileUploader: Send + Sync {
    /// Upload a local file and return the block that references it.
    async fn upload_file(
        &self,
        channel: &str,
        path: &Path,
        filename: &str,
        title: &str,
    ) -> anyhow::Result<Block>;
}

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("upload for block {index} failed: {source}")]
    Upload {
        index: usize,
        #[source]
        source: anyhow::Error,
    },
}

/// A fully assembled outbound message, owned by a single invocation.
#[derive(Debug, Clone)]
pub struct Payload {
    pub channel: String,
    pub blocks: Vec<Block>,
    pub attachments: Vec<Attachment>,
    pub thread_ts: Option<String>,
    pub text: Option<String>,
}

impl Payload {
    pub fn combined_block_count(&self) -> usize {
        self.blocks.len()
            + self
                .attachments
                .iter()
                .map(|attachment| attachment.blocks.len())
                .sum::<usize>()
    }

    /// Append a block after assembly, re-checking the combined ceiling.
    pub fn append_block(&mut self, block: Block) -> Result<(), ValidationError> {
        let count = self.combined_block_count() + 1;
        if count > COMBINED_BLOCK_LIMIT {
            return Err(ValidationError::TooManyBlocks {
                count,
                limit: COMBINED_BLOCK_LIMIT,
            });
        }
        self.blocks.push(block);
        Ok(())
    }

    pub fn to_wire(&self) -> Value {
        let mut wire = json!({
            "channel": self.channel,
            "blocks": self.blocks.iter().map(Block::to_wire).collect::<Vec<_>>(),
            "attachments": self
                .attachments
                .iter()
                .map(Attachment::to_wire)
                .collect::<Vec<_>>(),
            "unfurl_links": false,
            "unfurl_media": false,
        });
        if let Some(thread_ts) = &self.thread_ts {
            wire["thread_ts"] = Value::String(thread_ts.clone());
        }
        if let Some(text) = &self.text {
            wire["text"] = Value::String(text.clone());
        }
        wire
    }
}

pub struct AssembleRequest<'a> {
    pub channel: &'a str,
    pub entries: &'a [BlockDescriptor],
    pub thread_ts: Option<&'a str>,
    pub create_thread: bool,
    pub text: Option<&'a str>,
}

/// Build every entry, route colored blocks and tables into attachments, and
/// enforce the payload-wide limits. Thread directives are validated before
/// the first entry is built so a conflicting descriptor never reaches the
/// network through a spillover upload.
pub async fn assemble(
    request: AssembleRequest<'_>,
    uploader: &dyn FileUploader,
) -> Result<Payload, AssembleError> {
    if request.create_thread && request.thread_ts.is_some() {
        return Err(ValidationError::ConflictingThreadDirectives.into());
    }
    let thread_ts = request
        .thread_ts
        .map(normalize_thread_ts)
        .transpose()
        .map_err(AssembleError::from)?;
    if let Some(text) = request.text {
        let length = text.chars().count();
        if length > MAX_SUMMARY_TEXT_CHARS {
            return Err(ValidationError::SummaryTooLong {
                length,
                limit: MAX_SUMMARY_TEXT_CHARS,
            }
            .into());
        }
    }

    let mut blocks = Vec::new();
    let mut attachments = Vec::new();

    for (index, entry) in request.entries.iter().enumerate() {
        let (block, color) = match build(index, entry)? {
            Built::Plain(block) => (block, None),
            Built::Attached(block, color) => {
                attachments.push(Attachment::single(block, color));
                continue;
            }
            Built::Upload { path, title, color } => {
                let filename = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| title.clone());
                let block = uploader
                    .upload_file(request.channel, &path, &filename, &title)
                    .await
                    .map_err(|source| AssembleError::Upload { index, source })?;
                (block, color)
            }
            Built::Spill { text, color } => {
                let block = upload_spillover(request.channel, index, &text, uploader).await?;
                (block, color)
            }
        };
        match color {
            Some(color) => attachments.push(Attachment::single(block, Some(color))),
            None => blocks.push(block),
        }
    }

    if attachments.len() > MAX_ATTACHMENTS {
        return Err(ValidationError::TooManyAttachments {
            count: attachments.len(),
            limit: MAX_ATTACHMENTS,
        }
        .into());
    }
    let combined = blocks.len()
        + attachments
            .iter()
            .map(|attachment| attachment.blocks.len())
            .sum::<usize>();
    if combined > COMBINED_BLOCK_LIMIT {
        return Err(ValidationError::TooManyBlocks {
            count: combined,
            limit: COMBINED_BLOCK_LIMIT,
        }
        .into());
    }

    Ok(Payload {
        channel: request.channel.to_string(),
        blocks,
        attachments,
        thread_ts,
        text: request.text.map(str::to_string),
    })
}

/// Stage oversized rich text in an owner-only temp file and upload it. The
/// staging file is removed when the guard drops, on every exit path.
async fn upload_spillover(
    channel: &str,
    index: usize,
    text: &str,
    uploader: &dyn FileUploader,
) -> Result<Block, AssembleError> {
    let mut staged = tempfile::NamedTempFile::new().map_err(|source| AssembleError::Upload {
        index,
        source: anyhow::Error::new(source).context("failed to create spillover staging file"),
    })?;
    staged
        .write_all(text.as_bytes())
        .and_then(|()| staged.flush())
        .map_err(|source| AssembleError::Upload {
            index,
            source: anyhow::Error::new(source).context("failed to write spillover staging file"),
        })?;
    debug!(chars = text.chars().count(), "spilling oversized rich text to an upload");
    uploader
        .upload_file(channel, staged.path(), SPILLOVER_FILENAME, SPILLOVER_FILENAME)
        .await
        .map_err(|source| AssembleError::Upload { index, source })
}
