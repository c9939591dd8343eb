//! Block model, per-type builders, and payload assembly for slack-courier.

mod assemble;
mod attachment;
mod block;
mod builder;
mod error;
mod rich_text;
mod thread_ref;

pub use assemble::{
    assemble, AssembleError, AssembleRequest, FileUploader, Payload, COMBINED_BLOCK_LIMIT,
    MAX_ATTACHMENTS, MAX_SUMMARY_TEXT_CHARS,
};
pub use attachment::{resolve_color, Attachment};
pub use block::{Block, ContextElement, TextObject};
pub use builder::{build, BlockDescriptor, Built};
pub use error::ValidationError;
pub use rich_text::{extract_literal_text, RICH_TEXT_SPILL_THRESHOLD};
pub use thread_ref::normalize_thread_ts;
