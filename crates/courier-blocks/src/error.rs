use std::path::PathBuf;

use thiserror::Error;

/// Input rejections raised before anything touches the network. Never retried.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("channel is required and was not supplied by the descriptor or the environment")]
    MissingChannel,
    #[error("credential is required and was not supplied by the descriptor or the environment")]
    MissingCredential,
    #[error("block {index} ({kind}): {reason}")]
    Block {
        index: usize,
        kind: &'static str,
        reason: String,
    },
    #[error("message carries {count} blocks in total; the limit is {limit}")]
    TooManyBlocks { count: usize, limit: usize },
    #[error("message carries {count} attachments; the limit is {limit}")]
    TooManyAttachments { count: usize, limit: usize },
    #[error("summary text is {length} characters; the limit is {limit}")]
    SummaryTooLong { length: usize, limit: usize },
    #[error("thread_ts and create_thread are mutually exclusive")]
    ConflictingThreadDirectives,
    #[error("thread reference {value:?} is not a message timestamp or permalink")]
    BadThreadReference { value: String },
    #[error("file {path} is {size} bytes; uploads are capped at {limit} bytes")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },
    #[error("file {path} could not be read: {detail}")]
    FileUnreadable { path: PathBuf, detail: String },
}
