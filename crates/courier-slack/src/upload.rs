//! The external file-upload protocol, driven as an explicit state machine:
//! `Requesting -> Uploading -> Completing -> Done`, with `Failed` reachable
//! from every stage. One session per file, never shared, discarded once the
//! reference block (or the failure) is produced.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use courier_blocks::{Block, FileUploader, ValidationError};

use crate::client::{ApiClient, UPLOAD_TIMEOUT};
use crate::error::DeliveryError;

/// Files beyond 1 GiB are rejected before any network traffic.
pub const MAX_UPLOAD_BYTES: u64 = 1 << 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Requesting,
    Uploading,
    Completing,
    Done,
    Failed,
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Requesting => "requesting",
            Self::Uploading => "uploading",
            Self::Completing => "completing",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

#[derive(Debug)]
struct UploadSession {
    filename: String,
    size: u64,
    state: UploadState,
    file_id: Option<String>,
    upload_url: Option<String>,
}

impl UploadSession {
    fn new(filename: &str, size: u64) -> Self {
        Self {
            filename: filename.to_string(),
            size,
            state: UploadState::Requesting,
            file_id: None,
            upload_url: None,
        }
    }

    fn fail(&self, detail: String) -> DeliveryError {
        DeliveryError::Upload {
            filename: self.filename.clone(),
            stage: self.state,
            detail,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct UploadSlotResponse {
    upload_url: Option<String>,
    file_id: Option<String>,
}

impl ApiClient {
    /// Upload a local file and return the link-styled block referencing it.
    /// Failure at any stage aborts the send that requested the upload; no
    /// degraded block is substituted. An upload left incomplete after bytes
    /// were accepted is NOT deleted remotely; the file id is surfaced so an
    /// operator can act on it.
    pub async fn upload_file_external(
        &self,
        channel: &str,
        path: &Path,
        filename: &str,
        title: &str,
    ) -> Result<Block, DeliveryError> {
        let metadata =
            tokio::fs::metadata(path)
                .await
                .map_err(|source| ValidationError::FileUnreadable {
                    path: path.to_path_buf(),
                    detail: source.to_string(),
                })?;
        let size = metadata.len();
        if size > MAX_UPLOAD_BYTES {
            return Err(ValidationError::FileTooLarge {
                path: path.to_path_buf(),
                size,
                limit: MAX_UPLOAD_BYTES,
            }
            .into());
        }

        let mut session = UploadSession::new(filename, size);
        match self.run_upload(channel, path, title, &mut session).await {
            Ok(block) => {
                session.state = UploadState::Done;
                debug!(filename, size, "upload complete");
                Ok(block)
            }
            Err(error) => {
                warn!(
                    filename,
                    stage = %session.state,
                    file_id = session.file_id.as_deref().unwrap_or("-"),
                    upload_url = session.upload_url.as_deref().unwrap_or("-"),
                    %error,
                    "upload failed"
                );
                session.state = UploadState::Failed;
                Err(error)
            }
        }
    }

    async fn run_upload(
        &self,
        channel: &str,
        path: &Path,
        title: &str,
        session: &mut UploadSession,
    ) -> Result<Block, DeliveryError> {
        // Requesting: ask for an upload slot sized to the local file.
        let operation = "files.getUploadURLExternal";
        let body = json!({ "filename": session.filename, "length": session.size });
        let value = self
            .execute(operation, self.post(operation).json(&body), Some(&body))
            .await?;
        let slot: UploadSlotResponse =
            serde_json::from_value(value).map_err(|_| session.fail("unusable slot response".to_string()))?;
        let upload_url = slot
            .upload_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| session.fail("slot response was missing upload_url".to_string()))?;
        let file_id = slot
            .file_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| session.fail("slot response was missing file_id".to_string()))?;
        session.upload_url = Some(upload_url.clone());
        session.file_id = Some(file_id.clone());
        session.state = UploadState::Uploading;

        // Uploading: raw bytes to the slot URL, long timeout. The textual
        // acknowledgment must echo exactly the byte count we sent.
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ValidationError::FileUnreadable {
                path: path.to_path_buf(),
                detail: source.to_string(),
            })?;
        let response = self
            .http
            .post(&upload_url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .timeout(UPLOAD_TIMEOUT)
            .body(bytes)
            .send()
            .await
            .map_err(|source| DeliveryError::Transport {
                operation: "file upload",
                source,
            })?;
        let status = response.status();
        let ack = response
            .text()
            .await
            .map_err(|source| DeliveryError::Transport {
                operation: "file upload",
                source,
            })?;
        if !status.is_success() {
            return Err(session.fail(format!(
                "upload URL answered status {}: {}",
                status.as_u16(),
                crate::client::truncate_for_error(&ack, 320)
            )));
        }
        match parse_accepted_bytes(&ack) {
            Some(accepted) if accepted == session.size => {}
            Some(accepted) => {
                return Err(session.fail(format!(
                    "upload URL accepted {accepted} bytes but {} were sent",
                    session.size
                )));
            }
            None => {
                return Err(session.fail(format!(
                    "upload URL acknowledgment carried no byte count: {}",
                    crate::client::truncate_for_error(&ack, 320)
                )));
            }
        }
        session.state = UploadState::Completing;

        // Completing: finalize against the channel and require a permalink.
        let operation = "files.completeUploadExternal";
        let body = json!({
            "files": [{ "id": file_id, "title": title }],
            "channel_id": channel,
        });
        let value = self
            .execute(operation, self.post(operation).json(&body), Some(&body))
            .await?;
        let permalink = value
            .get("files")
            .and_then(Value::as_array)
            .and_then(|files| files.first())
            .and_then(|file| file.get("permalink"))
            .and_then(Value::as_str)
            .filter(|permalink| !permalink.is_empty())
            .ok_or_else(|| session.fail("completion response contained no permalink".to_string()))?;

        Ok(Block::link(title, permalink))
    }
}

#[async_trait]
impl FileUploader for ApiClient {
    async fn upload_file(
        &self,
        channel: &str,
        path: &Path,
        filename: &str,
        title: &str,
    ) -> anyhow::Result<Block> {
        self.upload_file_external(channel, path, filename, title)
            .await
            .map_err(Into::into)
    }
}

/// Pull the accepted byte count out of an acknowledgment like `OK - 12345`.
fn parse_accepted_bytes(ack: &str) -> Option<u64> {
    let digits: String = ack
        .chars()
        .skip_while(|ch| !ch.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
