//! Sequencing of dependent sends: thread creation and crosspost fan-out.
//!
//! Every send returns an immutable [`SendOutcome`] that is threaded through
//! here explicitly; one secondary channel's result can never leak into
//! another's.

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use courier_blocks::{
    assemble, AssembleRequest, Block, FileUploader, Payload, ValidationError,
};
use courier_slack::{ApiClient, BackoffPolicy, DeliveryOptions, SendOutcome, MAX_UPLOAD_BYTES};

use crate::descriptor::{Crosspost, ResolvedRequest};

const CROSSPOST_LINK_TITLE: &str = "original message";

#[derive(Debug)]
pub struct CrosspostOutcome {
    pub channel: String,
    pub result: Result<SendOutcome, String>,
}

#[derive(Debug)]
pub struct RunReport {
    pub primary: SendOutcome,
    pub block_count: usize,
    pub attachment_count: usize,
    pub crossposts: Vec<CrosspostOutcome>,
}

/// Uploads are skipped entirely in dry-run mode, but the pre-flight gates
/// (readability, the size cap) still apply so a dry run validates the input.
struct DryRunUploader;

#[async_trait]
impl FileUploader for DryRunUploader {
    async fn upload_file(
        &self,
        _channel: &str,
        path: &Path,
        filename: &str,
        title: &str,
    ) -> anyhow::Result<Block> {
        let metadata =
            tokio::fs::metadata(path)
                .await
                .map_err(|source| ValidationError::FileUnreadable {
                    path: path.to_path_buf(),
                    detail: source.to_string(),
                })?;
        if metadata.len() > MAX_UPLOAD_BYTES {
            return Err(ValidationError::FileTooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                limit: MAX_UPLOAD_BYTES,
            }
            .into());
        }
        Ok(Block::link(title, format!("https://dry-run.invalid/{filename}")))
    }
}

pub async fn run_send(client: &ApiClient, request: &ResolvedRequest) -> Result<RunReport> {
    let params = &request.params;
    let options = DeliveryOptions {
        dry_run: request.dry_run,
        backoff: BackoffPolicy::default(),
    };
    let dry_run_uploader = DryRunUploader;
    let uploader: &dyn FileUploader = if request.dry_run { &dry_run_uploader } else { client };

    let payload = assemble(
        AssembleRequest {
            channel: &request.channel,
            entries: &params.blocks,
            thread_ts: params.thread_ts.as_deref(),
            create_thread: params.create_thread,
            text: params.text.as_deref(),
        },
        uploader,
    )
    .await?;
    let block_count = payload.combined_block_count();
    let attachment_count = payload.attachments.len();

    // Keep the capture guard alive for the rest of the run; the staging file
    // disappears on every exit path when it drops.
    let _payload_capture = if params.debug {
        Some(capture_payload(&payload)?)
    } else {
        None
    };

    let primary = if params.create_thread && payload.blocks.len() > 1 {
        send_as_thread(client, &payload, &options).await?
    } else {
        client.deliver(&payload, &options).await?
    };
    info!(
        channel = %primary.channel,
        ts = primary.ts.as_deref().unwrap_or("-"),
        dry_run = primary.dry_run,
        "primary send complete"
    );

    let mut crossposts = Vec::new();
    if let Some(crosspost) = &params.crosspost {
        for channel in crosspost.channel_list() {
            let result = send_crosspost(
                client, request, crosspost, &primary, &channel, &options, uploader,
            )
            .await;
            match result {
                Ok(outcome) => {
                    info!(channel = %channel, ts = outcome.ts.as_deref().unwrap_or("-"), "crosspost delivered");
                    crossposts.push(CrosspostOutcome {
                        channel,
                        result: Ok(outcome),
                    });
                }
                Err(error) => {
                    warn!(channel = %channel, error = %format!("{error:#}"), "crosspost failed");
                    crossposts.push(CrosspostOutcome {
                        channel,
                        result: Err(format!("{error:#}")),
                    });
                }
            }
        }
        let failed = crossposts
            .iter()
            .filter(|outcome| outcome.result.is_err())
            .count();
        if crosspost.fail_on_error && failed > 0 {
            bail!(
                "crosspost delivery failed for {failed} of {} channels",
                crossposts.len()
            );
        }
    }

    Ok(RunReport {
        primary,
        block_count,
        attachment_count,
        crossposts,
    })
}

/// Lead with the first block to open the thread, then deliver the remaining
/// blocks (and all attachments) as a reply. The lead outcome is the primary
/// result; its ts is the thread reference.
async fn send_as_thread(
    client: &ApiClient,
    payload: &Payload,
    options: &DeliveryOptions,
) -> Result<SendOutcome, courier_slack::DeliveryError> {
    let mut lead = payload.clone();
    lead.blocks.truncate(1);
    lead.attachments.clear();
    let lead_outcome = client.deliver(&lead, options).await?;

    let mut remainder = payload.clone();
    remainder.blocks.remove(0);
    remainder.thread_ts = lead_outcome.ts.clone();
    remainder.text = None;
    client.deliver(&remainder, options).await?;

    Ok(lead_outcome)
}

#[allow(clippy::too_many_arguments)]
async fn send_crosspost(
    client: &ApiClient,
    request: &ResolvedRequest,
    crosspost: &Crosspost,
    primary: &SendOutcome,
    channel: &str,
    options: &DeliveryOptions,
    uploader: &dyn FileUploader,
) -> Result<SendOutcome> {
    let payload = build_crosspost_payload(request, crosspost, primary, channel, uploader).await?;
    client
        .deliver(&payload, options)
        .await
        .with_context(|| format!("crosspost to {channel} failed"))
}

/// An otherwise-identical copy of the send parameters with the secondary
/// channel substituted. Thread directives do not carry over; a thread
/// reference is scoped to the channel that produced it. Unless suppressed,
/// a back-link to the primary message is appended.
async fn build_crosspost_payload(
    request: &ResolvedRequest,
    crosspost: &Crosspost,
    primary: &SendOutcome,
    channel: &str,
    uploader: &dyn FileUploader,
) -> Result<Payload> {
    let text = crosspost
        .text
        .as_deref()
        .or(request.params.text.as_deref());
    let mut payload = assemble(
        AssembleRequest {
            channel,
            entries: &request.params.blocks,
            thread_ts: None,
            create_thread: false,
            text,
        },
        uploader,
    )
    .await?;
    if !crosspost.no_link {
        if let Some(permalink) = &primary.permalink {
            payload.append_block(Block::link(CROSSPOST_LINK_TITLE, permalink))?;
        }
    }
    Ok(payload)
}

/// Write the assembled payload to an owner-only staging file for inspection.
fn capture_payload(payload: &Payload) -> Result<tempfile::NamedTempFile> {
    let mut capture =
        tempfile::NamedTempFile::new().context("failed to create payload capture file")?;
    serde_json::to_writer_pretty(&mut capture, &payload.to_wire())
        .context("failed to write payload capture file")?;
    capture.flush().context("failed to flush payload capture file")?;
    debug!(path = %capture.path().display(), "captured assembled payload");
    Ok(capture)
}
