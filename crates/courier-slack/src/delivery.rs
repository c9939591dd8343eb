//! The delivery engine: bounded retry around a single message send.

use tracing::{debug, warn};

use courier_blocks::Payload;

use crate::backoff::BackoffPolicy;
use crate::client::ApiClient;
use crate::error::DeliveryError;

/// Each attempt announces its index so observers (and tests) can tell
/// retries apart from first tries.
pub const RETRY_ATTEMPT_HEADER: &str = "x-courier-retry-attempt";

#[derive(Debug, Clone, Default)]
pub struct DeliveryOptions {
    pub dry_run: bool,
    pub backoff: BackoffPolicy,
}

/// Immutable result of one delivery. Orchestration threads these values
/// explicitly; nothing downstream reads a "most recent response" anywhere.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub channel: String,
    pub ts: Option<String>,
    pub permalink: Option<String>,
    pub dry_run: bool,
}

impl ApiClient {
    /// Post an assembled payload, retrying retryable classifications under
    /// the configured backoff policy. On success the permalink is resolved
    /// best-effort; its failure never fails the send.
    pub async fn deliver(
        &self,
        payload: &Payload,
        options: &DeliveryOptions,
    ) -> Result<SendOutcome, DeliveryError> {
        if options.dry_run {
            debug!(channel = %payload.channel, "dry run, skipping delivery");
            return Ok(SendOutcome {
                channel: payload.channel.clone(),
                ts: None,
                permalink: None,
                dry_run: true,
            });
        }

        let body = payload.to_wire();
        let mut attempt = 0_usize;
        let posted = loop {
            attempt += 1;
            match self.post_message(&body, attempt).await {
                Ok(posted) => break posted,
                Err(error) if error.is_retryable() && attempt < options.backoff.max_attempts => {
                    let delay = options.backoff.delay_for(attempt, error.retry_after());
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        };

        let permalink = match self.resolve_permalink(&posted.channel, &posted.ts).await {
            Ok(permalink) => Some(permalink),
            Err(error) => {
                warn!(%error, "permalink lookup failed, continuing without one");
                None
            }
        };

        Ok(SendOutcome {
            channel: posted.channel,
            ts: Some(posted.ts),
            permalink,
            dry_run: false,
        })
    }
}
