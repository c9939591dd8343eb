use std::time::Duration;

use thiserror::Error;

use courier_blocks::ValidationError;

use crate::upload::UploadState;

/// Everything that can go wrong between an assembled payload and a delivered
/// message. The variant decides whether the delivery engine retries.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Malformed or over-limit input. Reported immediately, never retried.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Connection-level failure before a response arrived.
    #[error("transport failure during {operation}: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// The remote answered, but not with anything we can interpret.
    #[error("{operation} returned an unusable response (status {status}): {body}")]
    Protocol {
        operation: &'static str,
        status: u16,
        body: String,
        retry_after: Option<u64>,
    },
    /// The API rejected the request for a reason retrying cannot fix.
    #[error("{operation} was rejected with `{code}`: {hint} (offending payload: {payload})")]
    FatalApi {
        operation: &'static str,
        code: String,
        hint: &'static str,
        payload: String,
    },
    /// Rate limiting and any error code we do not recognize.
    #[error("{operation} failed with retryable `{code}`")]
    RetryableApi {
        operation: &'static str,
        code: String,
        retry_after: Option<u64>,
    },
    /// The upload state machine broke down mid-protocol.
    #[error("upload of {filename} failed during {stage}: {detail}")]
    Upload {
        filename: String,
        stage: UploadState,
        detail: String,
    },
}

impl DeliveryError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Protocol { .. } | Self::RetryableApi { .. }
        )
    }

    /// Server-requested delay, when the failing response carried one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Protocol { retry_after, .. } | Self::RetryableApi { retry_after, .. } => {
                retry_after.map(Duration::from_secs)
            }
            _ => None,
        }
    }
}

/// Remediation guidance for error codes that retrying cannot fix; `None`
/// means the code is treated as retryable.
pub(crate) fn fatal_hint(code: &str) -> Option<&'static str> {
    match code {
        "invalid_auth" | "not_authed" | "account_inactive" | "token_revoked"
        | "token_expired" => Some("check that the credential is a valid, active bot token"),
        "missing_scope" => {
            Some("the token lacks a required OAuth scope (chat:write for messages, files:write for uploads)")
        }
        "channel_not_found" => {
            Some("the channel does not exist or the bot cannot see it; check the channel name or id")
        }
        "not_in_channel" => Some("the bot is not a member of the channel; invite it before posting"),
        "invalid_blocks" | "invalid_blocks_format" => {
            Some("the blocks array was rejected by the API; inspect the offending payload")
        }
        "invalid_attachments" => {
            Some("the attachments array was rejected by the API; inspect the offending payload")
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{fatal_hint, DeliveryError};
    use std::time::Duration;

    #[test]
    fn unit_fatal_codes_are_recognized_and_unknown_codes_are_not() {
        assert!(fatal_hint("invalid_auth").is_some());
        assert!(fatal_hint("missing_scope").is_some());
        assert!(fatal_hint("not_in_channel").is_some());
        assert!(fatal_hint("invalid_blocks").is_some());
        assert!(fatal_hint("ratelimited").is_none());
        assert!(fatal_hint("some_future_code").is_none());
    }

    #[test]
    fn unit_classification_controls_retry_eligibility() {
        let retryable = DeliveryError::RetryableApi {
            operation: "chat.postMessage",
            code: "ratelimited".to_string(),
            retry_after: Some(7),
        };
        assert!(retryable.is_retryable());
        assert_eq!(retryable.retry_after(), Some(Duration::from_secs(7)));

        let fatal = DeliveryError::FatalApi {
            operation: "chat.postMessage",
            code: "invalid_auth".to_string(),
            hint: "check the credential",
            payload: "{}".to_string(),
        };
        assert!(!fatal.is_retryable());
        assert_eq!(fatal.retry_after(), None);
    }
}
