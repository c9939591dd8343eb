//! Slack Web API client for slack-courier: the delivery engine with retry
//! and failure classification, the permalink resolver, and the external
//! file-upload protocol.

mod backoff;
mod client;
mod delivery;
mod error;
mod permalink;
mod upload;


pub use backoff::BackoffPolicy;
pub use client::{ApiClient, PostedMessage, DEFAULT_API_BASE};
pub use delivery::{DeliveryOptions, SendOutcome, RETRY_ATTEMPT_HEADER};
pub use error::DeliveryError;
pub use upload::{UploadState, MAX_UPLOAD_BYTES};
