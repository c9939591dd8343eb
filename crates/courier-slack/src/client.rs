//! HTTP client for the Slack Web API.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{fatal_hint, DeliveryError};

pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// Control calls answer quickly; raw byte uploads get a much longer leash.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// A message the API confirmed it posted.
#[derive(Debug, Clone)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatPostMessageResponse {
    channel: Option<String>,
    ts: Option<String>,
}

pub struct ApiClient {
    pub(crate) http: reqwest::Client,
    api_base: String,
    token: String,
}

impl ApiClient {
    pub fn new(api_base: &str, token: &str) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("slack-courier"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(CONTROL_TIMEOUT)
            .build()
            .context("failed to create api client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
        })
    }

    pub(crate) fn post(&self, method: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}/{}", self.api_base, method))
            .bearer_auth(&self.token)
    }

    pub(crate) fn get(&self, method: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}/{}", self.api_base, method))
            .bearer_auth(&self.token)
    }

    /// Issue one API request and classify the outcome. `payload` is attached
    /// to fatal rejections so the operator sees exactly what was refused.
    pub(crate) async fn execute(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
        payload: Option<&Value>,
    ) -> Result<Value, DeliveryError> {
        let response = request
            .send()
            .await
            .map_err(|source| DeliveryError::Transport { operation, source })?;
        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = response
            .text()
            .await
            .map_err(|source| DeliveryError::Transport { operation, source })?;

        if !status.is_success() {
            return Err(DeliveryError::Protocol {
                operation,
                status: status.as_u16(),
                body: truncate_for_error(&body, 320),
                retry_after,
            });
        }

        let value: Value = serde_json::from_str(&body).map_err(|_| DeliveryError::Protocol {
            operation,
            status: status.as_u16(),
            body: truncate_for_error(&body, 320),
            retry_after: None,
        })?;

        if value.get("ok").and_then(Value::as_bool) == Some(true) {
            return Ok(value);
        }

        let code = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error")
            .to_string();
        if let Some(hint) = fatal_hint(&code) {
            let payload = payload
                .map(Value::to_string)
                .unwrap_or_else(|| "(none)".to_string());
            return Err(DeliveryError::FatalApi {
                operation,
                code,
                hint,
                payload,
            });
        }
        Err(DeliveryError::RetryableApi {
            operation,
            code,
            retry_after,
        })
    }

    /// Single `chat.postMessage` attempt; retry sequencing lives in the
    /// delivery engine. The attempt index rides along as a request header.
    pub(crate) async fn post_message(
        &self,
        body: &Value,
        attempt: usize,
    ) -> Result<PostedMessage, DeliveryError> {
        let operation = "chat.postMessage";
        let request = self
            .post(operation)
            .header(crate::delivery::RETRY_ATTEMPT_HEADER, attempt.to_string())
            .json(body);
        let value = self.execute(operation, request, Some(body)).await?;
        let parsed: ChatPostMessageResponse =
            serde_json::from_value(value).map_err(|_| DeliveryError::Protocol {
                operation,
                status: 200,
                body: "success response had an unexpected shape".to_string(),
                retry_after: None,
            })?;
        let channel = parsed
            .channel
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| {
                body.get("channel")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            });
        let ts = parsed
            .ts
            .filter(|value| !value.is_empty())
            .ok_or_else(|| DeliveryError::Protocol {
                operation,
                status: 200,
                body: "success response was missing ts".to_string(),
                retry_after: None,
            })?;
        Ok(PostedMessage { channel, ts })
    }

    /// `auth.test` reachability and credential probe.
    pub async fn auth_probe(&self) -> Result<String, DeliveryError> {
        let operation = "auth.test";
        let value = self.execute(operation, self.post(operation), None).await?;
        Ok(value
            .get("user_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }
}

pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

pub(crate) fn truncate_for_error(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated: String = value.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}
