//! Durable-link lookup for a just-sent message.

use serde_json::Value;

use crate::client::ApiClient;
use crate::error::DeliveryError;

impl ApiClient {
    /// Single-shot `chat.getPermalink`. Callers treat failures as
    /// non-fatal; there is no retry here.
    pub async fn resolve_permalink(
        &self,
        channel: &str,
        message_ts: &str,
    ) -> Result<String, DeliveryError> {
        let operation = "chat.getPermalink";
        let request = self
            .get(operation)
            .query(&[("channel", channel), ("message_ts", message_ts)]);
        let value = self.execute(operation, request, None).await?;
        value
            .get("permalink")
            .and_then(Value::as_str)
            .filter(|permalink| !permalink.is_empty())
            .map(str::to_string)
            .ok_or_else(|| DeliveryError::Protocol {
                operation,
                status: 200,
                body: "success response was missing permalink".to_string(),
                retry_after: None,
            })
    }
}
