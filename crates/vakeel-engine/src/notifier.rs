//! Webhook notifier: POSTs status payloads to target URLs.
//!
//! The payload is a single-field JSON document, `{"trigger": "up"}` or
//! `{"trigger": "down"}`. Delivery succeeds when the transport produced a
//! response; the HTTP status code is deliberately not inspected, and all
//! retry logic lives in the state engine.

use async_trait::async_trait;
use serde::Serialize;
use vakeel_core::Status;

use crate::error::Result;

/// Sends a status payload to a webhook URL.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, url: &str, status: Status) -> Result<()>;
}

#[derive(Serialize)]
struct TriggerPayload<'a> {
    trigger: &'a str,
}

/// HTTP notifier backed by a shared [`reqwest::Client`].
pub struct WebhookClient {
    client: reqwest::Client,
}

impl WebhookClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for WebhookClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for WebhookClient {
    async fn send(&self, url: &str, status: Status) -> Result<()> {
        self.client
            .post(url)
            .json(&TriggerPayload {
                trigger: status.as_str(),
            })
            .send()
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_shape() {
        let body = serde_json::to_string(&TriggerPayload { trigger: "down" }).unwrap();
        assert_eq!(body, r#"{"trigger":"down"}"#);
    }
}
