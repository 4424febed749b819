//! Webhook delivery with exponential-backoff retry.
//!
//! [`WebhookDelivery`] POSTs JSON to an external URL. Failed attempts are
//! retried three times with backoff (1 s, 2 s, 4 s). [`WebhookSubscriber`]
//! plugs it into the [`SubscriberRegistry`](crate::SubscriberRegistry).

use std::time::Duration;

use async_trait::async_trait;

use crate::bus::LifecycleEvent;
use crate::subscriber::{EventSubscriber, SubscriberError};

/// Retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for webhook delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// WebhookDelivery
// ---------------------------------------------------------------------------

/// Delivers JSON payloads to webhook endpoints.
#[derive(Clone)]
pub struct WebhookDelivery {
    client: reqwest::Client,
    retry_delays: Vec<Duration>,
}

impl WebhookDelivery {
    /// Create a delivery service with the default retry schedule.
    pub fn new() -> Self {
        Self::with_retry_delays(
            RETRY_DELAYS_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        )
    }

    /// Create a delivery service with a custom retry schedule.
    pub fn with_retry_delays(retry_delays: Vec<Duration>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            retry_delays,
        }
    }

    /// Deliver a lifecycle event.
    pub async fn deliver(&self, url: &str, event: &LifecycleEvent) -> Result<(), WebhookError> {
        let payload = serde_json::json!({
            "event_type": event.event_type,
            "subject_kind": event.subject_kind,
            "subject_id": event.subject_id,
            "actor_id": event.actor_id,
            "payload": event.payload,
            "occurred_at": event.occurred_at,
        });
        self.deliver_json(url, &payload).await
    }

    /// POST an arbitrary JSON payload with retry.
    ///
    /// Returns `Ok(())` on the first successful attempt.
    pub async fn deliver_json(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<(), WebhookError> {
        let mut last_err: Option<WebhookError> = None;

        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            match self.try_send(url, payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url,
                        error = %e,
                        "Webhook delivery attempt failed, retrying"
                    );
                    last_err = Some(e);
                    tokio::time::sleep(*delay).await;
                }
            }
        }

        // Final attempt after the last backoff.
        match self.try_send(url, payload).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(url, error = %e, "Webhook delivery failed after all retries");
                Err(last_err.unwrap_or(e))
            }
        }
    }

    async fn try_send(&self, url: &str, payload: &serde_json::Value) -> Result<(), WebhookError> {
        let response = self.client.post(url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

impl Default for WebhookDelivery {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// WebhookSubscriber
// ---------------------------------------------------------------------------

/// Forwards lifecycle events to the external notification dispatcher.
pub struct WebhookSubscriber {
    url: String,
    delivery: WebhookDelivery,
    /// Event types to forward; `None` forwards everything.
    event_types: Option<Vec<String>>,
}

impl WebhookSubscriber {
    pub fn new(url: impl Into<String>, delivery: WebhookDelivery) -> Self {
        Self {
            url: url.into(),
            delivery,
            event_types: None,
        }
    }

    /// Restrict forwarding to the given event types.
    pub fn only(mut self, event_types: &[&str]) -> Self {
        self.event_types = Some(event_types.iter().map(|t| (*t).to_string()).collect());
        self
    }
}

#[async_trait]
impl EventSubscriber for WebhookSubscriber {
    fn name(&self) -> &str {
        "webhook"
    }

    fn accepts(&self, event_type: &str) -> bool {
        self.event_types
            .as_ref()
            .map_or(true, |types| types.iter().any(|t| t == event_type))
    }

    async fn handle(&self, event: &LifecycleEvent) -> Result<(), SubscriberError> {
        self.delivery.deliver(&self.url, event).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_does_not_panic() {
        let _delivery = WebhookDelivery::new();
    }

    #[test]
    fn webhook_error_display_http_status() {
        let err = WebhookError::HttpStatus(502);
        assert_eq!(err.to_string(), "Webhook returned HTTP 502");
    }

    #[test]
    fn webhook_error_display_request() {
        let req_err = reqwest::Client::new().get("://bad").build().unwrap_err();
        let err = WebhookError::Request(req_err);
        assert!(err.to_string().contains("HTTP request failed"));
    }

    #[test]
    fn subscriber_filter() {
        let all = WebhookSubscriber::new("http://localhost/hook", WebhookDelivery::new());
        assert!(all.accepts("call.finished"));

        let signed_only = WebhookSubscriber::new("http://localhost/hook", WebhookDelivery::new())
            .only(&["contract.signed"]);
        assert!(signed_only.accepts("contract.signed"));
        assert!(!signed_only.accepts("contract.sent"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_after_retries() {
        let delivery = WebhookDelivery::with_retry_delays(vec![Duration::from_millis(1)]);
        let result = delivery
            .deliver_json("http://127.0.0.1:9/unreachable", &serde_json::json!({}))
            .await;
        assert!(matches!(result, Err(WebhookError::Request(_))));
    }
}
