//! Signing-notice delivery to the external notification dispatcher.
//!
//! The dispatcher owns the actual e-mail / WhatsApp / SMS transport; this
//! side only hands it one JSON notice per channel.

use async_trait::async_trait;
use cultura_events::WebhookDelivery;
use cultura_lifecycle::{CollaboratorError, SigningNotice, SigningNotifier};

/// Posts each [`SigningNotice`] to a webhook, with the bus's retry policy.
pub struct WebhookSigningNotifier {
    url: String,
    delivery: WebhookDelivery,
}

impl WebhookSigningNotifier {
    pub fn new(url: impl Into<String>, delivery: WebhookDelivery) -> Self {
        Self {
            url: url.into(),
            delivery,
        }
    }
}

#[async_trait]
impl SigningNotifier for WebhookSigningNotifier {
    async fn notify(&self, notice: &SigningNotice) -> Result<(), CollaboratorError> {
        let payload = serde_json::to_value(notice)
            .map_err(|e| CollaboratorError::Notify(format!("cannot encode notice: {e}")))?;
        self.delivery
            .deliver_json(&self.url, &payload)
            .await
            .map_err(|e| CollaboratorError::Notify(e.to_string()))?;
        tracing::debug!(
            contract_id = notice.contract_id,
            channel = %notice.channel,
            "Signing notice handed to dispatcher"
        );
        Ok(())
    }
}
