//! Generic HTTP webhook transport — JSON POST with custom headers.

use async_trait::async_trait;

use showrunner_core::config::WebhookConfig;
use showrunner_core::{ChannelTarget, ChannelTransport, Notification, TransportError};

use crate::{classify_send_error, retryable_status};

pub struct WebhookTransport {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookTransport {
    pub fn new(config: WebhookConfig) -> Self {
        Self { config, client: reqwest::Client::new() }
    }

    fn payload(notification: &Notification) -> serde_json::Value {
        serde_json::json!({
            "title": notification.title,
            "body": notification.body,
            "priority": format!("{:?}", notification.priority).to_lowercase(),
            "source": notification.source,
            "timestamp": notification.timestamp.to_rfc3339(),
        })
    }
}

#[async_trait]
impl ChannelTransport for WebhookTransport {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(
        &self,
        target: &ChannelTarget,
        notification: &Notification,
    ) -> Result<(), TransportError> {
        let url = target.address.as_deref().unwrap_or(&self.config.url);
        if url.is_empty() {
            return Err(TransportError::permanent("webhook: no url configured"));
        }

        let mut req = self
            .client
            .post(url)
            .json(&Self::payload(notification))
            .timeout(std::time::Duration::from_secs(10));
        for (key, value) in &self.config.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        let resp = req.send().await.map_err(|e| classify_send_error(e, "Webhook send failed"))?;

        if resp.status().is_success() {
            tracing::debug!("✅ Webhook delivery to {}: {}", url, notification.title);
            Ok(())
        } else {
            let status = resp.status();
            Err(TransportError {
                retryable: retryable_status(status),
                reason: format!("Webhook error {status}"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use showrunner_core::NotifyPriority;

    #[test]
    fn payload_shape() {
        let n = Notification {
            title: "Gas spike".into(),
            body: "Base fee crossed 80 gwei".into(),
            priority: NotifyPriority::Urgent,
            source: "gas-price".into(),
            timestamp: Utc::now(),
        };
        let payload = WebhookTransport::payload(&n);
        assert_eq!(payload["title"], "Gas spike");
        assert_eq!(payload["priority"], "urgent");
        assert_eq!(payload["source"], "gas-price");
        assert!(payload["timestamp"].as_str().unwrap().contains('T'));
    }
}
