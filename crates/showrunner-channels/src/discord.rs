//! Discord transport — delivery via webhook embeds.

use async_trait::async_trait;

use showrunner_core::config::DiscordConfig;
use showrunner_core::{ChannelTarget, ChannelTransport, Notification, NotifyPriority, TransportError};

use crate::{classify_send_error, retryable_status};

pub struct DiscordTransport {
    config: DiscordConfig,
    client: reqwest::Client,
}

impl DiscordTransport {
    pub fn new(config: DiscordConfig) -> Self {
        Self { config, client: reqwest::Client::new() }
    }

    fn embed_color(priority: &NotifyPriority) -> u32 {
        match priority {
            NotifyPriority::Urgent => 0xFF0000, // Red
            NotifyPriority::High => 0xFF8800,   // Orange
            NotifyPriority::Normal => 0x00AAFF, // Blue
            NotifyPriority::Low => 0x888888,    // Gray
        }
    }
}

#[async_trait]
impl ChannelTransport for DiscordTransport {
    fn name(&self) -> &str {
        "discord"
    }

    async fn send(
        &self,
        target: &ChannelTarget,
        notification: &Notification,
    ) -> Result<(), TransportError> {
        // A per-target address overrides the configured webhook
        let url = target.address.as_deref().unwrap_or(&self.config.webhook_url);
        if url.is_empty() {
            return Err(TransportError::permanent("discord: no webhook url configured"));
        }

        let resp = self
            .client
            .post(url)
            .json(&serde_json::json!({
                "embeds": [{
                    "title": notification.title,
                    "description": notification.body,
                    "color": Self::embed_color(&notification.priority),
                    "footer": {
                        "text": format!(
                            "Source: {} • {}",
                            notification.source,
                            notification.timestamp.format("%H:%M:%S UTC")
                        )
                    }
                }]
            }))
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| classify_send_error(e, "Discord send failed"))?;

        if resp.status().is_success() {
            tracing::debug!("✅ Discord delivery: {}", notification.title);
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(TransportError {
                retryable: retryable_status(status),
                reason: format!("Discord webhook error {status}: {body}"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_track_priority() {
        assert_eq!(DiscordTransport::embed_color(&NotifyPriority::Urgent), 0xFF0000);
        assert_eq!(DiscordTransport::embed_color(&NotifyPriority::Normal), 0x00AAFF);
    }
}
