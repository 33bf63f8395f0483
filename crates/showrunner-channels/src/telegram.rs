//! Telegram transport — delivery via the Bot API `sendMessage`.

use async_trait::async_trait;

use showrunner_core::config::TelegramConfig;
use showrunner_core::{ChannelTarget, ChannelTransport, Notification, NotifyPriority, TransportError};

use crate::{classify_send_error, retryable_status};

pub struct TelegramTransport {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramTransport {
    pub fn new(config: TelegramConfig) -> Self {
        Self { config, client: reqwest::Client::new() }
    }

    fn api_url(&self) -> String {
        format!("https://api.telegram.org/bot{}/sendMessage", self.config.bot_token)
    }

    fn render(notification: &Notification) -> String {
        let priority_emoji = match notification.priority {
            NotifyPriority::Urgent => "🚨",
            NotifyPriority::High => "⚠️",
            NotifyPriority::Normal => "📢",
            NotifyPriority::Low => "ℹ️",
        };
        format!(
            "{} *{}*\n\n{}\n\n_Source: {} • {}_",
            priority_emoji,
            escape_markdown(&notification.title),
            escape_markdown(&notification.body),
            escape_markdown(&notification.source),
            notification.timestamp.format("%H:%M:%S UTC")
        )
    }
}

#[async_trait]
impl ChannelTransport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(
        &self,
        target: &ChannelTarget,
        notification: &Notification,
    ) -> Result<(), TransportError> {
        let chat_id = target.address.as_deref().unwrap_or(&self.config.chat_id);
        if chat_id.is_empty() {
            // No address to deliver to; retrying will not grow one
            return Err(TransportError::permanent("telegram: no chat id configured"));
        }

        let resp = self
            .client
            .post(self.api_url())
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "text": Self::render(notification),
                "parse_mode": "Markdown"
            }))
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| classify_send_error(e, "Telegram send failed"))?;

        if resp.status().is_success() {
            tracing::debug!("✅ Telegram delivery: {}", notification.title);
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(TransportError {
                retryable: retryable_status(status),
                reason: format!("Telegram API error {status}: {body}"),
            })
        }
    }
}

/// Escape Telegram MarkdownV1 special characters.
fn escape_markdown(s: &str) -> String {
    s.replace('_', "\\_")
        .replace('*', "\\*")
        .replace('[', "\\[")
        .replace('`', "\\`")
}
