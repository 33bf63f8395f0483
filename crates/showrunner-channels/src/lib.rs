//! # Showrunner Channels
//!
//! Outbound transports the engine can deliver to: Telegram Bot API,
//! Discord webhook, generic HTTP webhook. Each one classifies its
//! failures for the retry queue — an unreachable API is retryable, a
//! malformed address is not.

pub mod discord;
pub mod telegram;
pub mod webhook;

pub use discord::DiscordTransport;
pub use telegram::TelegramTransport;
pub use webhook::WebhookTransport;

use std::sync::Arc;

use showrunner_core::config::ChannelConfig;
use showrunner_core::{ChannelTransport, TransportError};

/// Whether an HTTP status is worth re-attempting later. Server-side
/// trouble and throttling pass; other client errors mean the request
/// itself is wrong and will never succeed.
pub(crate) fn retryable_status(status: reqwest::StatusCode) -> bool {
    status.is_server_error()
        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
}

/// Map a reqwest-level failure (no HTTP status) to a transport error.
/// Network-shaped failures are retryable; a request we could not even
/// build is not.
pub(crate) fn classify_send_error(e: reqwest::Error, what: &str) -> TransportError {
    if e.is_builder() {
        TransportError::permanent(format!("{what}: {e}"))
    } else {
        TransportError::retryable(format!("{what}: {e}"))
    }
}

/// Build enabled transports from channel configuration. Called once at
/// startup to populate the transport registry.
pub fn transports_from_config(config: &ChannelConfig) -> Vec<Arc<dyn ChannelTransport>> {
    let mut transports: Vec<Arc<dyn ChannelTransport>> = Vec::new();

    if let Some(tg) = &config.telegram
        && tg.enabled
        && !tg.bot_token.is_empty()
    {
        transports.push(Arc::new(TelegramTransport::new(tg.clone())));
    }

    if let Some(dc) = &config.discord
        && dc.enabled
        && !dc.webhook_url.is_empty()
    {
        transports.push(Arc::new(DiscordTransport::new(dc.clone())));
    }

    if let Some(wh) = &config.webhook
        && wh.enabled
        && !wh.url.is_empty()
    {
        transports.push(Arc::new(WebhookTransport::new(wh.clone())));
    }

    transports
}

#[cfg(test)]
mod tests {
    use super::*;
    use showrunner_core::config::{DiscordConfig, TelegramConfig, WebhookConfig};

    #[test]
    fn status_classification() {
        use reqwest::StatusCode;
        assert!(retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(retryable_status(StatusCode::BAD_GATEWAY));
        assert!(retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!retryable_status(StatusCode::BAD_REQUEST));
        assert!(!retryable_status(StatusCode::NOT_FOUND));
        assert!(!retryable_status(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn disabled_and_empty_channels_are_skipped() {
        let config = ChannelConfig {
            telegram: Some(TelegramConfig {
                bot_token: "t0k3n".into(),
                chat_id: "-100123".into(),
                enabled: false,
            }),
            discord: Some(DiscordConfig { webhook_url: String::new(), enabled: true }),
            webhook: Some(WebhookConfig {
                url: "https://hooks.example.com/notify".into(),
                headers: vec![],
                enabled: true,
            }),
        };
        let transports = transports_from_config(&config);
        assert_eq!(transports.len(), 1);
        assert_eq!(transports[0].name(), "webhook");
    }
}
