//! Showrunners configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::ChannelTarget;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowrunnersConfig {
    /// Where the engine keeps its SQLite database.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    /// One entry per showrunner; iterated at startup to spawn loops.
    #[serde(default)]
    pub showrunners: Vec<ShowrunnerEntry>,
}

fn default_data_dir() -> String {
    "~/.showrunners".into()
}

impl Default for ShowrunnersConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            health: HealthConfig::default(),
            retry: RetryConfig::default(),
            channel: ChannelConfig::default(),
            showrunners: Vec::new(),
        }
    }
}

impl ShowrunnersConfig {
    /// Load config from the default path (~/.showrunners/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Read(e.to_string()))?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(&path, content).map_err(|e| ConfigError::Read(e.to_string()))
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the showrunners home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".showrunners")
    }
}

/// Liveness endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_health_port")]
    pub port: u16,
}

fn default_health_port() -> u16 {
    8080
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { enabled: true, port: default_health_port() }
    }
}

/// Retry queue and sweeper tuning.
///
/// Attempt n (0-indexed) becomes eligible `base_delay * 2^n` after its
/// last attempt, capped at `max_delay`. These are deliberately tunable —
/// nothing in the engine hardcodes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_sweeper_interval")]
    pub sweeper_interval_secs: u64,
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Days to keep dead-lettered attempts for audit. 0 = keep forever.
    #[serde(default = "default_retention_days")]
    pub dead_letter_retention_days: u32,
}

fn default_sweeper_interval() -> u64 {
    30
}
fn default_base_delay() -> u64 {
    60
}
fn default_max_delay() -> u64 {
    3600
}
fn default_max_attempts() -> u32 {
    5
}
fn default_retention_days() -> u32 {
    14
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            sweeper_interval_secs: default_sweeper_interval(),
            base_delay_secs: default_base_delay(),
            max_delay_secs: default_max_delay(),
            max_attempts: default_max_attempts(),
            dead_letter_retention_days: default_retention_days(),
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs(self.base_delay_secs)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}

/// Channel transport configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub discord: Option<DiscordConfig>,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
}

/// Telegram Bot API transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Default chat when a target carries no address of its own.
    #[serde(default)]
    pub chat_id: String,
    #[serde(default = "bool_true")]
    pub enabled: bool,
}

/// Discord webhook transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub webhook_url: String,
    #[serde(default = "bool_true")]
    pub enabled: bool,
}

/// Generic HTTP webhook transport — POST with JSON body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default = "bool_true")]
    pub enabled: bool,
}

/// One registered showrunner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowrunnerEntry {
    /// Unique name — also the checkpoint key.
    pub name: String,
    /// Source adapter kind: "price-feed" or "heartbeat".
    pub kind: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Source endpoint, for kinds that poll one (price-feed).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// JSON field holding the observed value at the endpoint.
    #[serde(default = "default_field")]
    pub field: String,
    /// Movement (percent) that counts as an event for price-feed sources.
    #[serde(default = "default_delta_pct")]
    pub delta_pct: f64,
    /// Channels this showrunner notifies.
    #[serde(default)]
    pub channels: Vec<ChannelTarget>,
}

fn default_poll_interval() -> u64 {
    300
}
fn default_field() -> String {
    "price".into()
}
fn default_delta_pct() -> f64 {
    1.0
}

impl ShowrunnerEntry {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn bool_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ShowrunnersConfig::default();
        assert!(config.health.enabled);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay(), Duration::from_secs(60));
        assert!(config.showrunners.is_empty());
    }

    #[test]
    fn parses_minimal_toml() {
        let toml = r#"
            [[showrunners]]
            name = "gas-price"
            kind = "price-feed"
            endpoint = "https://example.com/gas"
            poll_interval_secs = 120

            [[showrunners.channels]]
            channel = "telegram"
            address = "-100123"

            [channel.telegram]
            bot_token = "t0k3n"
            chat_id = "-100456"
        "#;
        let config: ShowrunnersConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.showrunners.len(), 1);
        let sr = &config.showrunners[0];
        assert_eq!(sr.name, "gas-price");
        assert_eq!(sr.poll_interval(), Duration::from_secs(120));
        assert_eq!(sr.delta_pct, 1.0);
        assert_eq!(sr.channels[0].address.as_deref(), Some("-100123"));
        assert!(config.channel.telegram.unwrap().enabled);
        // Unconfigured sections fall back to defaults
        assert_eq!(config.retry.sweeper_interval_secs, 30);
    }
}
