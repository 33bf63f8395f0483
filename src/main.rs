//! # Showrunners
//!
//! Notification engine daemon: spawns one checkpointed polling loop per
//! configured showrunner, dispatches observed events to channels, and
//! runs the retry sweeper over failed deliveries.
//!
//! Usage:
//!   showrunners                          # ~/.showrunners/config.toml
//!   showrunners --config ./dev.toml      # explicit config
//!   showrunners --verbose                # debug logging

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use showrunner_channels::transports_from_config;
use showrunner_core::ShowrunnersConfig;
use showrunner_engine::{
    AnalyticsRecorder, Dispatcher, Engine, RetryPolicy, Showrunner, ShowrunnerRegistry, Sweeper,
    TransportRegistry,
};
use showrunner_store::Store;

mod health;
mod sources;

#[derive(Parser)]
#[command(
    name = "showrunners",
    version,
    about = "🎬 Showrunners — checkpointed pollers, channel dispatch, backed-off retry"
)]
struct Cli {
    /// Path to config.toml (default: ~/.showrunners/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Data directory (overrides config)
    #[arg(long)]
    data_dir: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "showrunners=debug,showrunner_engine=debug,showrunner_store=debug,showrunner_channels=debug"
    } else {
        "showrunners=info,showrunner_engine=info,showrunner_store=info,showrunner_channels=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => ShowrunnersConfig::load_from(Path::new(&expand_path(path)))?,
        None => ShowrunnersConfig::load()?,
    };

    let data_dir = expand_path(cli.data_dir.as_deref().unwrap_or(&config.data_dir));
    let store = Store::open(&Path::new(&data_dir).join("engine.db"))?;

    // Startup audit: where every loop will resume, and what is still owed
    for (name, cursor, updated_at) in store.checkpoints().all()? {
        tracing::info!("📌 Checkpoint: {} @ {} (updated {})", name, cursor, updated_at);
    }
    let pending = store.retries().pending_count()?;
    if pending > 0 {
        tracing::info!("📬 {} notification(s) queued for retry", pending);
    }
    for dead in store.retries().dead_letters(5)? {
        tracing::warn!(
            "💀 Dead-lettered: '{}' → {} ({} attempts)",
            dead.payload.title,
            dead.channel,
            dead.retry_count
        );
    }

    let mut transports = TransportRegistry::new();
    for transport in transports_from_config(&config.channel) {
        tracing::info!("📡 Transport registered: {}", transport.name());
        transports.register(transport);
    }
    let transports = Arc::new(transports);
    if transports.is_empty() {
        tracing::warn!("📡 No transports configured — deliveries will dead-letter");
    }

    let policy = RetryPolicy::from_config(&config.retry);
    let recorder = AnalyticsRecorder::new(store.analytics());
    let dispatcher = Arc::new(Dispatcher::new(
        transports.clone(),
        store.retries(),
        recorder.clone(),
        policy,
    ));

    let cancel = CancellationToken::new();
    let mut registry = ShowrunnerRegistry::new();
    for entry in &config.showrunners {
        let source = sources::build(entry)?;
        registry.register(Showrunner::new(
            &entry.name,
            entry.poll_interval(),
            source,
            entry.channels.clone(),
        ))?;
    }
    if registry.is_empty() {
        tracing::warn!("📭 No showrunners configured — only the sweeper will run");
    }

    let engine = Engine::new(
        registry,
        store.checkpoints(),
        dispatcher,
        recorder.clone(),
        cancel.clone(),
    );
    let mut handles = engine.spawn();

    let sweeper = Sweeper::new(
        store.retries(),
        transports,
        recorder,
        policy,
        Duration::from_secs(config.retry.sweeper_interval_secs),
        config.retry.dead_letter_retention_days,
        cancel.clone(),
    );
    handles.push(sweeper.spawn());

    if config.health.enabled {
        let health_cancel = cancel.clone();
        let port = config.health.port;
        handles.push(tokio::spawn(async move {
            if let Err(e) = health::serve(port, health_cancel).await {
                tracing::warn!("⚠️ Health endpoint failed: {e}");
            }
        }));
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("👋 Shutdown requested — letting in-flight work finish");
    cancel.cancel();
    for handle in handles {
        handle.await.ok();
    }
    tracing::info!("👋 Showrunners stopped");
    Ok(())
}
