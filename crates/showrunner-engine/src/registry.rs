//! Registries wiring names to adapters — populated at startup, no
//! hardcoded dispatch tables.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use showrunner_core::{ChannelTarget, ChannelTransport, EventSource};

/// One registered showrunner: its identity, cadence, source adapter, and
/// the channels it notifies.
pub struct Showrunner {
    /// Unique name — doubles as the checkpoint key.
    pub name: String,
    pub interval: Duration,
    pub source: Arc<dyn EventSource>,
    pub targets: Vec<ChannelTarget>,
}

impl Showrunner {
    pub fn new(
        name: impl Into<String>,
        interval: Duration,
        source: Arc<dyn EventSource>,
        targets: Vec<ChannelTarget>,
    ) -> Self {
        Self { name: name.into(), interval, source, targets }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two loops on one checkpoint key would break single-flight cursor
    /// advancement, so a second registration of a name is refused.
    #[error("showrunner '{0}' is already registered")]
    Duplicate(String),
}

/// Startup registry: showrunner name → (source, dispatch configuration).
/// Iterated once to spawn one scheduler loop per entry.
#[derive(Default)]
pub struct ShowrunnerRegistry {
    entries: Vec<Showrunner>,
}

impl ShowrunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, showrunner: Showrunner) -> Result<(), RegistryError> {
        if self.entries.iter().any(|s| s.name == showrunner.name) {
            return Err(RegistryError::Duplicate(showrunner.name));
        }
        tracing::info!("📅 Showrunner registered: '{}'", showrunner.name);
        self.entries.push(showrunner);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<Showrunner> {
        self.entries
    }
}

/// Channel transports by name, shared by the dispatcher and the sweeper.
#[derive(Default)]
pub struct TransportRegistry {
    map: HashMap<String, Arc<dyn ChannelTransport>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, transport: Arc<dyn ChannelTransport>) {
        self.map.insert(transport.name().to_string(), transport);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ChannelTransport>> {
        self.map.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.map.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
