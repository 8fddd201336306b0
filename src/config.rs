// Application configuration - RON file with serde defaults for every field

use crate::clock::{DEFAULT_BPM, SyncMode};
use crate::midi::{ClockIo, InputPort, OutputPort, OutputSet, PortBindings, RoutingMatrix};
use crate::osc::{DEFAULT_MAX_PEERS, DEFAULT_OSC_PORT};
use crate::preset::PresetStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_LOG_FILTER: &str = "euclidio=info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("RON error: {0}")]
    Serialize(#[from] ron::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bpm: f32,
    pub sync_mode: SyncMode,
    /// Accepted clock inputs and the interface classes that echo real-time bytes
    pub clock_io: ClockIo,
    pub note_outputs: OutputSet,
    /// Ports that receive real-time bytes, narrowed further by `clock_io`
    pub clock_outputs: OutputSet,
    pub feedback_outputs: OutputSet,
    /// Initial routing matrix entries
    pub routes: Vec<(InputPort, OutputPort)>,
    /// 0 disables OSC
    pub osc_port: u16,
    pub osc_max_peers: usize,
    pub osc_peer_timeout_secs: u64,
    pub ports: PortBindings,
    pub preset_dir: Option<PathBuf>,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            sync_mode: SyncMode::Master,
            clock_io: ClockIo::default(),
            note_outputs: OutputSet::ALL,
            clock_outputs: OutputSet::ALL,
            feedback_outputs: OutputSet::ALL,
            routes: Vec::new(),
            osc_port: DEFAULT_OSC_PORT,
            osc_max_peers: DEFAULT_MAX_PEERS,
            osc_peer_timeout_secs: 120,
            ports: PortBindings::default(),
            preset_dir: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AppConfig {
    /// `<config dir>/euclidio/config.ron`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("euclidio").join("config.ron"))
    }

    /// Missing file gives the defaults; a malformed one is an error
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    pub fn routing(&self) -> RoutingMatrix {
        let mut routing = RoutingMatrix::new();
        for (input, output) in &self.routes {
            routing.set(*input, *output, true);
        }
        routing
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_secs(self.osc_peer_timeout_secs)
    }

    pub fn preset_store(&self) -> PresetStore {
        match &self.preset_dir {
            Some(dir) => PresetStore::new(dir),
            None => PresetStore::new(PresetStore::default_dir()),
        }
    }
}
