use crate::core::DEFAULT_SPAN;
use crate::playback::ClockMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Timeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Clock unit, fixed for the timeline's lifetime
    pub mode: ClockMode,
    /// Ticks per second
    pub tick_rate: f64,
    pub looping: bool,
    /// Start playing as soon as the timeline is built
    pub autoplay: bool,
    /// End, in ticks, of the default block used when no initial blocks are given
    pub default_length: f64,
    /// Upper bound on ticks a single jump may run
    pub max_jump_ticks: u64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            mode: ClockMode::Frame,
            tick_rate: 60.0,
            looping: true,
            autoplay: true,
            default_length: DEFAULT_SPAN,
            max_jump_ticks: 1_000_000,
        }
    }
}

impl TimelineConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("sketch-timeline").join("settings.json"))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            debug!("No settings at {:?}, using defaults", path);
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring settings: {:#}", e);
                Self::default()
            }
        }
    }

    /// Load from an explicit path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {:?}", path))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings file: {:?}", path))
    }

    /// Save to `path`, creating parent directories
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory: {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write settings file: {:?}", path))?;
        Ok(())
    }
}
