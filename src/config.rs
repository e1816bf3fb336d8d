//! Editor configuration and default storage locations.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::history::{DEFAULT_CAPACITY, DEFAULT_DEBOUNCE};

const APP_DIR: &str = "overlay-editor";

/// Tunables for the editor. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum number of history entries
    pub history_capacity: usize,
    /// Inactivity window for coalescing property edits, in milliseconds
    pub debounce_ms: u64,
    /// Distance from the document center at which moves snap to it
    pub snap_tolerance: f64,
    pub nudge_step: f64,
    /// Nudge distance with the modifier held
    pub nudge_step_large: f64,
    /// Offset of a duplicate from its source, on both axes
    pub duplicate_offset: f64,
    /// Document size while no background is set
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Where the autosave lives; `None` uses [`default_storage_dir`]
    pub storage_dir: Option<PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_CAPACITY,
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
            snap_tolerance: 6.0,
            nudge_step: 1.0,
            nudge_step_large: 10.0,
            duplicate_offset: 20.0,
            canvas_width: 1280,
            canvas_height: 720,
            storage_dir: None,
        }
    }
}

impl EditorConfig {
    /// Load from the user config directory, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring invalid config {:?}: {e}", path);
                Self::default()
            }
        }
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".config")
            });
        config_dir.join(APP_DIR).join("config.json")
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.storage_dir.clone().unwrap_or_else(default_storage_dir)
    }
}

/// Get the default directory for the autosaved design
pub fn default_storage_dir() -> PathBuf {
    // Use XDG data directory if available, otherwise fallback to ~/.local/share
    let data_dir = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".local/share")
        });
    data_dir.join(APP_DIR)
}
