//! Settings persistence using TOML
//!
//! Stores settings in ~/.config/blockfall/settings.toml (or platform equivalent)

use crate::game::GameConfig;
use crate::score::MAX_STARTING_LEVEL;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Engine settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Phase timings
    pub timing: TimingSettings,
    /// Gameplay settings
    pub gameplay: GameplaySettings,
}

/// Timings in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub lock_delay_ms: u64,
    pub line_clear_ms: u64,
    pub game_over_pause_ms: u64,
    pub game_over_fill_ms: u64,
}

/// Gameplay settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameplaySettings {
    /// Level new games start on (0-9)
    pub starting_level: u32,
    /// Fixed bag seed, random when absent
    pub seed: Option<u64>,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            lock_delay_ms: 500,
            line_clear_ms: 400,
            game_over_pause_ms: 1000,
            game_over_fill_ms: 100,
        }
    }
}

impl TimingSettings {
    pub fn to_config(&self) -> GameConfig {
        GameConfig {
            lock_delay: Duration::from_millis(self.lock_delay_ms),
            line_clear: Duration::from_millis(self.line_clear_ms),
            game_over_pause: Duration::from_millis(self.game_over_pause_ms),
            // Zero would make the fill animation spin
            game_over_fill: Duration::from_millis(self.game_over_fill_ms.max(1)),
        }
    }
}

impl GameplaySettings {
    pub fn starting_level(&self) -> u32 {
        self.starting_level.min(MAX_STARTING_LEVEL)
    }
}

impl Settings {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("com", "blockfall", "blockfall").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.toml"))
    }

    /// Load settings from the default location, or defaults
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load settings from a file. Missing or unparsable files give defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid settings in {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<(), String> {
        let Some(path) = Self::settings_path() else {
            return Err("Could not determine settings path".to_string());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| format!("Failed to create config dir: {}", e))?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize: {}", e))?;

        fs::write(path, contents).map_err(|e| format!("Failed to write settings: {}", e))?;

        Ok(())
    }

    pub fn game_config(&self) -> GameConfig {
        self.timing.to_config()
    }
}
