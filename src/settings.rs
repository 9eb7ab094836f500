//! Headless driver settings
//!
//! Stored as JSON next to the session history. Every field has a default, so
//! a partial file only overrides what it names.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Millis;
use crate::history::PersistError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seeds every RNG in the core
    pub seed: u64,
    /// Simulated time between frames
    pub frame_interval_ms: Millis,
    /// Give up on a headless run after this much simulated time
    pub session_time_cap_ms: Millis,
    /// Where session history is stored
    pub history_path: PathBuf,

    // === Autopilot ===
    /// Delay between a stimulus or window opening and the press
    pub autopilot_reaction_ms: Millis,
    /// Chance per closed window of an impulsive press (0.0 - 1.0)
    pub autopilot_impulse_chance: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: 0x5EED,
            frame_interval_ms: 16,
            session_time_cap_ms: 15 * 60 * 1000,
            history_path: PathBuf::from("brain_invaders_history.json"),

            autopilot_reaction_ms: 280,
            autopilot_impulse_chance: 0.2,
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("Invalid settings in {}: {}", path.display(), e);
                    log::info!("Using default settings");
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("No settings at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Save settings to `path` as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PersistError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        log::info!("Settings saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Frame interval, never zero
    pub fn frame_step_ms(&self) -> Millis {
        self.frame_interval_ms.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        assert_eq!(Settings::load(dir.path().join("nope.json")), Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            seed: 42,
            autopilot_impulse_chance: 0.0,
            ..Default::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path), settings);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "seed": 7, "frame_interval_ms": 0 }"#).unwrap();

        let settings = Settings::load(&path);
        assert_eq!(settings.seed, 7);
        assert_eq!(settings.frame_step_ms(), 1);
        assert_eq!(settings.history_path, Settings::default().history_path);
    }

    #[test]
    fn test_save_failure_is_reported() {
        let dir = tempdir().unwrap();
        // A directory where the file should be
        let err = Settings::default().save(dir.path()).unwrap_err();
        assert!(matches!(err, PersistError::Io(_)));
        assert!(err.to_string().starts_with("I/O failed"));
        assert!(!err.to_string().contains("history"));
    }

    #[test]
    fn test_invalid_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ seed: ").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }
}
