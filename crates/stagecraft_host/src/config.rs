// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host configuration.
//!
//! Stored as RON, by default in `stagecraft.ron` in the working directory:
//!
//! ```ron
//! HostConfig(
//!     version: 1,
//!     clip_data_dir: "data/clips",
//!     timeline_dir: "data/timelines",
//!     timeline_id: None,
//!     tick_rate_hz: 60,
//!     playback_speed: 1.0,
//!     looping: false,
//!     run_seconds: 10.0,
//! )
//! ```

use crate::error::HostError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Current config format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Config file read when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "stagecraft.ron";

/// Settings for a headless playback run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Config format version
    pub version: u32,
    /// Directory of stored clip data
    pub clip_data_dir: PathBuf,
    /// Directory of stored timelines
    pub timeline_dir: PathBuf,
    /// Timeline to play; the first stored timeline when unset
    pub timeline_id: Option<Uuid>,
    /// Player updates per second
    pub tick_rate_hz: u32,
    /// Playback speed multiplier
    pub playback_speed: f32,
    /// Restart at the end instead of stopping
    pub looping: bool,
    /// Wall-clock limit of the run in seconds
    pub run_seconds: f32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            clip_data_dir: PathBuf::from("data/clips"),
            timeline_dir: PathBuf::from("data/timelines"),
            timeline_id: None,
            tick_rate_hz: 60,
            playback_speed: 1.0,
            looping: false,
            run_seconds: 10.0,
        }
    }
}

impl HostConfig {
    /// Parse a config document
    pub fn from_ron(content: &str) -> Result<Self, HostError> {
        let config: HostConfig = ron::from_str(content).map_err(|e| HostError::Ron(e.to_string()))?;

        if config.version > CONFIG_FORMAT_VERSION {
            return Err(HostError::UnsupportedVersion {
                found: config.version,
                supported: CONFIG_FORMAT_VERSION,
            });
        }

        Ok(config)
    }

    /// Load the config at `path`, or defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, HostError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_ron(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Save the config to `path`
    pub fn save(&self, path: &Path) -> Result<(), HostError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);

        let content = ron::ser::to_string_pretty(self, config).map_err(|e| HostError::Ron(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Seconds between player updates
    pub fn tick_interval(&self) -> f32 {
        1.0 / self.tick_rate_hz.max(1) as f32
    }

    /// Wall-clock limit of the run; negative values mean no time at all
    pub fn run_duration(&self) -> Result<Duration, HostError> {
        Duration::try_from_secs_f32(self.run_seconds.max(0.0))
            .map_err(|e| HostError::InvalidConfig(format!("run_seconds {}: {e}", self.run_seconds)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HostConfig::default();
        assert_eq!(config.version, CONFIG_FORMAT_VERSION);
        assert_eq!(config.timeline_id, None);
        assert!((config.tick_interval() - 1.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config = HostConfig::from_ron("(tick_rate_hz: 30, looping: true)").unwrap();
        assert_eq!(config.tick_rate_hz, 30);
        assert!(config.looping);
        assert_eq!(config.playback_speed, 1.0);
        assert_eq!(config.clip_data_dir, PathBuf::from("data/clips"));
    }

    #[test]
    fn test_newer_version_rejected() {
        let err = HostConfig::from_ron("(version: 99)").unwrap_err();
        assert!(matches!(
            err,
            HostError::UnsupportedVersion {
                found: 99,
                supported: CONFIG_FORMAT_VERSION
            }
        ));
    }

    #[test]
    fn test_run_duration_rejects_unrepresentable_values() {
        let config = HostConfig::from_ron("(run_seconds: 2.5)").unwrap();
        assert_eq!(config.run_duration().unwrap(), Duration::from_millis(2500));

        let negative = HostConfig::from_ron("(run_seconds: -1.0)").unwrap();
        assert_eq!(negative.run_duration().unwrap(), Duration::ZERO);

        let infinite = HostConfig {
            run_seconds: f32::INFINITY,
            ..HostConfig::default()
        };
        assert!(matches!(infinite.run_duration(), Err(HostError::InvalidConfig(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("stagecraft-config-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(DEFAULT_CONFIG_FILE);

        let config = HostConfig {
            timeline_id: Some(Uuid::new_v4()),
            run_seconds: 2.5,
            ..HostConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(HostConfig::load_or_default(&path).unwrap(), config);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join(format!("stagecraft-missing-{}.ron", Uuid::new_v4()));
        assert_eq!(HostConfig::load_or_default(&path).unwrap(), HostConfig::default());
    }
}
